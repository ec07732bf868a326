//! HTTP client for the ChronoCharm API.
//!
//! Wraps the mana ledger, breakdown, scheduling and stats endpoints. Every
//! call carries the configured user id; non-success statuses come back as
//! [`Error::Api`] with the response body.

use crate::config::ApiConfig;
use crate::outbox::{latest_snapshot, JsonlOutbox};
use crate::schedule::Assignment;
use crate::{Error, Result, StatsSnapshot, TaskRef};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mana balance for one user
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Balance {
    pub user_id: String,
    pub balance: i64,
    pub total_earned: i64,
    pub total_lost: i64,
    pub quests_completed: u32,
}

/// A micro-task proposed by the breakdown service
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub estimated_time: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub tasks: Vec<BreakdownTask>,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub total_estimated_time: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct WagerStarted {
    pub success: bool,
    pub task_id: String,
    pub stake_deducted: i64,
    pub new_balance: i64,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WagerOutcome {
    Won,
    Lost,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct WagerSettled {
    pub success: bool,
    pub outcome: WagerOutcome,
    #[serde(default)]
    pub bounty_awarded: Option<i64>,
    #[serde(default)]
    pub stake_returned: Option<i64>,
    #[serde(default)]
    pub total_gain: Option<i64>,
    #[serde(default)]
    pub stake_lost: Option<i64>,
    pub new_balance: i64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ResetResult {
    pub success: bool,
    pub balance: i64,
}

#[derive(Deserialize)]
struct Ack {
    success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakdownRequest<'a> {
    assignment: &'a str,
    task_count: u32,
    is_wizard_mode: bool,
    #[serde(rename = "user_id")]
    user_id: &'a str,
}

#[derive(Serialize)]
struct WagerStartRequest<'a> {
    task_id: &'a str,
    stake: u32,
    user_id: &'a str,
}

#[derive(Serialize)]
struct WagerCompleteRequest<'a> {
    task_id: &'a str,
    bounty: u32,
    stake: u32,
    won: bool,
    user_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleTask<'a> {
    title: &'a str,
    description: &'a str,
    estimated_minutes: u32,
    stake: u32,
    bounty: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailableHour {
    day_index: usize,
    hour: usize,
    is_blocked: bool,
}

#[derive(Serialize)]
struct ScheduleRequest<'a> {
    tasks: Vec<ScheduleTask<'a>>,
    available_hours: Vec<AvailableHour>,
}

#[derive(Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    schedule: Vec<Assignment>,
}

/// Async client for the remote API
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    user_id: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(self.url(path))
            .query(&[("user_id", self.user_id.as_str())])
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    /// Current mana balance
    pub async fn balance(&self) -> Result<Balance> {
        send(self.get("/balance")).await
    }

    /// Ask the service to split an assignment into `count` micro-tasks
    pub async fn breakdown(&self, assignment: &str, count: u32, wizard: bool) -> Result<Breakdown> {
        let body = BreakdownRequest {
            assignment,
            task_count: count,
            is_wizard_mode: wizard,
            user_id: &self.user_id,
        };
        send(self.post("/breakdown").json(&body)).await
    }

    /// Deduct the stake for a task
    pub async fn start_wager(&self, task_id: &str, stake: u32) -> Result<WagerStarted> {
        let body = WagerStartRequest {
            task_id,
            stake,
            user_id: &self.user_id,
        };
        send(self.post("/wager/start").json(&body)).await
    }

    /// Settle a wager: bounty plus stake back when won, stake lost otherwise
    pub async fn complete_wager(
        &self,
        task_id: &str,
        bounty: u32,
        stake: u32,
        won: bool,
    ) -> Result<WagerSettled> {
        let body = WagerCompleteRequest {
            task_id,
            bounty,
            stake,
            won,
            user_id: &self.user_id,
        };
        send(self.post("/wager/complete").json(&body)).await
    }

    /// Remote copy of the progression snapshot
    pub async fn fetch_stats(&self) -> Result<StatsSnapshot> {
        send(self.get("/stats")).await
    }

    pub async fn push_stats(&self, snapshot: &StatsSnapshot) -> Result<()> {
        let request = self
            .post("/stats")
            .query(&[("user_id", self.user_id.as_str())])
            .json(snapshot);
        let ack: Ack = send(request).await?;
        if !ack.success {
            return Err(Error::Other("stats update was not acknowledged".into()));
        }
        Ok(())
    }

    /// Ask the scheduling service to place `tasks` into `free_cells`
    pub async fn schedule(
        &self,
        tasks: &[TaskRef],
        free_cells: &[(usize, usize)],
    ) -> Result<Vec<Assignment>> {
        let body = ScheduleRequest {
            tasks: tasks
                .iter()
                .map(|t| ScheduleTask {
                    title: &t.title,
                    description: &t.description,
                    estimated_minutes: t.duration_minutes,
                    stake: t.stake,
                    bounty: t.bounty,
                })
                .collect(),
            available_hours: free_cells
                .iter()
                .map(|&(day, hour)| AvailableHour {
                    day_index: day,
                    hour,
                    is_blocked: false,
                })
                .collect(),
        };
        let response: ScheduleResponse = send(self.post("/schedule").json(&body)).await?;
        Ok(response.schedule)
    }

    /// Reset the user's mana ledger
    pub async fn reset(&self) -> Result<ResetResult> {
        let request = self
            .post("/reset")
            .query(&[("user_id", self.user_id.as_str())]);
        send(request).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let response = check_status(response).await?;
    Ok(response.json().await?)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!("API returned {}: {}", status, body);
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

/// Push the newest queued snapshot and empty the outbox
///
/// Returns whether a snapshot was sent. Failures are logged; the drained
/// events are not requeued.
pub async fn drain_outbox(outbox: &JsonlOutbox, client: &ApiClient) -> bool {
    let events = match outbox.take_all() {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("Failed to read sync outbox: {}", e);
            return false;
        }
    };

    let Some(snapshot) = latest_snapshot(&events) else {
        return false;
    };

    match client.push_stats(snapshot).await {
        Ok(()) => {
            tracing::info!("Synced stats ({} queued events coalesced)", events.len());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to sync stats: {}", e);
            false
        }
    }
}
