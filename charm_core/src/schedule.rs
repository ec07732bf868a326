//! Weekly schedule grid.
//!
//! Seven days of 24 hourly slots. A slot is free, blocked, or occupied by
//! part of a task span. A task of `d` minutes always occupies
//! `max(1, ceil(d / 60))` consecutive slots of a single day.
//!
//! Task details live once per id in the grid's record table; slots only
//! point at a record and say whether they start a span. Completing a task
//! therefore flips one flag and every slot on every day sees it.

use crate::config::BlockPolicy;
use crate::{ScheduleError, TaskId, TaskRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DAYS_PER_WEEK: usize = 7;
pub const HOURS_PER_DAY: usize = 24;

/// Share of used hours above which the week counts as nearly full
pub const NEARLY_FULL_RATIO: f64 = 0.8;

pub const DAY_NAMES: [&str; DAYS_PER_WEEK] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Contents of one hourly slot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotState {
    Free,
    Blocked,
    Occupied { task_id: TaskId, span_head: bool },
}

impl SlotState {
    pub fn is_free(&self) -> bool {
        matches!(self, SlotState::Free)
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            SlotState::Occupied { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    fn continues(&self, id: &str) -> bool {
        matches!(self, SlotState::Occupied { task_id, span_head: false } if task_id == id)
    }
}

/// One hour-wide cell
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub hour: usize,
    pub state: SlotState,
}

/// A planner's proposal: put `tasks[task_index]` on `day` at `start_hour`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub task_index: usize,
    #[serde(rename = "dayIndex")]
    pub day: usize,
    pub start_hour: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Why an assignment was not applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    UnknownTask,
    Rejected(ScheduleError),
}

/// Outcome of [`ScheduleGrid::organize_automatically`]
#[derive(Clone, Debug, Default)]
pub struct OrganizeReport {
    pub placed: Vec<Assignment>,
    pub skipped: Vec<(Assignment, SkipReason)>,
}

/// The 7 × 24 slot matrix plus the task records it references
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "GridDocument")]
pub struct ScheduleGrid {
    days: Vec<Vec<Slot>>,
    tasks: BTreeMap<TaskId, TaskRef>,
}

#[derive(Deserialize)]
struct GridDocument {
    days: Vec<Vec<Slot>>,
    tasks: BTreeMap<TaskId, TaskRef>,
}

impl TryFrom<GridDocument> for ScheduleGrid {
    type Error = String;

    fn try_from(doc: GridDocument) -> Result<Self, Self::Error> {
        let grid = ScheduleGrid {
            days: doc.days,
            tasks: doc.tasks,
        };
        grid.validate()?;
        Ok(grid)
    }
}

impl Default for ScheduleGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleGrid {
    /// An all-free week
    pub fn new() -> Self {
        let days = (0..DAYS_PER_WEEK)
            .map(|_| {
                (0..HOURS_PER_DAY)
                    .map(|hour| Slot {
                        hour,
                        state: SlotState::Free,
                    })
                    .collect()
            })
            .collect();

        Self {
            days,
            tasks: BTreeMap::new(),
        }
    }

    fn check(&self, day: usize, hour: usize) -> Result<(), ScheduleError> {
        if day >= DAYS_PER_WEEK || hour >= HOURS_PER_DAY {
            return Err(ScheduleError::OutOfRange { day, hour });
        }
        Ok(())
    }

    /// Place `task` on `day` starting at `start_hour`
    ///
    /// Checks, in order:
    /// 1. The start slot is free, else [`ScheduleError::SlotOccupied`]
    /// 2. The whole span fits in the day and is free, else
    ///    [`ScheduleError::InsufficientSpace`]
    ///
    /// All-or-nothing. If the grid already holds a record for `task.id`,
    /// that record stays authoritative (its duration sizes the span).
    /// Returns the number of slots filled.
    pub fn place_task(
        &mut self,
        day: usize,
        start_hour: usize,
        task: &TaskRef,
    ) -> Result<usize, ScheduleError> {
        self.check(day, start_hour)?;

        if !self.days[day][start_hour].state.is_free() {
            return Err(ScheduleError::SlotOccupied {
                day,
                hour: start_hour,
            });
        }

        let hours_needed = self.tasks.get(&task.id).unwrap_or(task).hours_needed();
        let end = start_hour + hours_needed;
        if end > HOURS_PER_DAY
            || self.days[day][start_hour..end]
                .iter()
                .any(|slot| !slot.state.is_free())
        {
            return Err(ScheduleError::InsufficientSpace {
                day,
                start_hour,
                hours_needed,
            });
        }

        for (offset, slot) in self.days[day][start_hour..end].iter_mut().enumerate() {
            slot.state = SlotState::Occupied {
                task_id: task.id.clone(),
                span_head: offset == 0,
            };
        }
        self.tasks
            .entry(task.id.clone())
            .or_insert_with(|| task.clone());

        tracing::debug!(
            "Placed {} on {} {}-{}",
            task.id,
            DAY_NAMES[day],
            format_hour(start_hour),
            format_hour(end % HOURS_PER_DAY)
        );
        Ok(hours_needed)
    }

    /// Flip a slot between free and blocked
    ///
    /// Occupied slots follow `policy`: `Reject` refuses, `Evict` removes the
    /// task span first. Returns whether the slot is now blocked.
    pub fn toggle_block(
        &mut self,
        day: usize,
        hour: usize,
        policy: BlockPolicy,
    ) -> Result<bool, ScheduleError> {
        self.check(day, hour)?;

        match self.days[day][hour].state {
            SlotState::Free => {
                self.days[day][hour].state = SlotState::Blocked;
                Ok(true)
            }
            SlotState::Blocked => {
                self.days[day][hour].state = SlotState::Free;
                Ok(false)
            }
            SlotState::Occupied { .. } => match policy {
                BlockPolicy::Reject => Err(ScheduleError::SlotOccupied { day, hour }),
                BlockPolicy::Evict => {
                    if let Some(evicted) = self.remove_task(day, hour)? {
                        tracing::info!(
                            "Evicted {} to block {} {}",
                            evicted.id,
                            DAY_NAMES[day],
                            format_hour(hour)
                        );
                    }
                    self.days[day][hour].state = SlotState::Blocked;
                    Ok(true)
                }
            },
        }
    }

    /// Remove the task span covering `(day, hour)`
    ///
    /// Only that span is cleared; other placements of the same task stay.
    /// Returns the task, or `None` if the slot held no task.
    pub fn remove_task(
        &mut self,
        day: usize,
        hour: usize,
    ) -> Result<Option<TaskRef>, ScheduleError> {
        self.check(day, hour)?;

        let slots = &mut self.days[day];
        let task_id = match slots[hour].state.task_id() {
            Some(id) => id.to_string(),
            None => return Ok(None),
        };

        let mut start = hour;
        while start > 0 && slots[start].state.continues(&task_id) {
            start -= 1;
        }
        let mut end = hour + 1;
        while end < HOURS_PER_DAY && slots[end].state.continues(&task_id) {
            end += 1;
        }
        for slot in &mut slots[start..end] {
            slot.state = SlotState::Free;
        }

        let task = if self.slot_count(&task_id) == 0 {
            self.tasks.remove(&task_id)
        } else {
            self.tasks.get(&task_id).cloned()
        };

        tracing::debug!("Removed {} from {} ({} slots)", task_id, DAY_NAMES[day], end - start);
        Ok(task)
    }

    /// Mark a task completed everywhere it is scheduled
    ///
    /// Returns how many slots reference the task (0 if it isn't on the grid).
    pub fn complete_task(&mut self, task_id: &str) -> usize {
        match self.tasks.get_mut(task_id) {
            Some(task) => {
                task.completed = true;
                self.slot_count(task_id)
            }
            None => 0,
        }
    }

    /// Drop every placement of a task, e.g. after it is deleted from the catalog
    pub fn purge_task(&mut self, task_id: &str) -> usize {
        let mut cleared = 0;
        for slot in self.days.iter_mut().flatten() {
            if slot.state.task_id() == Some(task_id) {
                slot.state = SlotState::Free;
                cleared += 1;
            }
        }
        self.tasks.remove(task_id);
        cleared
    }

    /// Apply planner assignments one by one
    ///
    /// Each assignment goes through [`Self::place_task`]; failures and
    /// unknown task indices are skipped and reported, never fatal.
    pub fn organize_automatically(
        &mut self,
        tasks: &[TaskRef],
        assignments: &[Assignment],
    ) -> OrganizeReport {
        let mut report = OrganizeReport::default();

        for assignment in assignments {
            let Some(task) = tasks.get(assignment.task_index) else {
                tracing::warn!(
                    "Assignment references unknown task index {}",
                    assignment.task_index
                );
                report
                    .skipped
                    .push((assignment.clone(), SkipReason::UnknownTask));
                continue;
            };

            match self.place_task(assignment.day, assignment.start_hour, task) {
                Ok(_) => report.placed.push(assignment.clone()),
                Err(e) => {
                    tracing::info!("Skipping assignment for {}: {}", task.id, e);
                    report
                        .skipped
                        .push((assignment.clone(), SkipReason::Rejected(e)));
                }
            }
        }

        report
    }

    pub fn slot(&self, day: usize, hour: usize) -> Option<&Slot> {
        self.days.get(day)?.get(hour)
    }

    pub fn day(&self, day: usize) -> Option<&[Slot]> {
        self.days.get(day).map(Vec::as_slice)
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskRef> {
        self.tasks.get(task_id)
    }

    /// Task occupying `(day, hour)`, if any
    pub fn task_at(&self, day: usize, hour: usize) -> Option<&TaskRef> {
        let id = self.slot(day, hour)?.state.task_id()?;
        self.tasks.get(id)
    }

    /// Free `(day, hour)` cells, in day then hour order
    pub fn free_cells(&self) -> Vec<(usize, usize)> {
        self.days
            .iter()
            .enumerate()
            .flat_map(|(day, slots)| {
                slots
                    .iter()
                    .filter(|slot| slot.state.is_free())
                    .map(move |slot| (day, slot.hour))
            })
            .collect()
    }

    /// Hours that are blocked or hold a task
    pub fn used_hours(&self) -> usize {
        self.days
            .iter()
            .flatten()
            .filter(|slot| !slot.state.is_free())
            .count()
    }

    pub fn is_nearly_full(&self) -> bool {
        self.used_hours() as f64 > (DAYS_PER_WEEK * HOURS_PER_DAY) as f64 * NEARLY_FULL_RATIO
    }

    fn slot_count(&self, task_id: &str) -> usize {
        self.days
            .iter()
            .flatten()
            .filter(|slot| slot.state.task_id() == Some(task_id))
            .count()
    }

    /// Check grid shape, record references and span lengths
    pub fn validate(&self) -> Result<(), String> {
        if self.days.len() != DAYS_PER_WEEK {
            return Err(format!("expected {} days, found {}", DAYS_PER_WEEK, self.days.len()));
        }

        for (day, slots) in self.days.iter().enumerate() {
            if slots.len() != HOURS_PER_DAY {
                return Err(format!("day {} has {} slots", day, slots.len()));
            }
            if let Some(slot) = slots.iter().enumerate().find(|(i, s)| s.hour != *i) {
                return Err(format!("day {} slot {} has hour {}", day, slot.0, slot.1.hour));
            }

            let mut hour = 0;
            while hour < HOURS_PER_DAY {
                match &slots[hour].state {
                    SlotState::Occupied {
                        task_id,
                        span_head: true,
                    } => {
                        let task = self
                            .tasks
                            .get(task_id)
                            .ok_or_else(|| format!("slot references unknown task {}", task_id))?;
                        let end = hour + task.hours_needed();
                        if end > HOURS_PER_DAY
                            || !slots[hour + 1..end].iter().all(|s| s.state.continues(task_id))
                        {
                            return Err(format!("broken span for {} on day {}", task_id, day));
                        }
                        hour = end;
                    }
                    SlotState::Occupied { task_id, .. } => {
                        return Err(format!("span for {} on day {} has no head", task_id, day));
                    }
                    _ => hour += 1,
                }
            }
        }

        if let Some(orphan) = self.tasks.keys().find(|id| self.slot_count(id) == 0) {
            return Err(format!("task {} is not placed anywhere", orphan));
        }

        Ok(())
    }
}

/// 12-hour clock label: 12AM, 9AM, 12PM, 3PM
pub fn format_hour(hour: usize) -> String {
    let period = if hour >= 12 { "PM" } else { "AM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}{}", display, period)
}
