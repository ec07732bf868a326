//! Catalog of available tasks.
//!
//! This module provides the built-in sample quests and the user's editable
//! task list that the calendar draws from.

use crate::api::BreakdownTask;
use crate::schedule::ScheduleGrid;
use crate::store::{load_document, save_document};
use crate::{Error, Result, TaskId, TaskRef};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// Cached sample tasks - built once and reused
static DEFAULT_TASKS: Lazy<Vec<TaskRef>> = Lazy::new(build_default_tasks);

/// Get a reference to the cached sample tasks
pub fn default_tasks() -> &'static [TaskRef] {
    &DEFAULT_TASKS
}

fn sample(
    id: &str,
    title: &str,
    description: &str,
    minutes: u32,
    stake: u32,
    bounty: u32,
) -> TaskRef {
    TaskRef {
        id: id.into(),
        title: title.into(),
        description: description.into(),
        duration_minutes: minutes,
        stake,
        bounty,
        completed: false,
    }
}

fn build_default_tasks() -> Vec<TaskRef> {
    vec![
        sample("task-1", "Research Sources", "Find 8+ scholarly articles", 180, 20, 60),
        sample("task-2", "Create Bibliography", "Summarize each source", 120, 15, 45),
        sample("task-3", "Outline Paper", "Draft detailed outline", 60, 10, 30),
        sample("task-4", "Write Introduction", "Craft compelling intro", 90, 12, 36),
        sample("task-5", "Write Body", "Develop main sections", 360, 30, 90),
    ]
}

/// The user's list of available tasks, in display order
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TaskCatalog {
    tasks: Vec<TaskRef>,
}

impl Default for TaskCatalog {
    fn default() -> Self {
        Self {
            tasks: default_tasks().to_vec(),
        }
    }
}

impl TaskCatalog {
    pub fn new(tasks: Vec<TaskRef>) -> Self {
        Self { tasks }
    }

    /// Load the catalog, falling back to the sample tasks
    pub fn load(path: &Path) -> Result<Self> {
        Ok(load_document(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_document(path, self)
    }

    pub fn tasks(&self) -> &[TaskRef] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&TaskRef> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Add a custom task; the title must not be blank
    pub fn add(
        &mut self,
        title: &str,
        description: &str,
        duration_minutes: u32,
        stake: u32,
        bounty: u32,
    ) -> Result<&TaskRef> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Catalog("Task title is required".into()));
        }

        let task = TaskRef {
            id: new_task_id(),
            title: title.to_string(),
            description: description.trim().to_string(),
            duration_minutes,
            stake,
            bounty,
            completed: false,
        };
        tracing::info!("Added task {} ({})", task.id, task.title);
        self.tasks.push(task);
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    /// Delete a task and every placement of it on `grid`
    pub fn delete(&mut self, id: &str, grid: &mut ScheduleGrid) -> Result<TaskRef> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::Catalog(format!("No task with id '{}'", id)))?;

        let task = self.tasks.remove(index);
        let cleared = grid.purge_task(id);
        tracing::info!("Deleted task {} (cleared {} slots)", id, cleared);
        Ok(task)
    }

    /// Mark a task completed in the catalog
    pub fn mark_completed(&mut self, id: &str) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.completed = true;
                true
            }
            None => false,
        }
    }

    /// Append tasks produced by the breakdown service
    ///
    /// The service doesn't price tasks, so every imported task gets the
    /// given stake and bounty. Unparseable durations count as one hour.
    pub fn import_breakdown(
        &mut self,
        items: &[BreakdownTask],
        stake: u32,
        bounty: u32,
    ) -> Vec<TaskId> {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let minutes = parse_estimated_minutes(&item.estimated_time).unwrap_or_else(|| {
                tracing::warn!(
                    "Could not parse duration '{}' for '{}', assuming 60 min",
                    item.estimated_time,
                    item.title
                );
                60
            });
            let task = TaskRef {
                id: new_task_id(),
                title: item.title.clone(),
                description: item.description.clone(),
                duration_minutes: minutes,
                stake,
                bounty,
                completed: false,
            };
            ids.push(task.id.clone());
            self.tasks.push(task);
        }
        tracing::info!("Imported {} tasks from breakdown", ids.len());
        ids
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for task in &self.tasks {
            if task.id.is_empty() {
                errors.push("Task has empty ID".to_string());
            }
            if !seen.insert(task.id.as_str()) {
                errors.push(format!("Duplicate task ID '{}'", task.id));
            }
            if task.title.trim().is_empty() {
                errors.push(format!("Task '{}' has empty title", task.id));
            }
        }

        errors
    }
}

fn new_task_id() -> TaskId {
    format!("task-{}", Uuid::new_v4().simple())
}

/// Parse durations like "15 min", "90 minutes", "1 hour", "1.5 hours", "2h"
pub fn parse_estimated_minutes(text: &str) -> Option<u32> {
    let text = text.trim().to_lowercase();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let minutes = match unit.trim() {
        "" | "m" | "min" | "mins" | "minute" | "minutes" => value,
        "h" | "hr" | "hrs" | "hour" | "hours" => value * 60.0,
        _ => return None,
    };
    Some(minutes.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(title: &str, estimated: &str) -> BreakdownTask {
        BreakdownTask {
            id: "task-1".into(),
            title: title.into(),
            description: "You can do it".into(),
            estimated_time: estimated.into(),
            completed: false,
        }
    }

    #[test]
    fn test_default_catalog_loads() {
        let catalog = TaskCatalog::default();
        assert_eq!(catalog.tasks().len(), 5);
        assert_eq!(catalog.get("task-4").unwrap().duration_minutes, 90);
    }

    #[test]
    fn test_default_catalog_validates() {
        let errors = TaskCatalog::default().validate();
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_sample_bounties_exceed_stakes() {
        for task in default_tasks() {
            assert!(task.bounty > task.stake, "{}", task.id);
        }
    }

    #[test]
    fn test_add_requires_title() {
        let mut catalog = TaskCatalog::new(vec![]);
        assert!(matches!(
            catalog.add("   ", "", 60, 10, 30),
            Err(Error::Catalog(_))
        ));

        let id = catalog.add(" Proofread ", "", 45, 5, 15).unwrap().id.clone();
        assert!(id.starts_with("task-"));
        assert_eq!(catalog.get(&id).unwrap().title, "Proofread");
    }

    #[test]
    fn test_delete_purges_grid() {
        let mut catalog = TaskCatalog::default();
        let mut grid = ScheduleGrid::new();
        let task = catalog.get("task-2").unwrap().clone();
        grid.place_task(0, 9, &task).unwrap();
        grid.place_task(3, 9, &task).unwrap();

        let deleted = catalog.delete("task-2", &mut grid).unwrap();
        assert_eq!(deleted.id, "task-2");
        assert!(catalog.get("task-2").is_none());
        assert_eq!(grid.used_hours(), 0);

        assert!(catalog.delete("task-2", &mut grid).is_err());
    }

    #[test]
    fn test_duplicate_ids_flagged() {
        let task = default_tasks()[0].clone();
        let catalog = TaskCatalog::new(vec![task.clone(), task]);
        assert_eq!(catalog.validate().len(), 1);
    }

    #[test]
    fn test_parse_estimated_minutes() {
        assert_eq!(parse_estimated_minutes("15 min"), Some(15));
        assert_eq!(parse_estimated_minutes("90 minutes"), Some(90));
        assert_eq!(parse_estimated_minutes("1 hour"), Some(60));
        assert_eq!(parse_estimated_minutes("1.5 hours"), Some(90));
        assert_eq!(parse_estimated_minutes("2h"), Some(120));
        assert_eq!(parse_estimated_minutes("5"), Some(5));
        assert_eq!(parse_estimated_minutes("soon"), None);
        assert_eq!(parse_estimated_minutes("3 fortnights"), None);
    }

    #[test]
    fn test_import_breakdown() {
        let mut catalog = TaskCatalog::new(vec![]);
        let ids = catalog.import_breakdown(
            &[breakdown("Read pages 1-3", "5 min"), breakdown("Outline", "whenever")],
            10,
            30,
        );

        assert_eq!(ids.len(), 2);
        assert_eq!(catalog.get(&ids[0]).unwrap().duration_minutes, 5);
        assert_eq!(catalog.get(&ids[1]).unwrap().duration_minutes, 60);
        assert_eq!(catalog.get(&ids[1]).unwrap().bounty, 30);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("tasks.json");

        let mut catalog = TaskCatalog::default();
        catalog.mark_completed("task-1");
        catalog.save(&path).unwrap();

        let loaded = TaskCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert!(loaded.get("task-1").unwrap().completed);
    }
}
