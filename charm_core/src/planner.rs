//! Local sequential planner.
//!
//! Used when the remote scheduling service can't be reached: walk the days in
//! order and give each one the next task at its earliest free hour.

use crate::schedule::Assignment;
use std::collections::BTreeMap;

pub const SEQUENTIAL_REASONING: &str = "Auto-scheduled to next available slot";

/// Plan `task_count` tasks into `free_cells`, one task per day
///
/// `free_cells` are `(day, hour)` pairs in any order. Days without free cells
/// are skipped; tasks left over after the last free day are not assigned.
pub fn plan_sequential(task_count: usize, free_cells: &[(usize, usize)]) -> Vec<Assignment> {
    let mut earliest: BTreeMap<usize, usize> = BTreeMap::new();
    for &(day, hour) in free_cells {
        earliest
            .entry(day)
            .and_modify(|h| *h = (*h).min(hour))
            .or_insert(hour);
    }

    earliest
        .into_iter()
        .zip(0..task_count)
        .map(|((day, hour), task_index)| Assignment {
            task_index,
            day,
            start_hour: hour,
            reasoning: Some(SEQUENTIAL_REASONING.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_tasks;
    use crate::schedule::ScheduleGrid;

    #[test]
    fn test_one_task_per_day_at_earliest_hour() {
        let free = [(2, 14), (0, 9), (2, 8), (0, 7), (5, 20)];
        let plan = plan_sequential(2, &free);

        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].task_index, plan[0].day, plan[0].start_hour), (0, 0, 7));
        assert_eq!((plan[1].task_index, plan[1].day, plan[1].start_hour), (1, 2, 8));
    }

    #[test]
    fn test_more_tasks_than_days() {
        let plan = plan_sequential(10, &[(1, 3), (4, 0)]);
        assert_eq!(plan.len(), 2);
        assert!(plan_sequential(3, &[]).is_empty());
        assert!(plan_sequential(0, &[(1, 3)]).is_empty());
    }

    #[test]
    fn test_plan_applies_to_empty_grid() {
        let mut grid = ScheduleGrid::new();
        let tasks = default_tasks();

        let plan = plan_sequential(tasks.len(), &grid.free_cells());
        let report = grid.organize_automatically(tasks, &plan);

        assert_eq!(report.placed.len(), tasks.len());
        assert!(report.skipped.is_empty());
        assert_eq!(grid.task_at(4, 0).unwrap().id, "task-5");
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn test_spans_that_do_not_fit_are_skipped() {
        let mut grid = ScheduleGrid::new();
        let tasks = default_tasks();

        // Only late-evening hours are free on every day
        let free: Vec<_> = grid
            .free_cells()
            .into_iter()
            .filter(|&(_, hour)| hour >= 22)
            .collect();
        let plan = plan_sequential(tasks.len(), &free);
        let report = grid.organize_automatically(tasks, &plan);

        // Only tasks of two hours or less fit between 22:00 and midnight
        let placed: Vec<_> = report.placed.iter().map(|a| a.task_index).collect();
        assert_eq!(placed, vec![1, 2, 3]);
        assert_eq!(report.skipped.len(), 2);
    }
}
