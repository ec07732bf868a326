//! Progression logic for experience, levels, attributes and streaks.
//!
//! This module implements the RPG rules as pure transitions:
//! - Experience: level = floor(sqrt(xp / 100)) + 1, next level at level² × 100
//! - Level-up: one random attribute +5, a "Level N" badge every fifth level
//! - Daily completion: streak continues, starts, or breaks; streak badges at 7/30/100
//!
//! Nothing here touches storage. Persisting the result is the caller's job,
//! see [`crate::tracker::ProgressTracker`].

use crate::{Attribute, ProgressionState, LEVEL_TITLES, STREAK_BADGES};
use chrono::NaiveDate;
use rand::Rng;

/// Attribute points granted by a level-up
pub const LEVEL_UP_BONUS: i64 = 5;

/// Endurance gained for keeping (or starting) a streak
pub const STREAK_ENDURANCE_BONUS: i64 = 2;

/// Endurance lost when a streak breaks
pub const STREAK_BREAK_PENALTY: i64 = 5;

/// Level for a given amount of experience
pub fn level_for_experience(experience_points: u64) -> u32 {
    integer_sqrt(experience_points / 100) as u32 + 1
}

/// Experience threshold at which `level` rolls over to the next level
///
/// Saturates at `u64::MAX` for levels only reachable with capped experience.
pub fn experience_for_next_level(level: u32) -> u64 {
    let level = level as u64;
    level.saturating_mul(level).saturating_mul(100)
}

/// Title for a level
pub fn title_for_level(level: u32) -> &'static str {
    let index = (level.max(1) as usize - 1).min(LEVEL_TITLES.len() - 1);
    LEVEL_TITLES[index]
}

fn integer_sqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

impl ProgressionState {
    pub fn level(&self) -> u32 {
        level_for_experience(self.experience_points)
    }

    pub fn experience_to_next_level(&self) -> u64 {
        experience_for_next_level(self.level())
    }

    pub fn title(&self) -> &'static str {
        title_for_level(self.level())
    }
}

/// Something noteworthy that happened during a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressionEvent {
    LeveledUp { from: u32, to: u32 },
    AttributeRaised { attribute: Attribute, value: u8 },
    BadgeEarned(String),
    StreakContinued(u32),
    StreakStarted,
    StreakBroken { previous: u32 },
}

/// Result of applying one progression rule
#[derive(Clone, Debug)]
pub struct Transition {
    pub state: ProgressionState,
    pub events: Vec<ProgressionEvent>,
}

impl Transition {
    /// True when the transition left the state untouched
    pub fn is_noop(&self, before: &ProgressionState) -> bool {
        self.events.is_empty() && &self.state == before
    }
}

/// Add experience and apply level-up rewards
///
/// Rules:
/// 1. New experience is the old value plus `amount`, saturating at zero
/// 2. On level-up, one attribute chosen uniformly from `rng` gains 5 (max 100)
/// 3. If the new level is a multiple of 5, award "Level N" once
///
/// Gaining several levels in one call still grants a single attribute bump,
/// and only the final level is checked for a badge.
pub fn add_experience<R: Rng + ?Sized>(
    state: &ProgressionState,
    amount: i64,
    rng: &mut R,
) -> Transition {
    let mut next = state.clone();
    let mut events = Vec::new();

    let old_level = state.level();
    next.experience_points = if amount >= 0 {
        state.experience_points.saturating_add(amount as u64)
    } else {
        tracing::warn!("Negative experience amount {}", amount);
        state.experience_points.saturating_sub(amount.unsigned_abs())
    };
    let new_level = next.level();

    if new_level > old_level {
        events.push(ProgressionEvent::LeveledUp {
            from: old_level,
            to: new_level,
        });

        let attribute = Attribute::ALL[rng.gen_range(0..Attribute::ALL.len())];
        next.attributes.adjust(attribute, LEVEL_UP_BONUS);
        events.push(ProgressionEvent::AttributeRaised {
            attribute,
            value: next.attributes.get(attribute),
        });

        if new_level % 5 == 0 {
            let badge = format!("Level {}", new_level);
            if next.badges.insert(badge.clone()) {
                events.push(ProgressionEvent::BadgeEarned(badge));
            }
        }

        tracing::info!(
            "Level up: {} -> {} ({:?} now {})",
            old_level,
            new_level,
            attribute,
            next.attributes.get(attribute)
        );
    }

    tracing::debug!(
        "Added {} xp: {} -> {}",
        amount,
        state.experience_points,
        next.experience_points
    );

    Transition {
        state: next,
        events,
    }
}

/// Record that at least one task was completed on `today`
///
/// Streak rules:
/// 1. Already completed today: no change
/// 2. Last completion yesterday, or never: streak +1, endurance +2
/// 3. Anything else: streak restarts at 1, endurance -5
///
/// Streak badges are awarded when the streak lands exactly on 7, 30 or 100.
pub fn complete_for_day(state: &ProgressionState, today: NaiveDate) -> Transition {
    if state.last_completed_date == Some(today) {
        tracing::debug!("Already completed a task on {}", today);
        return Transition {
            state: state.clone(),
            events: Vec::new(),
        };
    }

    let mut next = state.clone();
    let mut events = Vec::new();
    let yesterday = today.pred_opt();

    match state.last_completed_date {
        None => {
            next.current_streak = 1;
            next.attributes
                .adjust(Attribute::Endurance, STREAK_ENDURANCE_BONUS);
            events.push(ProgressionEvent::StreakStarted);
        }
        Some(last) if Some(last) == yesterday => {
            next.current_streak = state.current_streak.saturating_add(1);
            next.attributes
                .adjust(Attribute::Endurance, STREAK_ENDURANCE_BONUS);
            events.push(ProgressionEvent::StreakContinued(next.current_streak));
        }
        Some(last) => {
            tracing::info!(
                "Streak of {} broken (last completion {}, today {})",
                state.current_streak,
                last,
                today
            );
            next.current_streak = 1;
            next.attributes
                .adjust(Attribute::Endurance, -STREAK_BREAK_PENALTY);
            events.push(ProgressionEvent::StreakBroken {
                previous: state.current_streak,
            });
        }
    }

    for (length, badge) in STREAK_BADGES {
        if next.current_streak == length && next.badges.insert(badge.to_string()) {
            events.push(ProgressionEvent::BadgeEarned(badge.to_string()));
        }
    }

    next.last_completed_date = Some(today);

    Transition {
        state: next,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for_experience(0), 1);
        assert_eq!(level_for_experience(99), 1);
        assert_eq!(level_for_experience(100), 2);
        assert_eq!(level_for_experience(399), 2);
        assert_eq!(level_for_experience(400), 3);
        assert_eq!(level_for_experience(1_600), 5);
        assert_eq!(experience_for_next_level(1), 100);
        assert_eq!(experience_for_next_level(3), 900);
    }

    #[test]
    fn test_level_matches_float_formula() {
        for xp in (0..50_000u64).step_by(7) {
            let expected = ((xp as f64 / 100.0).sqrt().floor() as u32) + 1;
            assert_eq!(level_for_experience(xp), expected, "xp = {}", xp);
        }
    }

    #[test]
    fn test_title_ladder() {
        assert_eq!(title_for_level(1), "First Year");
        assert_eq!(title_for_level(6), "Prefect");
        assert_eq!(title_for_level(10), "Master of Tasks");
        assert_eq!(title_for_level(42), "Master of Tasks");
    }

    #[test]
    fn test_add_experience_without_level_up() {
        let state = ProgressionState::default();
        let t = add_experience(&state, 50, &mut rng());

        assert_eq!(t.state.experience_points, 50);
        assert_eq!(t.state.level(), 1);
        assert_eq!(t.state.attributes, state.attributes);
        assert!(t.events.is_empty());
    }

    #[test]
    fn test_level_up_raises_exactly_one_attribute() {
        let state = ProgressionState::default();
        let t = add_experience(&state, 100, &mut rng());

        assert_eq!(t.state.level(), 2);
        assert_eq!(t.state.experience_to_next_level(), 400);

        let raised: Vec<_> = Attribute::ALL
            .iter()
            .filter(|a| t.state.attributes.get(**a) != state.attributes.get(**a))
            .collect();
        assert_eq!(raised.len(), 1);
        assert_eq!(t.state.attributes.get(*raised[0]), 15);
        assert!(t
            .events
            .contains(&ProgressionEvent::LeveledUp { from: 1, to: 2 }));
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let state = ProgressionState::default();
        let a = add_experience(&state, 100, &mut ChaCha8Rng::seed_from_u64(7));
        let b = add_experience(&state, 100, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a.state, b.state);
    }

    #[test]
    fn test_multi_level_jump_gives_single_bump() {
        let state = ProgressionState::default();
        // Straight from level 1 to level 4
        let t = add_experience(&state, 900, &mut rng());

        assert_eq!(t.state.level(), 4);
        let total: u32 = Attribute::ALL
            .iter()
            .map(|a| t.state.attributes.get(*a) as u32)
            .sum();
        assert_eq!(total, 35);
    }

    #[test]
    fn test_level_five_badge_awarded_once() {
        let state = ProgressionState {
            experience_points: 1_500,
            ..Default::default()
        };
        let t = add_experience(&state, 100, &mut rng());
        assert_eq!(t.state.level(), 5);
        assert!(t.state.badges.contains("Level 5"));
        assert!(t
            .events
            .contains(&ProgressionEvent::BadgeEarned("Level 5".into())));

        // Staying on level 5 does not award it again
        let again = add_experience(&t.state, 10, &mut rng());
        assert_eq!(again.state.badges.len(), 1);
        assert!(again.events.is_empty());
    }

    #[test]
    fn test_skipped_multiple_of_five_not_awarded() {
        let state = ProgressionState {
            experience_points: 1_500,
            ..Default::default()
        };
        // Level 4 -> 6 skips over 5
        let t = add_experience(&state, 1_000, &mut rng());
        assert_eq!(t.state.level(), 6);
        assert!(t.state.badges.is_empty());
    }

    #[test]
    fn test_attributes_never_exceed_max() {
        let mut state = ProgressionState::default();
        let mut rng = rng();
        for _ in 0..200 {
            let needed = state.experience_to_next_level() - state.experience_points;
            state = add_experience(&state, needed as i64, &mut rng).state;
        }
        for attribute in Attribute::ALL {
            assert!(state.attributes.get(attribute) <= 100);
        }
        assert_eq!(state.level(), 201);
    }

    #[test]
    fn test_no_drift_after_many_additions() {
        let mut state = ProgressionState::default();
        let mut rng = rng();
        let mut total = 0u64;
        for amount in [5, 95, 300, 1, 0, 1_234, 77, 10_000] {
            state = add_experience(&state, amount, &mut rng).state;
            total += amount as u64;
        }
        assert_eq!(state.experience_points, total);
        assert_eq!(state.level(), level_for_experience(total));

        let reloaded: ProgressionState =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(reloaded.level(), state.level());
        assert_eq!(
            reloaded.experience_to_next_level(),
            state.experience_to_next_level()
        );
    }

    #[test]
    fn test_experience_near_max_does_not_overflow() {
        let mut state = ProgressionState::default();
        for _ in 0..2 {
            state = add_experience(&state, i64::MAX, &mut rng()).state;
        }

        assert_eq!(state.experience_points, u64::MAX - 1);
        assert_eq!(state.level(), 429_496_730);
        assert_eq!(state.experience_to_next_level(), u64::MAX);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["xpToNextLevel"], u64::MAX);
    }

    #[test]
    fn test_negative_experience_saturates() {
        let state = ProgressionState {
            experience_points: 150,
            ..Default::default()
        };
        let t = add_experience(&state, -500, &mut rng());
        assert_eq!(t.state.experience_points, 0);
        assert_eq!(t.state.level(), 1);
        assert_eq!(t.state.attributes, state.attributes);
    }

    #[test]
    fn test_first_completion_starts_streak() {
        let state = ProgressionState::default();
        let t = complete_for_day(&state, day(1));

        assert_eq!(t.state.current_streak, 1);
        assert_eq!(t.state.attributes.endurance(), 12);
        assert_eq!(t.state.last_completed_date, Some(day(1)));
        assert_eq!(t.events, vec![ProgressionEvent::StreakStarted]);
    }

    #[test]
    fn test_same_day_completion_is_noop() {
        let first = complete_for_day(&ProgressionState::default(), day(1)).state;
        let second = complete_for_day(&first, day(1));

        assert!(second.is_noop(&first));
        assert_eq!(second.state.current_streak, 1);
    }

    #[test]
    fn test_consecutive_days_continue_streak() {
        let s1 = complete_for_day(&ProgressionState::default(), day(1)).state;
        let s2 = complete_for_day(&s1, day(2)).state;

        assert_eq!(s2.current_streak, 2);
        assert_eq!(s2.attributes.endurance(), 14);
    }

    #[test]
    fn test_gap_resets_streak() {
        let s1 = complete_for_day(&ProgressionState::default(), day(1)).state;
        let t = complete_for_day(&s1, day(4));

        assert_eq!(t.state.current_streak, 1);
        assert_eq!(t.state.attributes.endurance(), 7);
        assert_eq!(
            t.events,
            vec![ProgressionEvent::StreakBroken { previous: 1 }]
        );
    }

    #[test]
    fn test_completion_before_last_date_breaks_streak() {
        let s = complete_for_day(&ProgressionState::default(), day(10)).state;
        let t = complete_for_day(&s, day(9));
        assert_eq!(t.state.current_streak, 1);
        assert_eq!(t.state.last_completed_date, Some(day(9)));
    }

    #[test]
    fn test_endurance_never_below_zero() {
        let mut state = ProgressionState::default();
        // Completing every third day keeps breaking the streak
        for d in (1..=31).step_by(3) {
            state = complete_for_day(&state, day(d)).state;
        }
        assert_eq!(state.attributes.endurance(), 0);
        assert_eq!(state.current_streak, 1);
    }

    #[test]
    fn test_streak_badge_awarded_exactly_once() {
        let mut state = ProgressionState::default();
        let start = day(1);
        for offset in 0..10 {
            let today = start + chrono::Duration::days(offset);
            // Several completions per day
            for _ in 0..3 {
                state = complete_for_day(&state, today).state;
            }
        }
        assert_eq!(state.current_streak, 10);
        assert_eq!(
            state.badges.iter().filter(|b| *b == "7-Day Streak").count(),
            1
        );
    }

    #[test]
    fn test_streak_badges_at_thirty_and_hundred() {
        let mut state = ProgressionState::default();
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut earned = Vec::new();
        for offset in 0..100 {
            let t = complete_for_day(&state, start + chrono::Duration::days(offset));
            for event in &t.events {
                if let ProgressionEvent::BadgeEarned(name) = event {
                    earned.push(name.clone());
                }
            }
            state = t.state;
        }
        assert_eq!(
            earned,
            vec!["7-Day Streak", "30-Day Streak", "100-Day Streak"]
        );
        assert_eq!(state.attributes.endurance(), 100);
    }
}
