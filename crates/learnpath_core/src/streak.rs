//! Calendar-day activity streaks.
//!
//! Days are UTC calendar days for every caller. The transition is shared by
//! chapter completion and quiz submission.

use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakState {
    pub last_active: Option<DateTime<Utc>>,
    pub streak: u32,
}

fn utc_day(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Applies one activity event at `now`.
///
/// - same UTC day as the last activity: streak unchanged
/// - last activity on the previous UTC day: streak + 1
/// - anything else, including no recorded activity at all: streak reset to 0
///
/// `last_active` always becomes `now`.
pub fn record_activity(state: StreakState, now: DateTime<Utc>) -> StreakState {
    let today = utc_day(now);
    let yesterday = today.pred_opt();

    let streak = match state.last_active.map(utc_day) {
        Some(day) if day == today => state.streak,
        Some(day) if Some(day) == yesterday => state.streak.saturating_add(1),
        // A learner with no recorded activity lands here as well and starts at 0.
        _ => 0,
    };

    StreakState {
        last_active: Some(now),
        streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn state(last_active: DateTime<Utc>, streak: u32) -> StreakState {
        StreakState {
            last_active: Some(last_active),
            streak,
        }
    }

    #[test]
    fn same_day_leaves_streak_unchanged() {
        let t = at(2024, 3, 10, 9);
        let next = record_activity(state(t, 4), t);
        assert_eq!(next.streak, 4);

        let later = record_activity(next, t + Duration::hours(14));
        assert_eq!(later.streak, 4);
        assert_eq!(later.last_active, Some(t + Duration::hours(14)));
    }

    #[test]
    fn consecutive_day_increments_by_one() {
        let next = record_activity(state(at(2024, 3, 10, 23), 4), at(2024, 3, 11, 0));
        assert_eq!(next.streak, 5);
    }

    #[test]
    fn consecutive_day_across_month_boundary() {
        let next = record_activity(state(at(2024, 2, 29, 12), 1), at(2024, 3, 1, 8));
        assert_eq!(next.streak, 2);
    }

    #[test]
    fn missed_days_reset_to_zero() {
        let next = record_activity(state(at(2024, 3, 10, 12), 9), at(2024, 3, 13, 12));
        assert_eq!(next.streak, 0);
        assert_eq!(next.last_active, Some(at(2024, 3, 13, 12)));
    }

    #[test]
    fn first_activity_resets_to_zero() {
        let now = at(2024, 3, 10, 12);
        let next = record_activity(
            StreakState {
                last_active: None,
                streak: 1,
            },
            now,
        );
        assert_eq!(next.streak, 0);
        assert_eq!(next.last_active, Some(now));
    }

    #[test]
    fn clock_moving_backwards_resets() {
        let next = record_activity(state(at(2024, 3, 12, 12), 3), at(2024, 3, 10, 12));
        assert_eq!(next.streak, 0);
    }
}
