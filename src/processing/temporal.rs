use crate::domain::EventStatus;
use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for tests and replays.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Decide whether an event has already happened.
///
/// A `completed` status wins over the calendar. Otherwise the start instant
/// is compared strictly against `now`; end dates are not consulted.
pub fn classify(status: Option<EventStatus>, date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    if status == Some(EventStatus::Completed) {
        return true;
    }
    date < now
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_completed_is_past_even_in_the_future() {
        let future = now() + Duration::days(30);
        assert!(classify(Some(EventStatus::Completed), future, now()));
    }

    #[test]
    fn test_future_without_status_is_upcoming() {
        let future = now() + Duration::minutes(1);
        assert!(!classify(None, future, now()));
    }

    #[test]
    fn test_comparison_is_strict() {
        assert!(!classify(None, now(), now()));
        assert!(classify(None, now() - Duration::seconds(1), now()));
    }

    #[test]
    fn test_other_statuses_follow_the_clock() {
        let past = now() - Duration::days(1);
        let future = now() + Duration::days(1);
        for status in [
            EventStatus::Draft,
            EventStatus::Published,
            EventStatus::Cancelled,
        ] {
            assert!(classify(Some(status), past, now()));
            assert!(!classify(Some(status), future, now()));
        }
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(now());
        assert_eq!(clock.now(), now());
    }
}
