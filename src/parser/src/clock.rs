use chrono::{DateTime, Utc};

/// Source of the timestamp stamped on every metric the parser creates
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant, for reproducible output
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn test_fixed_clock() {
        let instant = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), instant);
    }

    #[test]
    fn test_closure_clock_is_evaluated_on_each_call() {
        let ticks = AtomicI64::new(0);
        let clock = move || {
            let tick = ticks.fetch_add(1, Ordering::SeqCst);
            Utc.timestamp_opt(tick, 0).unwrap()
        };

        assert_eq!(Clock::now(&clock).timestamp(), 0);
        assert_eq!(Clock::now(&clock).timestamp(), 1);
    }
}
