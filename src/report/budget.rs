use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Limits how many defect frames are attached per second.
///
/// Fixed one-second windows: the first acquisition opens a window and at
/// most `max_per_second` acquisitions succeed until it closes.
#[derive(Clone, Debug)]
pub struct CaptureBudget {
    max_per_second: u32,
    window_start: Option<Instant>,
    used: u32,
}

impl CaptureBudget {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            window_start: None,
            used: 0,
        }
    }

    pub fn max_per_second(&self) -> u32 {
        self.max_per_second
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if self.max_per_second == 0 {
            return false;
        }
        let expired = self
            .window_start
            .map_or(true, |start| now.saturating_duration_since(start) >= WINDOW);
        if expired {
            self.window_start = Some(now);
            self.used = 0;
        }
        if self.used < self.max_per_second {
            self.used += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_refills_each_second() {
        let mut budget = CaptureBudget::new(2);
        let t0 = Instant::now();
        assert!(budget.try_acquire_at(t0));
        assert!(budget.try_acquire_at(t0 + Duration::from_millis(100)));
        assert!(!budget.try_acquire_at(t0 + Duration::from_millis(900)));
        assert!(budget.try_acquire_at(t0 + Duration::from_millis(1000)));
        assert!(budget.try_acquire_at(t0 + Duration::from_millis(1500)));
        assert!(!budget.try_acquire_at(t0 + Duration::from_millis(1999)));
    }

    #[test]
    fn zero_budget_never_attaches() {
        let mut budget = CaptureBudget::new(0);
        assert!(!budget.try_acquire());
    }
}
