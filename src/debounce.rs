use std::time::{Duration, Instant};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Emits the latest pushed value once `delay` has passed without another push.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: None,
        }
    }

    /// Replaces any pending value and restarts the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = matches!(
            &self.pending,
            Some((_, at)) if now.saturating_duration_since(*at) >= self.delay
        );
        if ready {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_after_quiet_period() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);
        debouncer.push("a".to_string(), t0);
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(299)), None);
        assert_eq!(
            debouncer.poll(t0 + Duration::from_millis(300)),
            Some("a".to_string())
        );
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(900)), None);
    }

    #[test]
    fn test_new_input_restarts_timer_and_keeps_latest() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);
        debouncer.push("a".to_string(), t0);
        debouncer.push("an".to_string(), t0 + Duration::from_millis(200));
        debouncer.push("ana".to_string(), t0 + Duration::from_millis(400));
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(650)), None);
        assert_eq!(
            debouncer.poll(t0 + Duration::from_millis(700)),
            Some("ana".to_string())
        );
    }

    #[test]
    fn test_cancel_drops_pending_value() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(SEARCH_DEBOUNCE);
        debouncer.push(1, t0);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert_eq!(debouncer.poll(t0 + Duration::from_secs(1)), None);
    }
}
