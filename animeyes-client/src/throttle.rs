use std::time::{Duration, Instant};

/// Leading + trailing edge throttle held as plain state.
///
/// The first call of a burst fires at once. Calls arriving inside the window
/// only replace the pending value, which fires when the window closes. The
/// caller owns the clock: it passes `now` in and asks for the next
/// [`deadline`](Self::deadline) to know when to [`poll`](Self::poll).
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    window: Duration,
    last_fired: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns the value to send now, if the call falls outside the window.
    pub fn call(&mut self, value: T, now: Instant) -> Option<T> {
        match self.last_fired {
            Some(last) if now.saturating_duration_since(last) < self.window => {
                self.pending = Some(value);
                None
            }
            _ => {
                self.last_fired = Some(now);
                self.pending = None;
                Some(value)
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        self.last_fired.map(|last| last + self.window)
    }

    /// Releases the trailing value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_fired = Some(deadline);
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_fires_leading_and_last_trailing() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(50));
        let mut sent = Vec::new();

        for (i, offset) in [0, 10, 20, 30, 40].into_iter().enumerate() {
            if let Some(value) = throttle.call(i + 1, t0 + ms(offset)) {
                sent.push((offset, value));
            }
        }
        assert_eq!(sent, vec![(0, 1)]);
        assert_eq!(throttle.deadline(), Some(t0 + ms(50)));

        assert_eq!(throttle.poll(t0 + ms(49)), None);
        assert_eq!(throttle.poll(t0 + ms(50)), Some(5));
        assert_eq!(throttle.poll(t0 + ms(200)), None);
        assert_eq!(throttle.deadline(), None);
    }

    #[test]
    fn call_after_quiet_window_fires_immediately() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(50));
        assert_eq!(throttle.call("a", t0), Some("a"));
        assert_eq!(throttle.call("b", t0 + ms(60)), Some("b"));
        assert!(!throttle.has_pending());
    }

    #[test]
    fn trailing_fire_restarts_the_window() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(50));
        throttle.call(1, t0);
        throttle.call(2, t0 + ms(20));
        assert_eq!(throttle.poll(t0 + ms(55)), Some(2));

        // Inside the window opened by the trailing send at t0+50.
        assert_eq!(throttle.call(3, t0 + ms(70)), None);
        assert_eq!(throttle.deadline(), Some(t0 + ms(100)));
    }

    #[test]
    fn late_call_supersedes_stale_pending_value() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(50));
        throttle.call(1, t0);
        throttle.call(2, t0 + ms(10));
        // Nobody polled at t0+50; the fresh value wins and nothing trails.
        assert_eq!(throttle.call(3, t0 + ms(80)), Some(3));
        assert_eq!(throttle.poll(t0 + ms(200)), None);
    }
}
