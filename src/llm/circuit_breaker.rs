use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { tripped_at: Instant },
    /// One probe request is in flight.
    HalfOpen { probe_started: Instant },
}

/// Thresholds for skipping a provider that keeps failing.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    pub trip_threshold: u8,
    pub trip_window: Duration,
    pub cooldown: Duration,
    /// A probe that never reports back (its caller was cancelled) is
    /// released after this long.
    pub probe_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            trip_threshold: 3,
            trip_window: Duration::from_secs(300),
            cooldown: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(60),
        }
    }
}

pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u8,
    last_failure_time: Option<Instant>,
    settings: BreakerSettings,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            settings,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Open breakers move to half-open once the cooldown has elapsed,
    /// letting a single probe request through. Everyone else is refused
    /// until the probe reports success or failure.
    pub fn is_request_allowed(&mut self) -> bool {
        let now = Instant::now();
        let admit_probe = match self.state {
            CircuitState::Closed => return true,
            CircuitState::Open { tripped_at } => {
                now.duration_since(tripped_at) >= self.settings.cooldown
            }
            CircuitState::HalfOpen { probe_started } => {
                now.duration_since(probe_started) >= self.settings.probe_timeout
            }
        };

        if admit_probe {
            self.state = CircuitState::HalfOpen { probe_started: now };
        }
        admit_probe
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure_time = None;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self, provider: &str) {
        let now = Instant::now();

        // a failed half-open probe reopens immediately
        if matches!(self.state, CircuitState::HalfOpen { .. }) {
            self.failure_count = self.settings.trip_threshold;
        } else {
            match self.last_failure_time {
                Some(last) if now.duration_since(last) <= self.settings.trip_window => {
                    self.failure_count = self.failure_count.saturating_add(1);
                }
                _ => self.failure_count = 1,
            }
        }

        self.last_failure_time = Some(now);

        if self.failure_count >= self.settings.trip_threshold {
            self.state = CircuitState::Open { tripped_at: now };
            tracing::warn!(
                provider,
                failure_count = self.failure_count,
                "Circuit breaker tripped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(cooldown: Duration) -> BreakerSettings {
        BreakerSettings {
            trip_threshold: 2,
            trip_window: Duration::from_secs(60),
            cooldown,
            probe_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_trips_after_threshold() {
        let mut cb = CircuitBreaker::new(settings(Duration::from_secs(60)));
        cb.record_failure("p");
        assert!(cb.is_request_allowed());
        cb.record_failure("p");
        assert!(matches!(cb.state(), CircuitState::Open { .. }));
        assert!(!cb.is_request_allowed());
    }

    #[test]
    fn test_half_open_after_cooldown() {
        let mut cb = CircuitBreaker::new(settings(Duration::ZERO));
        cb.record_failure("p");
        cb.record_failure("p");
        assert!(cb.is_request_allowed());
        assert!(matches!(cb.state(), CircuitState::HalfOpen { .. }));

        cb.record_failure("p");
        assert!(matches!(cb.state(), CircuitState::Open { .. }));
    }

    #[test]
    fn test_half_open_admits_one_probe() {
        let mut cb = CircuitBreaker::new(BreakerSettings {
            trip_threshold: 1,
            ..settings(Duration::ZERO)
        });
        cb.record_failure("p");

        let admitted: Vec<bool> = (0..3).map(|_| cb.is_request_allowed()).collect();
        assert_eq!(admitted, vec![true, false, false]);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_request_allowed());
        assert!(cb.is_request_allowed());
    }

    #[test]
    fn test_failed_probe_waits_for_next_cooldown() {
        let mut cb = CircuitBreaker::new(BreakerSettings {
            trip_threshold: 1,
            cooldown: Duration::from_millis(50),
            ..settings(Duration::ZERO)
        });
        cb.record_failure("p");
        assert!(!cb.is_request_allowed());

        std::thread::sleep(Duration::from_millis(60));
        assert!(cb.is_request_allowed());
        cb.record_failure("p");
        assert!(!cb.is_request_allowed());
    }

    #[test]
    fn test_abandoned_probe_is_released() {
        let mut cb = CircuitBreaker::new(BreakerSettings {
            trip_threshold: 1,
            probe_timeout: Duration::ZERO,
            ..settings(Duration::ZERO)
        });
        cb.record_failure("p");

        assert!(cb.is_request_allowed());
        // the first probe never reported back
        assert!(cb.is_request_allowed());
    }

    #[test]
    fn test_success_resets() {
        let mut cb = CircuitBreaker::new(settings(Duration::from_secs(60)));
        cb.record_failure("p");
        cb.record_success();
        cb.record_failure("p");
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
