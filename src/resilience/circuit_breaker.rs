//! Circuit breaker for outbound calls.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: testing if endpoint recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: attempts >= min_throughput and failure ratio >= threshold within window
//! Open → Half-Open: after break duration
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! One circuit per resolved authority (host:port). A single probe is allowed
//! while half-open.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::Extensions;
use dashmap::DashMap;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

use crate::config::ResilienceConfig;
use crate::resilience::retries::is_transient_status;
use crate::resilience::ResilienceError;

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_ratio: f64,
    pub min_throughput: u32,
    pub sampling_duration: Duration,
    pub break_duration: Duration,
}

impl From<&ResilienceConfig> for BreakerSettings {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            failure_ratio: config.breaker_failure_ratio,
            min_throughput: config.breaker_min_throughput.max(1),
            sampling_duration: Duration::from_secs(config.breaker_sampling_secs),
            break_duration: Duration::from_secs(config.breaker_break_secs),
        }
    }
}

/// Externally visible circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Circuit {
    Closed {
        window_start: Instant,
        attempts: u32,
        failures: u32,
    },
    Open {
        until: Instant,
    },
    HalfOpen {
        probe_started: Instant,
    },
}

impl Circuit {
    fn closed(now: Instant) -> Self {
        Circuit::Closed {
            window_start: now,
            attempts: 0,
            failures: 0,
        }
    }
}

/// Per-authority circuit breaker middleware.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    circuits: DashMap<String, Circuit>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            circuits: DashMap::new(),
        }
    }

    /// Current state for an authority. Unknown authorities are closed.
    pub fn status(&self, authority: &str) -> CircuitStatus {
        match self.circuits.get(authority).as_deref() {
            Some(Circuit::Open { .. }) => CircuitStatus::Open,
            Some(Circuit::HalfOpen { .. }) => CircuitStatus::HalfOpen,
            Some(Circuit::Closed { .. }) | None => CircuitStatus::Closed,
        }
    }

    /// Admit or reject a request.
    fn try_acquire(&self, authority: &str, now: Instant) -> std::result::Result<(), ResilienceError> {
        let mut circuit = self
            .circuits
            .entry(authority.to_string())
            .or_insert_with(|| Circuit::closed(now));

        match *circuit {
            Circuit::Closed { .. } => Ok(()),
            Circuit::Open { until } if now >= until => {
                tracing::info!(authority = %authority, "Circuit half-open, sending probe");
                *circuit = Circuit::HalfOpen { probe_started: now };
                Ok(())
            }
            Circuit::Open { until } => Err(ResilienceError::CircuitOpen {
                authority: authority.to_string(),
                retry_after: until - now,
            }),
            // A probe that never reported back is abandoned after one break duration.
            Circuit::HalfOpen { probe_started }
                if now.duration_since(probe_started) >= self.settings.break_duration =>
            {
                *circuit = Circuit::HalfOpen { probe_started: now };
                Ok(())
            }
            Circuit::HalfOpen { .. } => Err(ResilienceError::CircuitOpen {
                authority: authority.to_string(),
                retry_after: Duration::ZERO,
            }),
        }
    }

    /// Record the outcome of an admitted request.
    fn record(&self, authority: &str, success: bool, now: Instant) {
        let mut circuit = self
            .circuits
            .entry(authority.to_string())
            .or_insert_with(|| Circuit::closed(now));

        let next = match *circuit {
            Circuit::Closed {
                window_start,
                attempts,
                failures,
            } => {
                let (window_start, attempts, failures) =
                    if now.duration_since(window_start) >= self.settings.sampling_duration {
                        (now, 0, 0)
                    } else {
                        (window_start, attempts, failures)
                    };
                let attempts = attempts + 1;
                let failures = failures + u32::from(!success);
                let ratio = f64::from(failures) / f64::from(attempts);

                if attempts >= self.settings.min_throughput && ratio >= self.settings.failure_ratio {
                    tracing::warn!(
                        authority = %authority,
                        attempts,
                        failures,
                        break_secs = self.settings.break_duration.as_secs_f64(),
                        "Circuit opened"
                    );
                    Circuit::Open {
                        until: now + self.settings.break_duration,
                    }
                } else {
                    Circuit::Closed {
                        window_start,
                        attempts,
                        failures,
                    }
                }
            }
            Circuit::HalfOpen { .. } if success => {
                tracing::info!(authority = %authority, "Circuit closed after successful probe");
                Circuit::closed(now)
            }
            Circuit::HalfOpen { .. } => {
                tracing::warn!(authority = %authority, "Probe failed, circuit re-opened");
                Circuit::Open {
                    until: now + self.settings.break_duration,
                }
            }
            // Late result of a request admitted before the circuit opened.
            Circuit::Open { until } => Circuit::Open { until },
        };
        *circuit = next;
    }
}

fn authority_of(req: &Request) -> String {
    let url = req.url();
    match (url.host_str(), url.port_or_known_default()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => url.as_str().to_string(),
    }
}

#[async_trait]
impl Middleware for CircuitBreaker {
    async fn handle(&self, req: Request, extensions: &mut Extensions, next: Next<'_>) -> Result<Response> {
        let authority = authority_of(&req);
        self.try_acquire(&authority, Instant::now())
            .map_err(reqwest_middleware::Error::middleware)?;

        let result = next.run(req, extensions).await;
        let success = match &result {
            Ok(response) => !is_transient_status(response.status()),
            Err(_) => false,
        };
        self.record(&authority, success, Instant::now());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(min_throughput: u32, ratio: f64) -> CircuitBreaker {
        CircuitBreaker::new(BreakerSettings {
            failure_ratio: ratio,
            min_throughput,
            sampling_duration: Duration::from_secs(30),
            break_duration: Duration::from_secs(5),
        })
    }

    #[test]
    fn test_opens_at_ratio_after_min_throughput() {
        let cb = breaker(4, 0.5);
        let now = Instant::now();

        for success in [true, false, true] {
            cb.try_acquire("api:80", now).unwrap();
            cb.record("api:80", success, now);
        }
        assert_eq!(cb.status("api:80"), CircuitStatus::Closed);

        cb.try_acquire("api:80", now).unwrap();
        cb.record("api:80", false, now);
        assert_eq!(cb.status("api:80"), CircuitStatus::Open);

        let err = cb.try_acquire("api:80", now + Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ResilienceError::CircuitOpen { .. }));
    }

    #[test]
    fn test_circuits_are_per_authority() {
        let cb = breaker(1, 0.1);
        let now = Instant::now();
        cb.try_acquire("a:80", now).unwrap();
        cb.record("a:80", false, now);

        assert_eq!(cb.status("a:80"), CircuitStatus::Open);
        assert!(cb.try_acquire("b:80", now).is_ok());
    }

    #[test]
    fn test_half_open_single_probe() {
        let cb = breaker(1, 1.0);
        let now = Instant::now();
        cb.try_acquire("api:80", now).unwrap();
        cb.record("api:80", false, now);

        let later = now + Duration::from_secs(6);
        assert!(cb.try_acquire("api:80", later).is_ok());
        assert_eq!(cb.status("api:80"), CircuitStatus::HalfOpen);
        assert!(cb.try_acquire("api:80", later).is_err());

        cb.record("api:80", true, later);
        assert_eq!(cb.status("api:80"), CircuitStatus::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let cb = breaker(1, 1.0);
        let now = Instant::now();
        cb.try_acquire("api:80", now).unwrap();
        cb.record("api:80", false, now);

        let later = now + Duration::from_secs(6);
        cb.try_acquire("api:80", later).unwrap();
        cb.record("api:80", false, later);
        assert_eq!(cb.status("api:80"), CircuitStatus::Open);
        assert!(cb.try_acquire("api:80", later + Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_window_resets_counts() {
        let cb = breaker(2, 1.0);
        let now = Instant::now();
        cb.try_acquire("api:80", now).unwrap();
        cb.record("api:80", false, now);

        let next_window = now + Duration::from_secs(31);
        cb.try_acquire("api:80", next_window).unwrap();
        cb.record("api:80", false, next_window);
        assert_eq!(cb.status("api:80"), CircuitStatus::Closed);
    }
}
