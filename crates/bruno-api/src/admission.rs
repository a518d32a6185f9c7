//! Admission controller.
//!
//! Sliding-window limiter keyed by caller IP. Each caller keeps the instants
//! of its admissions inside the current window; a request is admitted while
//! fewer than `budget` of them remain. Check-and-record happens under one
//! lock, so concurrent requests from one caller never overshoot the budget.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;
use tracing::warn;

use crate::error::ApiError;
use crate::metrics;
use crate::middleware::client_ip;

/// Callers tracked before idle entries are swept.
const MAX_TRACKED_CALLERS: usize = 10_000;

/// Outcome of one admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: usize },
    Rejected { retry_after: Duration },
}

#[derive(Debug)]
pub struct AdmissionController {
    name: &'static str,
    window: Duration,
    budget: usize,
    ledger: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl AdmissionController {
    /// `name` labels logs and metrics, e.g. `pipeline` or `debug`.
    pub fn new(name: &'static str, window: Duration, budget: usize) -> Self {
        Self {
            name,
            window,
            budget,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decide for `caller` and, when admitted, record the admission.
    pub fn check(&self, caller: IpAddr) -> Admission {
        let now = Instant::now();
        let mut ledger = self.ledger();

        if ledger.len() >= MAX_TRACKED_CALLERS && !ledger.contains_key(&caller) {
            let window = self.window;
            ledger.retain(|_, admitted| {
                prune(admitted, now, window);
                !admitted.is_empty()
            });
        }

        let admitted = ledger.entry(caller).or_default();
        prune(admitted, now, self.window);

        if admitted.len() >= self.budget {
            let retry_after = admitted
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Admission::Rejected { retry_after };
        }

        admitted.push_back(now);
        Admission::Admitted {
            remaining: self.budget - admitted.len(),
        }
    }

    /// Human-readable budget, e.g. `3 per 1 hour`.
    pub fn describe(&self) -> String {
        let secs = self.window.as_secs();
        let (count, unit) = if secs >= 3600 && secs % 3600 == 0 {
            (secs / 3600, "hour")
        } else if secs >= 60 && secs % 60 == 0 {
            (secs / 60, "minute")
        } else {
            (secs, "second")
        };
        format!("{} per {} {}", self.budget, count, unit)
    }

    fn ledger(&self) -> MutexGuard<'_, HashMap<IpAddr, VecDeque<Instant>>> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn prune(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while admitted
        .front()
        .is_some_and(|t| now.duration_since(*t) >= window)
    {
        admitted.pop_front();
    }
}

/// Reject over-budget callers before the body is read or any stage runs.
pub async fn admission_middleware(
    State(controller): State<Arc<AdmissionController>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let caller = client_ip(&request);

    match controller.check(caller) {
        Admission::Admitted { .. } => next.run(request).await,
        Admission::Rejected { retry_after } => {
            warn!(
                caller = %caller,
                budget = controller.name(),
                retry_after_s = retry_after.as_secs(),
                "admission rejected"
            );
            metrics::record_admission_rejected(controller.name());
            ApiError::RateLimited {
                limit: controller.describe(),
                // Round up so a client retrying on time is admitted.
                retry_after_secs: retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0),
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const HOUR: Duration = Duration::from_secs(3600);

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_run_in_window_is_rejected() {
        let controller = AdmissionController::new("pipeline", HOUR, 3);

        assert_eq!(controller.check(ip(1)), Admission::Admitted { remaining: 2 });
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(controller.check(ip(1)), Admission::Admitted { remaining: 1 });
        assert_eq!(controller.check(ip(1)), Admission::Admitted { remaining: 0 });

        match controller.check(ip(1)) {
            Admission::Rejected { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(3000));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_window_admits_again() {
        let controller = AdmissionController::new("pipeline", HOUR, 3);
        for _ in 0..3 {
            controller.check(ip(1));
        }
        assert!(matches!(controller.check(ip(1)), Admission::Rejected { .. }));

        tokio::time::advance(HOUR).await;
        assert_eq!(controller.check(ip(1)), Admission::Admitted { remaining: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_per_admission() {
        let controller = AdmissionController::new("pipeline", HOUR, 2);
        controller.check(ip(1));
        tokio::time::advance(Duration::from_secs(1800)).await;
        controller.check(ip(1));

        // Only the first admission has left the window.
        tokio::time::advance(Duration::from_secs(1800)).await;
        assert_eq!(controller.check(ip(1)), Admission::Admitted { remaining: 0 });
        assert!(matches!(controller.check(ip(1)), Admission::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_callers_are_independent() {
        let controller = AdmissionController::new("debug", HOUR, 1);
        assert!(matches!(controller.check(ip(1)), Admission::Admitted { .. }));
        assert!(matches!(controller.check(ip(1)), Admission::Rejected { .. }));
        assert!(matches!(controller.check(ip(2)), Admission::Admitted { .. }));
        assert_eq!(controller.check(ip(3)), Admission::Admitted { remaining: 0 });
    }

    #[tokio::test]
    async fn test_concurrent_checks_never_exceed_budget() {
        let controller = Arc::new(AdmissionController::new("pipeline", HOUR, 3));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move { controller.check(ip(9)) })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Admission::Admitted { .. }) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
    }

    #[test]
    fn test_describe() {
        assert_eq!(AdmissionController::new("p", HOUR, 3).describe(), "3 per 1 hour");
        assert_eq!(
            AdmissionController::new("p", Duration::from_secs(120), 5).describe(),
            "5 per 2 minute"
        );
        assert_eq!(
            AdmissionController::new("p", Duration::from_secs(90), 5).describe(),
            "5 per 90 second"
        );
    }
}
