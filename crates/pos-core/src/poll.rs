//! Bounded Polling
//!
//! Drives the "did the processor confirm my checkout yet?" loop the front end
//! runs after being redirected back from the hosted checkout page.
//!
//! The loop is runtime-agnostic: the caller supplies the probe and the sleep
//! function (`gloo_timers` in the browser, `tokio::time::sleep` in tests), and
//! a [`CancellationToken`] tied to the lifetime of the view that owns it.
//!
//! ```rust,ignore
//! let token = CancellationToken::new();
//! on_cleanup({ let token = token.clone(); move || token.cancel() });
//!
//! let outcome = poll_until(&PollPolicy::default(), &token, |_| check(), sleep).await;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::future::{Either, select};
use tokio_util::sync::CancellationToken;

/// Retry schedule for a poll loop
#[derive(Clone, Debug)]
pub struct PollPolicy {
    /// Probes attempted before giving up (including the first)
    pub max_attempts: u32,

    /// Delay after the first unsuccessful probe
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 1.5,
        }
    }
}

impl PollPolicy {
    /// Delay to wait after probe number `attempt` (0-based) came back empty
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss
    )]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Worst-case time spent sleeping before the loop gives up
    pub fn total_wait(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .sum()
    }
}

/// How a poll loop ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// A probe produced a value
    Ready(T),

    /// Every attempt came back empty or failed
    Exhausted { attempts: u32 },

    /// The owning view went away
    Cancelled,
}

/// Run `probe` until it yields `Some`, the policy runs out, or `cancel` fires.
///
/// Probe errors are logged and treated like an empty result: the loop backs
/// off and tries again.
pub async fn poll_until<T, E, P, PF, S, SF>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut probe: P,
    mut sleep: S,
) -> PollOutcome<T>
where
    E: Display,
    P: FnMut(u32) -> PF,
    PF: Future<Output = Result<Option<T>, E>>,
    S: FnMut(Duration) -> SF,
    SF: Future<Output = ()>,
{
    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let probed = match select(pin!(probe(attempt)), pin!(cancel.cancelled())).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => return PollOutcome::Cancelled,
        };

        match probed {
            Ok(Some(value)) => return PollOutcome::Ready(value),
            Ok(None) => tracing::debug!(attempt, "Poll probe not ready"),
            Err(e) => tracing::warn!(attempt, error = %e, "Poll probe failed"),
        }

        if attempt + 1 == policy.max_attempts {
            break;
        }

        let delay = policy.delay_for(attempt);
        if let Either::Right(_) = select(pin!(sleep(delay)), pin!(cancel.cancelled())).await {
            return PollOutcome::Cancelled;
        }
    }

    PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}
