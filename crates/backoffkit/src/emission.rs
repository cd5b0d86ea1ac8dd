//! Cancellable, delayed single-shot notifications.
//!
//! A [`BackoffEmission`] computes a backoff once, at creation, and then
//! behaves as a [`Stream`] that yields [`BackoffEvent::Elapsed`] after the
//! final delay and ends. It can be cancelled at any point before that, from
//! the consuming task or from anywhere else via an [`EmissionHandle`].
//!
//! # Examples
//!
//! ```rust
//! use backoffkit::{EmissionConfig, backoff_emission};
//!
//! # async fn example() {
//! let emission = backoff_emission(2, Some(&EmissionConfig::default()));
//! let handle = emission.handle();
//!
//! // Somewhere else: the operation recovered, stop waiting.
//! handle.cancel();
//!
//! assert_eq!(emission.elapsed().await, None);
//! # }
//! ```

use backoffkit_core::{BackoffConfig, BackoffResult, IntoAttempt, compute_with_rng};
use futures::{Stream, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::time::Sleep;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info};

/// Configuration for a [`BackoffEmission`].
///
/// Extends [`BackoffConfig`] with two adapter-only switches. The serde form
/// is flat: `{"baseDelay": 500, "emitValue": true, "debug": false}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmissionConfig {
    /// Backoff parameters.
    #[serde(flatten)]
    pub backoff: BackoffConfig,

    /// Yield [`BackoffEvent::Scheduled`] before the timed wait.
    pub emit_value: bool,

    /// Log the computed backoff at `info` level when the emission is created.
    pub debug: bool,
}

impl EmissionConfig {
    /// Wrap backoff parameters with both switches off.
    pub fn new(backoff: BackoffConfig) -> Self {
        Self {
            backoff,
            ..Self::default()
        }
    }

    /// Set whether the computed delay is emitted before the wait.
    pub fn with_emit_value(mut self, emit_value: bool) -> Self {
        self.emit_value = emit_value;
        self
    }

    /// Set whether creation is logged.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl From<BackoffConfig> for EmissionConfig {
    fn from(backoff: BackoffConfig) -> Self {
        Self::new(backoff)
    }
}

/// An item yielded by a [`BackoffEmission`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffEvent {
    /// The computed backoff, before waiting. Only with `emit_value`.
    Scheduled(BackoffResult),

    /// The delay has elapsed. Always the last item.
    Elapsed(BackoffResult),
}

impl BackoffEvent {
    /// The backoff this event carries.
    pub fn result(&self) -> &BackoffResult {
        match self {
            Self::Scheduled(result) | Self::Elapsed(result) => result,
        }
    }
}

/// Pending timer shared between an emission and its handles.
type SharedTimer = Arc<Mutex<Option<Pin<Box<Sleep>>>>>;

fn lock_timer(timer: &SharedTimer) -> MutexGuard<'_, Option<Pin<Box<Sleep>>>> {
    // The guarded value is a plain Option, so a poisoned lock is still usable.
    timer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancels a [`BackoffEmission`] from outside the consuming task.
///
/// Cheap to clone; all clones cancel the same emission.
#[derive(Clone)]
pub struct EmissionHandle {
    token: CancellationToken,
    timer: SharedTimer,
}

impl EmissionHandle {
    /// Cancel the emission and release its timer. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
        lock_timer(&self.timer).take();
    }

    /// Whether the emission has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl std::fmt::Debug for EmissionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmissionHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A delayed notification carrying one backoff calculation.
///
/// # Stream behavior
///
/// 1. With `emit_value`, yields [`BackoffEvent::Scheduled`] immediately.
/// 2. After the final delay, yields [`BackoffEvent::Elapsed`].
/// 3. Ends.
///
/// Cancellation is checked before the timer on every poll. Both
/// [`cancel`](Self::cancel) and [`EmissionHandle::cancel`] drop the timer
/// before returning, and afterwards the stream only ever yields `None`, so a
/// notification can never be observed after cancellation.
///
/// The timer is created at construction, so the delay counts from creation,
/// not from the first poll. Requires a tokio runtime with the time driver.
pub struct BackoffEmission {
    result: BackoffResult,
    pending_value: bool,
    timer: SharedTimer,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl BackoffEmission {
    /// Compute the backoff for `attempt` and schedule its notification.
    pub fn new(attempt: impl IntoAttempt, config: &EmissionConfig) -> Self {
        Self::with_rng(attempt, config, &mut rand::thread_rng())
    }

    /// Like [`new`](Self::new) with a caller-supplied jitter source.
    pub fn with_rng<R>(attempt: impl IntoAttempt, config: &EmissionConfig, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let result = compute_with_rng(attempt, &config.backoff, rng);

        if config.debug {
            info!(
                attempt = result.retry_attempt(),
                final_delay_ms = result.final_delay_ms(),
                raw_delay_ms = result.raw_delay_ms(),
                capped = result.was_capped(),
                jitter_offset_ms = result.jitter_offset_ms(),
                "{result}"
            );
        }

        let token = CancellationToken::new();
        Self {
            result,
            pending_value: config.emit_value,
            timer: Arc::new(Mutex::new(Some(Box::pin(tokio::time::sleep(
                result.final_delay(),
            ))))),
            cancelled: Box::pin(token.clone().cancelled_owned()),
            token,
        }
    }

    /// The backoff computed for this emission.
    pub fn result(&self) -> &BackoffResult {
        &self.result
    }

    /// A handle that can cancel this emission from another task.
    pub fn handle(&self) -> EmissionHandle {
        EmissionHandle {
            token: self.token.clone(),
            timer: Arc::clone(&self.timer),
        }
    }

    /// Cancel the emission and release its timer.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.close();
    }

    /// Whether the emission was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the stream can yield no further items.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || lock_timer(&self.timer).is_none()
    }

    /// Wait for the delay to elapse.
    ///
    /// Returns the backoff once the delay has passed, or `None` if the
    /// emission was cancelled first.
    pub async fn elapsed(mut self) -> Option<BackoffResult> {
        while let Some(event) = self.next().await {
            if let BackoffEvent::Elapsed(result) = event {
                return Some(result);
            }
        }
        None
    }

    fn close(&mut self) {
        self.pending_value = false;
        lock_timer(&self.timer).take();
    }
}

impl Stream for BackoffEmission {
    type Item = BackoffEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if lock_timer(&this.timer).is_none() {
            this.pending_value = false;
            return Poll::Ready(None);
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            debug!(attempt = this.result.retry_attempt(), "backoff emission cancelled");
            this.close();
            return Poll::Ready(None);
        }

        if this.pending_value {
            this.pending_value = false;
            return Poll::Ready(Some(BackoffEvent::Scheduled(this.result)));
        }

        let fired = match lock_timer(&this.timer).as_mut() {
            Some(sleep) => sleep.as_mut().poll(cx).is_ready(),
            None => return Poll::Ready(None),
        };
        if fired {
            this.close();
            Poll::Ready(Some(BackoffEvent::Elapsed(this.result)))
        } else {
            Poll::Pending
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.is_closed() {
            (0, Some(0))
        } else {
            let remaining = 1 + usize::from(self.pending_value);
            (0, Some(remaining))
        }
    }
}

impl std::fmt::Debug for BackoffEmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffEmission")
            .field("result", &self.result)
            .field("pending_value", &self.pending_value)
            .field("cancelled", &self.is_cancelled())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Create a [`BackoffEmission`] for `attempt`.
///
/// `None` uses [`EmissionConfig::default`].
pub fn backoff_emission(
    attempt: impl IntoAttempt,
    config: Option<&EmissionConfig>,
) -> BackoffEmission {
    match config {
        Some(config) => BackoffEmission::new(attempt, config),
        None => BackoffEmission::new(attempt, &EmissionConfig::default()),
    }
}

/// A reusable per-attempt delay callback.
///
/// The returned closure maps a 1-based retry count onto a fresh
/// [`BackoffEmission`], which is the shape most retry orchestrators expect
/// for "retry with a computed delay".
///
/// # Examples
///
/// ```rust
/// use backoffkit::{BackoffConfig, EmissionConfig, retry_delay_fn};
///
/// # async fn example() {
/// let delay = retry_delay_fn(EmissionConfig::new(BackoffConfig::default()));
///
/// let emission = delay(3);
/// assert_eq!(emission.result().retry_attempt(), 3);
/// # }
/// ```
pub fn retry_delay_fn(
    config: EmissionConfig,
) -> impl Fn(u32) -> BackoffEmission + Clone + Send + Sync {
    move |attempt| BackoffEmission::new(attempt, &config)
}

/// [`retry_delay_fn`] with default backoff parameters and creation logging on.
pub fn debug_retry_delay_fn() -> impl Fn(u32) -> BackoffEmission + Clone + Send + Sync {
    retry_delay_fn(EmissionConfig::default().with_debug(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn deterministic() -> EmissionConfig {
        EmissionConfig::new(BackoffConfig::default().with_jitter_factor(0.0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_after_delay() {
        let start = Instant::now();
        let emission = BackoffEmission::new(1, &deterministic());

        let result = emission.elapsed().await.unwrap();

        assert_eq!(result.final_delay_ms(), 1000.0);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_emission_then_end() {
        let mut emission = BackoffEmission::new(2, &deterministic());

        let event = emission.next().await.unwrap();
        assert!(matches!(event, BackoffEvent::Elapsed(r) if r.final_delay_ms() == 2000.0));
        assert!(emission.next().await.is_none());
        assert!(emission.is_closed());
        assert!(!emission.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_value_yields_scheduled_first() {
        let config = deterministic().with_emit_value(true);
        let mut emission = task::spawn(BackoffEmission::new(3, &config));

        let expected = *emission.result();
        assert_ready_eq!(emission.poll_next(), Some(BackoffEvent::Scheduled(expected)));
        assert_pending!(emission.poll_next());

        tokio::time::advance(Duration::from_millis(4001)).await;
        assert!(emission.is_woken());
        assert_ready_eq!(emission.poll_next(), Some(BackoffEvent::Elapsed(expected)));
        assert_ready_eq!(emission.poll_next(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_until_delay() {
        let mut emission = task::spawn(BackoffEmission::new(1, &deterministic()));

        assert_pending!(emission.poll_next());
        tokio::time::advance(Duration::from_millis(999)).await;
        assert_pending!(emission.poll_next());
        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(matches!(
            emission.poll_next(),
            Poll::Ready(Some(BackoffEvent::Elapsed(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_fire_never_delivers() {
        let emission = BackoffEmission::new(1, &deterministic());
        let handle = emission.handle();
        let consumer = tokio::spawn(emission.elapsed());

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        assert_eq!(consumer.await.unwrap(), None);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_cancel_wakes_pending_consumer() {
        let emission = BackoffEmission::new(1, &deterministic());
        let handle = emission.handle();
        let mut emission = task::spawn(emission);

        assert_pending!(emission.poll_next());
        handle.cancel();
        assert!(emission.is_woken());
        assert_ready_eq!(emission.poll_next(), None);
        assert!(emission.is_closed());
        assert!(emission.is_cancelled());

        // Even after the original deadline, nothing is delivered
        tokio::time::advance(Duration::from_millis(5000)).await;
        assert_ready_eq!(emission.poll_next(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_cancel_releases_timer_without_polling() {
        let emission = BackoffEmission::new(1, &deterministic().with_emit_value(true));
        let handle = emission.handle();
        assert!(lock_timer(&emission.timer).is_some());

        handle.cancel();

        assert!(lock_timer(&emission.timer).is_none());
        assert!(emission.is_closed());
        assert_eq!(emission.size_hint(), (0, Some(0)));
        assert_eq!(emission.elapsed().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_deadline_but_before_poll() {
        let mut emission = BackoffEmission::new(1, &deterministic().with_emit_value(true));

        tokio::time::advance(Duration::from_millis(2000)).await;
        emission.cancel();

        assert!(emission.next().await.is_none());
        assert!(emission.is_cancelled());
        assert_eq!(emission.size_hint(), (0, Some(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_rng_applies_jitter() {
        let config = EmissionConfig::default();
        let emission = BackoffEmission::with_rng(1, &config, &mut StepRng::new(0, 0));

        assert_eq!(emission.result().final_delay_ms(), 800.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_emission_defaults() {
        let emission = backoff_emission(0, None);

        assert_eq!(emission.result().retry_attempt(), 1);
        assert_eq!(emission.result().capped_delay_ms(), 1000.0);
        assert_eq!(emission.size_hint(), (0, Some(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_fn_maps_attempts() {
        let delay = retry_delay_fn(deterministic());

        let delays: Vec<f64> = (1..=4)
            .map(|attempt| delay(attempt).result().final_delay_ms())
            .collect();

        assert_eq!(delays, vec![1000.0, 2000.0, 4000.0, 5000.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_retry_delay_fn() {
        let delay = debug_retry_delay_fn();

        let emission = delay(4);
        assert_eq!(emission.result().retry_attempt(), 4);
        assert_eq!(emission.result().capped_delay_ms(), 5000.0);
    }

    #[test]
    fn test_emission_config_serde() {
        let config: EmissionConfig =
            serde_json::from_str(r#"{"baseDelay": 250, "emitValue": true, "unknown": 1}"#)
                .unwrap();

        assert_eq!(config.backoff.base_delay_ms, 250.0);
        assert_eq!(config.backoff.max_delay_ms, 5000.0);
        assert!(config.emit_value);
        assert!(!config.debug);
    }

    #[test]
    fn test_event_result_accessor() {
        let result = BackoffConfig::default().with_jitter_factor(0.0).compute(1);

        assert_eq!(BackoffEvent::Scheduled(result).result(), &result);
        assert_eq!(BackoffEvent::Elapsed(result).result(), &result);
    }
}
