// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Latest-value throttle (spec.md §4.2): rate-limits a stream of values to
//! at most `hz` emissions per second, coalescing intermediate values to the
//! newest. Modeled on the teacher's single-pending-slot bookkeeping in
//! `upstream/bridge.rs` (one `PendingRequest` replaces the last), adapted to
//! a self-canceling timer instead of correlation-id routing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A push function that rate-limits emissions to an inner emitter.
///
/// Construct with [`LatestValueThrottle::new`]; call [`LatestValueThrottle::push`]
/// for every incoming value. When `hz` is `None` or non-positive, the
/// throttle degrades to a passthrough (spec.md §4.2 clause 4).
pub struct LatestValueThrottle<T, F> {
    period: Option<Duration>,
    emit: Arc<F>,
    pending: Arc<Mutex<PendingState<T>>>,
}

impl<T, F> Clone for LatestValueThrottle<T, F> {
    fn clone(&self) -> Self {
        Self {
            period: self.period,
            emit: Arc::clone(&self.emit),
            pending: Arc::clone(&self.pending),
        }
    }
}

struct PendingState<T> {
    /// The most recently pushed value not yet emitted, and whether a timer
    /// is currently pending to emit it.
    value: Option<T>,
    timer_running: bool,
    /// Guard against concurrent emissions: true once the quiet period after
    /// the last emission has not yet elapsed.
    in_quiet_period: bool,
}

impl<T, F> LatestValueThrottle<T, F>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    pub fn new(hz: Option<f64>, emit: F) -> Self {
        let period = match hz {
            Some(hz) if hz > 0.0 => Some(Duration::from_secs_f64(1.0 / hz)),
            _ => None,
        };
        Self {
            period,
            emit: Arc::new(emit),
            pending: Arc::new(Mutex::new(PendingState {
                value: None,
                timer_running: false,
                in_quiet_period: false,
            })),
        }
    }

    /// Push a new value through the throttle.
    pub async fn push(&self, value: T) {
        let Some(period) = self.period else {
            (self.emit)(value);
            return;
        };

        let mut guard = self.pending.lock().await;
        if !guard.in_quiet_period {
            // Quiet period elapsed (or first value ever): emit immediately
            // and start a new quiet period.
            guard.in_quiet_period = true;
            guard.value = None;
            drop(guard);
            (self.emit)(value);
            self.arm_quiet_period_timer(period);
            return;
        }

        // Still within the quiet period: coalesce — replace any pending value.
        guard.value = Some(value);
        if !guard.timer_running {
            guard.timer_running = true;
            drop(guard);
            self.arm_coalesce_timer(period);
        }
    }

    /// After an immediate emission, schedule the end of this quiet period so
    /// the *next* push is eligible to emit immediately again (if nothing
    /// arrives in between, no timer fires — `in_quiet_period` is cleared by
    /// `arm_coalesce_timer` instead when a value does arrive).
    fn arm_quiet_period_timer(&self, period: Duration) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let mut guard = pending.lock().await;
            if !guard.timer_running {
                guard.in_quiet_period = false;
            }
        })
    }

    /// Fires once at the end of the quiet period following a coalesced push:
    /// emits the latest pending value (if any) and re-arms the next quiet
    /// period.
    fn arm_coalesce_timer(&self, period: Duration) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let emit = Arc::clone(&self.emit);
        tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let value = {
                let mut guard = pending.lock().await;
                guard.timer_running = false;
                guard.value.take()
            };
            if let Some(value) = value {
                emit(value);
            }
            let mut guard = pending.lock().await;
            guard.in_quiet_period = false;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn passthrough_when_hz_is_none() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&received);
        let throttle = LatestValueThrottle::new(None, move |v: i32| {
            let r = Arc::clone(&r);
            tokio::spawn(async move { r.lock().await.push(v) });
        });
        for v in 0..5 {
            throttle.push(v).await;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert_eq!(*received.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn passthrough_when_hz_non_positive() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let throttle = LatestValueThrottle::new(Some(0.0), move |_: i32| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        for v in 0..3 {
            throttle.push(v).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_value_emits_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let throttle = LatestValueThrottle::new(Some(10.0), move |_: i32| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        throttle.push(1).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn p2_coalesces_within_quiet_period_to_last_value() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&received);
        // 10 Hz -> 100ms quiet period.
        let throttle = LatestValueThrottle::new(Some(10.0), move |v: i32| {
            let r = Arc::clone(&r);
            let v = v;
            tokio::spawn(async move { r.lock().await.push(v) });
        });

        throttle.push(1).await; // emits immediately
        throttle.push(2).await; // coalesced
        throttle.push(3).await; // coalesced, replaces 2

        tokio::time::sleep(StdDuration::from_millis(150)).await;

        let got = received.lock().await.clone();
        assert_eq!(got, vec![1, 3], "expected immediate emit of 1 then coalesced emit of 3");
    }

    #[tokio::test]
    async fn p1_rate_is_bounded_and_last_value_eventually_emitted() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&received);
        let throttle = LatestValueThrottle::new(Some(20.0), move |v: i32| {
            let r = Arc::clone(&r);
            tokio::spawn(async move { r.lock().await.push(v) });
        });

        for v in 0..10 {
            throttle.push(v).await;
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        let got = received.lock().await.clone();
        assert!(!got.is_empty());
        assert_eq!(*got.last().unwrap(), 9, "last pushed value must eventually be emitted");
    }
}
