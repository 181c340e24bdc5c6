//! Process-global FIFO rate limiter.
//!
//! The source code this was distilled from created a fresh rate limiter per
//! client instance and only ratcheted its interval tighter over time within
//! that instance; two instances talking to the same upstream could still
//! exceed the real limit. Here there is exactly one limiter for the whole
//! process, and every caller shares the same FIFO queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Extra slack added on top of the theoretical `1000/rps` spacing, matching
/// the margin the teacher's Helius client left on its own rate-limit sleeps.
const SAFETY_MARGIN_MS: u64 = 15;

struct Inner {
    interval_ms: AtomicU64,
    next_slot: Mutex<Instant>,
}

static LIMITER: OnceLock<Inner> = OnceLock::new();

fn inner() -> &'static Inner {
    LIMITER.get_or_init(|| Inner {
        interval_ms: AtomicU64::new(0),
        next_slot: Mutex::new(Instant::now()),
    })
}

/// Registers a minimum requests-per-second ceiling. The effective interval
/// is the *maximum* (strictest) of every interval ever registered; callers
/// may ask for a tighter interval, never a looser one.
pub fn set_min_rps(rps: u64) {
    if rps == 0 {
        return;
    }
    let candidate_ms = (1000u64).div_ceil(rps) + SAFETY_MARGIN_MS;
    ratchet_interval_ms(candidate_ms);
}

/// Registers a minimum interval directly, in milliseconds.
pub fn set_min_interval_ms(interval_ms: u64) {
    ratchet_interval_ms(interval_ms);
}

fn ratchet_interval_ms(candidate_ms: u64) {
    let state = inner();
    let mut current = state.interval_ms.load(Ordering::Relaxed);
    while candidate_ms > current {
        match state.interval_ms.compare_exchange_weak(
            current,
            candidate_ms,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Returns the current effective interval between admissions.
pub fn current_interval_ms() -> u64 {
    inner().interval_ms.load(Ordering::Relaxed)
}

/// Blocks until it is this caller's turn, in strict FIFO arrival order.
///
/// Admission is granted by claiming the next free slot under a single
/// mutex (fair/FIFO in tokio) and then sleeping only for the remainder of
/// that slot, so callers queue in the order they called `acquire`, not in
/// whatever order their sleeps happen to resolve.
pub async fn acquire() {
    let state = inner();
    let interval = Duration::from_millis(state.interval_ms.load(Ordering::Relaxed));

    let wait_until = {
        let mut next_slot = state.next_slot.lock().await;
        let now = Instant::now();
        let my_slot = std::cmp::max(*next_slot, now);
        *next_slot = my_slot + interval;
        my_slot
    };

    let now = Instant::now();
    if wait_until > now {
        trace!(wait_ms = (wait_until - now).as_millis(), "rate limiter: waiting for slot");
        tokio::time::sleep(wait_until - now).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn ratchets_to_stricter_interval_only() {
        set_min_interval_ms(10);
        set_min_interval_ms(50);
        assert_eq!(current_interval_ms(), 50);
        set_min_interval_ms(20);
        assert_eq!(current_interval_ms(), 50);
    }

    #[tokio::test]
    async fn set_min_rps_computes_ceiling_plus_margin() {
        set_min_interval_ms(0);
        set_min_rps(10);
        assert_eq!(current_interval_ms(), 100 + SAFETY_MARGIN_MS);
    }

    #[tokio::test]
    async fn admits_in_fifo_order() {
        set_min_interval_ms(5);
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..5 {
            let id = counter.fetch_add(1, Ordering::SeqCst);
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                acquire().await;
                order.lock().await.push(id);
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        let recorded = order.lock().await.clone();
        let mut sorted = recorded.clone();
        sorted.sort();
        assert_eq!(recorded, sorted, "admission order should match arrival order");
    }
}
