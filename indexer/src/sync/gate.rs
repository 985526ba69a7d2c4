//! Ordering gate for the parallel pipeline
//!
//! Workers fetch blocks out of order; the gate lets exactly one of them,
//! the one holding height `next`, hand its block to the committer.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy)]
struct GateState {
    next: u64,
    closed: bool,
}

/// The gate was closed before the caller's turn came
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateClosed;

/// Single-writer-at-a-time sequencing token over block heights
#[derive(Debug)]
pub struct OrderingGate {
    state: watch::Sender<GateState>,
}

impl OrderingGate {
    /// Create a gate whose first turn belongs to `first`
    pub fn new(first: u32) -> Self {
        let (state, _) = watch::channel(GateState {
            next: first as u64,
            closed: false,
        });
        Self { state }
    }

    /// Wait until `height` is the next height to hand off.
    ///
    /// A turn that has come is granted even on a closed gate; otherwise a
    /// closed gate releases the waiter with [`GateClosed`].
    pub async fn await_turn(&self, height: u32) -> Result<(), GateClosed> {
        let mut rx = self.state.subscribe();
        let state = *rx
            .wait_for(|s| s.next == height as u64 || s.closed)
            .await
            .map_err(|_| GateClosed)?;

        if state.next == height as u64 {
            Ok(())
        } else {
            Err(GateClosed)
        }
    }

    /// Pass the turn from `height` to `height + 1` and wake all waiters
    pub fn advance(&self, height: u32) {
        self.state.send_modify(|s| s.next = height as u64 + 1);
    }

    /// Release every waiter whose turn has not come
    pub fn close(&self) {
        self.state.send_modify(|s| s.closed = true);
    }

    /// Height whose turn it is
    pub fn next(&self) -> u64 {
        self.state.borrow().next
    }
}
