//! Per-token operation status with timed reset
//!
//! Each (token, operation) pair moves `Idle -> Loading -> Success|Error`, and
//! back to `Idle` once the reset delay elapses. Reset timers are tokio tasks
//! whose handles are kept here so they can be cancelled: starting a new
//! operation on the same key cancels the pending reset, and [`StatusBoard::cancel_all`]
//! cancels everything when the owner goes away.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::TokenId;

/// Capacity of the status event channel. Slow subscribers lag, not block.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Asynchronous operation tracked per token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Refresh,
    Revoke,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Refresh => "refresh",
            Operation::Revoke => "revoke",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl OpStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OpStatus::Success | OpStatus::Error)
    }
}

/// User-facing message for a finished operation.
pub fn outcome_message(op: Operation, status: OpStatus) -> Option<&'static str> {
    match (op, status) {
        (Operation::Refresh, OpStatus::Success) => Some("Token refreshed successfully!"),
        (Operation::Refresh, OpStatus::Error) => {
            Some("Failed to refresh token. It may be expired or invalid.")
        }
        (Operation::Revoke, OpStatus::Success) => Some("Token revoked successfully!"),
        (Operation::Revoke, OpStatus::Error) => {
            Some("Failed to revoke token. It may already be invalid.")
        }
        (_, OpStatus::Idle | OpStatus::Loading) => None,
    }
}

/// A status transition, broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub id: TokenId,
    pub op: Operation,
    pub status: OpStatus,
}

type Key = (TokenId, Operation);

struct PendingReset {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct BoardState {
    statuses: HashMap<Key, OpStatus>,
    resets: HashMap<Key, PendingReset>,
    next_generation: u64,
}

struct Shared {
    state: Mutex<BoardState>,
    events: broadcast::Sender<StatusEvent>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, id: TokenId, op: Operation, status: OpStatus) {
        // No subscribers is fine
        let _ = self.events.send(StatusEvent { id, op, status });
    }
}

/// Status table for all in-flight and recently finished operations.
pub struct StatusBoard {
    shared: Arc<Shared>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BoardState::default()),
                events,
            }),
        }
    }

    /// Current status; `Idle` when nothing is recorded.
    pub fn get(&self, id: TokenId, op: Operation) -> OpStatus {
        self.shared
            .lock()
            .statuses
            .get(&(id, op))
            .copied()
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.shared.events.subscribe()
    }

    /// Mark an operation as started, cancelling any pending reset for it.
    pub fn begin(&self, id: TokenId, op: Operation) {
        {
            let mut state = self.shared.lock();
            if let Some(pending) = state.resets.remove(&(id, op)) {
                pending.handle.abort();
            }
            state.statuses.insert((id, op), OpStatus::Loading);
        }
        self.shared.emit(id, op, OpStatus::Loading);
    }

    /// Record the outcome of an operation and schedule its reset to `Idle`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn finish(&self, id: TokenId, op: Operation, status: OpStatus, reset_after: Duration) {
        debug_assert!(status.is_terminal());
        let key = (id, op);
        {
            let mut state = self.shared.lock();
            state.statuses.insert(key, status);

            let generation = state.next_generation;
            state.next_generation += 1;

            let shared = Arc::clone(&self.shared);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(reset_after).await;
                let reset = {
                    let mut state = shared.lock();
                    let current = state
                        .resets
                        .get(&key)
                        .is_some_and(|p| p.generation == generation);
                    if current {
                        state.resets.remove(&key);
                        state.statuses.remove(&key);
                    }
                    current
                };
                if reset {
                    shared.emit(id, op, OpStatus::Idle);
                }
            });

            if let Some(old) = state.resets.insert(key, PendingReset { generation, handle }) {
                old.handle.abort();
            }
        }
        self.shared.emit(id, op, status);
    }

    /// Number of reset timers still pending.
    #[cfg(test)]
    pub fn pending_resets(&self) -> usize {
        self.shared.lock().resets.len()
    }

    /// Cancel every pending reset timer.
    pub fn cancel_all(&self) {
        let mut state = self.shared.lock();
        for (_, pending) in state.resets.drain() {
            pending.handle.abort();
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StatusBoard {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESET: Duration = Duration::from_secs(3);

    #[tokio::test(start_paused = true)]
    async fn test_finish_resets_after_delay() {
        let board = StatusBoard::new();
        board.begin(1, Operation::Refresh);
        assert_eq!(board.get(1, Operation::Refresh), OpStatus::Loading);

        board.finish(1, Operation::Refresh, OpStatus::Success, RESET);
        assert_eq!(board.get(1, Operation::Refresh), OpStatus::Success);

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(board.get(1, Operation::Refresh), OpStatus::Success);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(board.get(1, Operation::Refresh), OpStatus::Idle);
        assert_eq!(board.pending_resets(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_are_independent() {
        let board = StatusBoard::new();
        board.begin(1, Operation::Refresh);
        board.begin(1, Operation::Revoke);
        board.finish(1, Operation::Revoke, OpStatus::Error, RESET);

        assert_eq!(board.get(1, Operation::Refresh), OpStatus::Loading);
        assert_eq!(board.get(1, Operation::Revoke), OpStatus::Error);
        assert_eq!(board.get(2, Operation::Refresh), OpStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_operation_cancels_stale_reset() {
        let board = StatusBoard::new();
        board.begin(1, Operation::Refresh);
        board.finish(1, Operation::Refresh, OpStatus::Error, RESET);

        tokio::time::sleep(Duration::from_secs(2)).await;
        board.begin(1, Operation::Refresh);
        assert_eq!(board.pending_resets(), 0);

        // The first reset would have fired here
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(board.get(1, Operation::Refresh), OpStatus::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_keeps_terminal_status() {
        let board = StatusBoard::new();
        board.begin(1, Operation::Revoke);
        board.finish(1, Operation::Revoke, OpStatus::Success, RESET);
        board.cancel_all();
        assert_eq!(board.pending_resets(), 0);

        tokio::time::sleep(RESET * 2).await;
        assert_eq!(board.get(1, Operation::Revoke), OpStatus::Success);
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            outcome_message(Operation::Revoke, OpStatus::Error),
            Some("Failed to revoke token. It may already be invalid.")
        );
        assert!(outcome_message(Operation::Refresh, OpStatus::Loading).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_transitions() {
        let board = StatusBoard::new();
        let mut events = board.subscribe();

        board.begin(7, Operation::Refresh);
        board.finish(7, Operation::Refresh, OpStatus::Success, RESET);
        tokio::time::sleep(RESET + Duration::from_millis(1)).await;

        let statuses: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| (e.id, e.op, e.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (7, Operation::Refresh, OpStatus::Loading),
                (7, Operation::Refresh, OpStatus::Success),
                (7, Operation::Refresh, OpStatus::Idle),
            ]
        );
    }
}
