//! Connection state tracking.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use historias_db_core::FacadeError;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

/// Where the manager currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// No live connection; a retry may be scheduled.
    Disconnected,

    /// A connection attempt is in flight.
    Connecting,

    /// Connected to the live database.
    Connected,

    /// Retry budget exhausted (or mock forced). Absorbing.
    Mock,
}

impl ConnectionPhase {
    fn encode(self) -> u8 {
        match self {
            ConnectionPhase::Disconnected => 0,
            ConnectionPhase::Connecting => 1,
            ConnectionPhase::Connected => 2,
            ConnectionPhase::Mock => 3,
        }
    }

    fn decode(encoded: u8) -> Self {
        match encoded {
            0 => ConnectionPhase::Disconnected,
            1 => ConnectionPhase::Connecting,
            2 => ConnectionPhase::Connected,
            _ => ConnectionPhase::Mock,
        }
    }
}

/// Owned snapshot of a manager's connection state.
///
/// Serializes as
/// `{"isConnected", "failedAttempts", "lastError", "inMockMode", "isRetrying", "phase"}`
/// with `lastError` rendered as its display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// `true` while the live pool is usable.
    pub is_connected: bool,
    /// Failed attempts since the last success.
    pub failed_attempts: u32,
    /// Most recent connection failure.
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<FacadeError>,
    /// `true` once queries are permanently served by the mock store.
    pub in_mock_mode: bool,
    /// `true` while a retry task is running.
    pub is_retrying: bool,
    /// Lifecycle phase.
    pub phase: ConnectionPhase,
}

fn serialize_error<S>(error: &Option<FacadeError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// The single mutable state record behind a manager.
pub(crate) struct StateTracker {
    phase: AtomicU8,
    failed_attempts: AtomicU32,
    retrying: AtomicBool,
    last_error: Mutex<Option<FacadeError>>,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(ConnectionPhase::Disconnected.encode()),
            failed_attempts: AtomicU32::new(0),
            retrying: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::decode(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    pub(crate) fn is_mock(&self) -> bool {
        self.phase() == ConnectionPhase::Mock
    }

    pub(crate) fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::Acquire)
    }

    pub(crate) fn is_retrying(&self) -> bool {
        self.retrying.load(Ordering::Acquire)
    }

    /// Moves to `to` unless already in mock mode. Returns `false` when the
    /// transition was refused.
    pub(crate) fn transition(&self, to: ConnectionPhase) -> bool {
        let mock = ConnectionPhase::Mock.encode();
        self.phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != mock).then_some(to.encode())
            })
            .is_ok()
    }

    /// Records a successful connection.
    pub(crate) fn mark_connected(&self) -> bool {
        if !self.transition(ConnectionPhase::Connected) {
            return false;
        }
        self.failed_attempts.store(0, Ordering::Release);
        *self.last_error.lock() = None;
        true
    }

    /// Records a failed attempt and returns the new failure count.
    pub(crate) fn record_failure(&self, error: FacadeError) -> u32 {
        *self.last_error.lock() = Some(error);
        self.failed_attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Records an error on an established connection. Does not count as a
    /// failed attempt.
    pub(crate) fn mark_lost(&self, error: FacadeError) -> bool {
        if !self.transition(ConnectionPhase::Disconnected) {
            return false;
        }
        *self.last_error.lock() = Some(error);
        true
    }

    /// Enters mock mode. Returns `false` if it was already active.
    pub(crate) fn enter_mock(&self, reason: Option<FacadeError>) -> bool {
        let previous = self
            .phase
            .swap(ConnectionPhase::Mock.encode(), Ordering::AcqRel);
        if let Some(reason) = reason {
            *self.last_error.lock() = Some(reason);
        }
        previous != ConnectionPhase::Mock.encode()
    }

    /// Claims the retry slot. Only one caller wins until [`end_retry`](Self::end_retry).
    pub(crate) fn try_begin_retry(&self) -> bool {
        self.retrying
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_retry(&self) {
        self.retrying.store(false, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> ConnectionState {
        let phase = self.phase();
        ConnectionState {
            is_connected: phase == ConnectionPhase::Connected,
            failed_attempts: self.failed_attempts(),
            last_error: self.last_error.lock().clone(),
            in_mock_mode: phase == ConnectionPhase::Mock,
            is_retrying: self.is_retrying(),
            phase,
        }
    }
}

impl std::fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTracker")
            .field("phase", &self.phase())
            .field("failed_attempts", &self.failed_attempts())
            .field("retrying", &self.is_retrying())
            .finish()
    }
}
