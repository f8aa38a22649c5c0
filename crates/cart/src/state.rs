//! Cart session state and the sync state machine.
//!
//! Every server-backed operation moves the session through an explicit
//! [`SyncPhase`] instead of nesting fallbacks:
//!
//! ```text
//!            RequestStarted            RequestSucceeded (none left)
//!   Idle ───────────────────▶ Syncing ─────────────────────────────▶ Idle
//!    ▲                          │  ▲
//!    │ RequestSucceeded         │  │ RequestStarted
//!    │                          ▼  │
//!    └──────────────────────── Degraded
//!                RequestFailed (none left)
//! ```
//!
//! `Reset` returns to `Idle` from any phase. A degrade also flips the cart to
//! [`CartMode::Guest`]; that is applied by the store alongside the
//! transition.

use pantry_core::CartItem;
use serde::{Deserialize, Serialize};

/// Whether mutations try the backend first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartMode {
    /// Local-only mutations.
    #[default]
    Guest,
    /// Backend first, local state as a fallback mirror.
    Authenticated,
}

impl CartMode {
    #[must_use]
    pub const fn is_guest(self) -> bool {
        matches!(self, Self::Guest)
    }

    #[must_use]
    pub const fn from_is_guest(is_guest: bool) -> Self {
        if is_guest {
            Self::Guest
        } else {
            Self::Authenticated
        }
    }
}

/// Backend sync phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No request in flight; the last one (if any) succeeded.
    #[default]
    Idle,
    /// At least one backend request is in flight.
    Syncing,
    /// No request in flight; the last one failed and was completed locally.
    Degraded,
}

/// Inputs to the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    RequestStarted,
    RequestSucceeded,
    RequestFailed,
    Reset,
}

/// Pure transition function.
///
/// `in_flight_after` is the number of requests still outstanding once the
/// event has been accounted for.
///
/// The target phase does not depend on the current one: outstanding requests
/// keep the session in `Syncing`, and the last one to finish decides between
/// `Idle` and `Degraded`.
#[must_use]
pub const fn next_phase(event: SyncEvent, in_flight_after: usize) -> SyncPhase {
    match event {
        SyncEvent::RequestStarted => SyncPhase::Syncing,
        SyncEvent::Reset => SyncPhase::Idle,
        _ if in_flight_after > 0 => SyncPhase::Syncing,
        SyncEvent::RequestSucceeded => SyncPhase::Idle,
        SyncEvent::RequestFailed => SyncPhase::Degraded,
    }
}

/// Observable cart state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartSession {
    pub items: Vec<CartItem>,
    pub mode: CartMode,
    /// True while any backend request is in flight.
    pub loading: bool,
    /// Failure reason of the last operation; cleared on the next success.
    pub error: Option<String>,
    pub phase: SyncPhase,
}

/// Monotonic request ticket.
///
/// `epoch` changes whenever the cart is wiped; tickets from an older epoch
/// belong to a cart that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket {
    epoch: u64,
    seq: u64,
}

impl Ticket {
    #[must_use]
    pub const fn seq(self) -> u64 {
        self.seq
    }
}

/// Tracks in-flight requests and the sequence number of the last write to
/// the items, whether an adopted server snapshot or a local mutation.
#[derive(Debug, Default)]
pub struct SyncTracker {
    in_flight: usize,
    epoch: u64,
    issued: u64,
    last_write: u64,
}

impl SyncTracker {
    /// Register a new request, moving the session to `Syncing`.
    pub fn begin(&mut self, session: &mut CartSession) -> Ticket {
        self.in_flight += 1;
        self.issued += 1;
        self.apply(session, SyncEvent::RequestStarted);
        Ticket {
            epoch: self.epoch,
            seq: self.issued,
        }
    }

    /// Mark a request finished with the given outcome.
    pub fn finish(&mut self, session: &mut CartSession, succeeded: bool) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let event = if succeeded {
            SyncEvent::RequestSucceeded
        } else {
            SyncEvent::RequestFailed
        };
        self.apply(session, event);
    }

    /// Whether `ticket` was issued for the current cart (no wipe since).
    #[must_use]
    pub const fn is_current(&self, ticket: Ticket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Whether a server snapshot fetched under `ticket` may replace the items.
    ///
    /// A snapshot is stale once the items were written after `ticket` was
    /// issued (a later snapshot or a local mutation), or once the cart has
    /// been wiped.
    #[must_use]
    pub const fn can_adopt(&self, ticket: Ticket) -> bool {
        self.is_current(ticket) && ticket.seq > self.last_write
    }

    /// Record that the snapshot for `ticket` replaced the items.
    pub const fn mark_adopted(&mut self, ticket: Ticket) {
        if ticket.seq > self.last_write {
            self.last_write = ticket.seq;
        }
    }

    /// Record a local mutation of the items.
    ///
    /// Snapshots from every request issued so far become stale.
    pub const fn mark_local_write(&mut self) {
        self.last_write = self.issued;
    }

    /// Start a new epoch and return to `Idle`.
    ///
    /// Requests still in flight keep counting towards `loading`, but neither
    /// their snapshots nor their local fallbacks will be applied.
    pub fn reset(&mut self, session: &mut CartSession) {
        self.epoch += 1;
        self.last_write = self.issued;
        session.phase = next_phase(SyncEvent::Reset, self.in_flight);
        session.loading = self.in_flight > 0;
    }

    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn apply(&self, session: &mut CartSession, event: SyncEvent) {
        session.phase = next_phase(event, self.in_flight);
        session.loading = self.in_flight > 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use SyncEvent::{RequestFailed, RequestStarted, RequestSucceeded, Reset};
        use SyncPhase::{Degraded, Idle, Syncing};

        assert_eq!(next_phase(RequestStarted, 1), Syncing);
        assert_eq!(next_phase(RequestSucceeded, 0), Idle);
        assert_eq!(next_phase(RequestFailed, 0), Degraded);
        assert_eq!(next_phase(RequestFailed, 1), Syncing);
        assert_eq!(next_phase(RequestSucceeded, 2), Syncing);
        assert_eq!(next_phase(Reset, 0), Idle);
        assert_eq!(next_phase(Reset, 3), Idle);
    }

    #[test]
    fn test_loading_cleared_on_every_exit() {
        let mut tracker = SyncTracker::default();
        let mut session = CartSession::default();

        let _ = tracker.begin(&mut session);
        assert!(session.loading);
        assert_eq!(session.phase, SyncPhase::Syncing);
        tracker.finish(&mut session, false);
        assert!(!session.loading);
        assert_eq!(session.phase, SyncPhase::Degraded);

        let _ = tracker.begin(&mut session);
        tracker.finish(&mut session, true);
        assert!(!session.loading);
        assert_eq!(session.phase, SyncPhase::Idle);
    }

    #[test]
    fn test_loading_stays_true_while_any_request_outstanding() {
        let mut tracker = SyncTracker::default();
        let mut session = CartSession::default();

        let _ = tracker.begin(&mut session);
        let _ = tracker.begin(&mut session);
        tracker.finish(&mut session, true);
        assert!(session.loading);
        assert_eq!(tracker.in_flight(), 1);
        tracker.finish(&mut session, true);
        assert!(!session.loading);
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let mut tracker = SyncTracker::default();
        let mut session = CartSession::default();

        let first = tracker.begin(&mut session);
        let second = tracker.begin(&mut session);

        assert!(tracker.can_adopt(second));
        tracker.mark_adopted(second);
        assert!(!tracker.can_adopt(first));
        assert!(tracker.is_current(first));
        assert!(first.seq() < second.seq());
    }

    #[test]
    fn test_reset_invalidates_outstanding_tickets() {
        let mut tracker = SyncTracker::default();
        let mut session = CartSession::default();

        let pending = tracker.begin(&mut session);
        tracker.reset(&mut session);
        assert!(!tracker.can_adopt(pending));
        assert!(!tracker.is_current(pending));
        assert_eq!(session.phase, SyncPhase::Idle);
        assert!(session.loading);

        tracker.finish(&mut session, true);
        assert!(!session.loading);

        let fresh = tracker.begin(&mut session);
        assert!(tracker.can_adopt(fresh));
    }

    #[test]
    fn test_local_write_makes_outstanding_snapshots_stale() {
        let mut tracker = SyncTracker::default();
        let mut session = CartSession::default();

        let pending = tracker.begin(&mut session);
        tracker.mark_local_write();
        assert!(!tracker.can_adopt(pending));
        assert!(tracker.is_current(pending));

        let later = tracker.begin(&mut session);
        assert!(tracker.can_adopt(later));
    }

    #[test]
    fn test_mode_helpers() {
        assert!(CartMode::default().is_guest());
        assert_eq!(CartMode::from_is_guest(false), CartMode::Authenticated);
        assert_eq!(CartMode::from_is_guest(true), CartMode::Guest);
    }
}
