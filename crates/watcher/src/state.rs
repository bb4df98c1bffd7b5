use std::fmt;

use sessionlock_core::session::InvalidReason;

/// Why the registry rejected this client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KickReason {
    /// Another login for the same user replaced this one.
    Displaced,
    /// The session's TTL elapsed.
    Expired,
    /// No session record exists, or the registry gave a reason this client
    /// does not recognise.
    Ended,
}

impl KickReason {
    /// Map the wire `reason` of a `{valid:false}` response.
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason.and_then(InvalidReason::from_wire) {
            Some(InvalidReason::SessionDisplaced) => Self::Displaced,
            Some(InvalidReason::SessionExpired) => Self::Expired,
            Some(InvalidReason::SessionEnded) | None => Self::Ended,
        }
    }

    /// Message suitable for showing to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::Displaced => {
                "You were signed out because your account was used to sign in on another device."
            }
            Self::Expired => "Your session has expired. Please log in again.",
            Self::Ended => "Your session has ended. Please log in again.",
        }
    }
}

impl fmt::Display for KickReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Displaced => "displaced",
            Self::Expired => "expired",
            Self::Ended => "ended",
        })
    }
}

/// Where the watcher is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Unauthenticated,
    /// Restored credentials are being checked against the registry.
    Validating,
    Active,
    /// The registry rejected the session while polling. Terminal until the
    /// user logs in again.
    Kicked(KickReason),
}

/// Notifications broadcast to observers of a session context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session became active (restore or login).
    Activated { locked: bool },
    /// A poll failed for a transport reason.
    Degraded { consecutive_failures: u32 },
    /// Consecutive failures reached the offline threshold. Sent once per
    /// outage.
    Offline,
    /// A poll succeeded after one or more failures.
    Recovered { after_failures: u32 },
    Kicked(KickReason),
    LoggedOut,
}

/// Result of [`SessionContext::restore`](crate::context::SessionContext::restore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Credentials validated; the session is active and polling.
    Restored,
    /// Nothing (or only a partial set) was stored. A fresh login is needed.
    NoCredentials,
    /// The registry answered `{valid:false}`.
    Rejected(KickReason),
    /// The registry could not be reached. Credentials were purged.
    Unreachable,
}

/// Result of a successful [`SessionContext::login`](crate::context::SessionContext::login).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOutcome {
    /// `false` when registration failed and the session runs without
    /// cross-device locking.
    pub locked: bool,
}
