use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;

/// The displayed number of waitlist subscribers.
///
/// `value` is either the last count confirmed by the backend, or that count
/// plus local optimistic increments (`pending_reconciliation`). The next
/// confirmed count always replaces it wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitlistCount {
    pub value: u64,
    /// When the backend last confirmed `value`; `None` until it has
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub pending_reconciliation: bool,
}

impl WaitlistCount {
    /// Shown before the backend has answered
    pub fn placeholder(value: u64) -> Self {
        Self {
            value,
            last_fetched_at: None,
            pending_reconciliation: false,
        }
    }

    /// A count reported by the backend. Server wins: nothing about the
    /// previous value survives.
    pub fn confirmed(value: u64) -> Self {
        Self {
            value,
            last_fetched_at: Some(Utc::now()),
            pending_reconciliation: false,
        }
    }

    /// Best-effort +1 after a signup whose response carried no total. Only
    /// ever goes up.
    pub fn optimistic_increment(self) -> Self {
        Self {
            value: self.value.saturating_add(1),
            pending_reconciliation: true,
            ..self
        }
    }
}

/// Body of `GET /api/waitlist/count`
#[derive(Deserialize, Debug)]
pub(crate) struct CountBody {
    pub count: u64,
}

/// Body of `GET /api/health`
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub subscribers: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum CountError {
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
    #[error("backend answered with status {0}")]
    Status(u16),
    #[error("could not decode backend response")]
    Decode(#[from] serde_json::Error),
    #[error("client has been stopped")]
    Stopped,
}
