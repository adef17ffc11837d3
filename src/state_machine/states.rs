use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a command transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Prepare hooks build the request or intercept
    #[default]
    Prepare,
    /// Request submitted; waiting on the transport
    Sent,
    /// Response or intercepted result visible to process hooks
    Process,
    /// Error visible to error hooks
    Error,
    /// Terminal hooks observe the outcome
    End,
    /// Result returned or error raised
    Exit,
}

impl TransactionState {
    /// Check if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exit)
    }

    /// Check if the transaction is waiting on the transport
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Check if this state runs a hook phase
    pub fn runs_hooks(&self) -> bool {
        matches!(self, Self::Prepare | Self::Process | Self::Error | Self::End)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => write!(f, "prepare"),
            Self::Sent => write!(f, "sent"),
            Self::Process => write!(f, "process"),
            Self::Error => write!(f, "error"),
            Self::End => write!(f, "end"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

impl std::str::FromStr for TransactionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepare" => Ok(Self::Prepare),
            "sent" => Ok(Self::Sent),
            "process" => Ok(Self::Process),
            "error" => Ok(Self::Error),
            "end" => Ok(Self::End),
            "exit" => Ok(Self::Exit),
            _ => Err(format!("Invalid transaction state: {s}")),
        }
    }
}
