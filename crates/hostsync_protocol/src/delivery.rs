//! Payloads that complete a held listen request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Changed fields delivered to a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDelivery {
    /// Every field with a pending notice, including ones not inlined.
    pub fields: Vec<String>,
    /// Inlined field data (only payloads under the recipient's threshold).
    pub data: BTreeMap<String, String>,
    /// Notice ids to acknowledge on the next listen.
    pub ack: Vec<String>,
}

impl UpdateDelivery {
    /// Returns the fields that were announced but must be fetched explicitly.
    pub fn omitted(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| !self.data.contains_key(f.as_str()))
            .map(String::as_str)
    }
}

/// One member input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputItem {
    /// Sender identity.
    pub user: String,
    /// Opaque payload.
    pub input: String,
    /// Server time of submission.
    pub time: u64,
}

/// Queued inputs delivered to the host, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDelivery {
    /// Inputs ordered by submission time.
    pub inputs: Vec<InputItem>,
    /// Input ids to acknowledge on the next listen.
    pub ack: Vec<String>,
}

/// Why a held request was completed without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interrupt {
    /// The group was closed.
    Closed,
    /// The listener was removed from the group.
    Removed,
    /// The listener cancelled the wait.
    Cancelled,
    /// A newer listen from the same participant took over.
    Replaced,
}

/// Result of a listen request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    /// Field updates (members).
    Updates(UpdateDelivery),
    /// Member inputs (host).
    Inputs(InputDelivery),
    /// Completed without data.
    Interrupted {
        /// Reason for the interruption.
        reason: Interrupt,
    },
}

impl Delivery {
    /// Creates an interrupted delivery.
    pub fn interrupted(reason: Interrupt) -> Self {
        Delivery::Interrupted { reason }
    }

    /// Returns the interruption reason, if any.
    pub fn interrupt(&self) -> Option<Interrupt> {
        match self {
            Delivery::Interrupted { reason } => Some(*reason),
            _ => None,
        }
    }
}
