//! Request messages.

use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};

/// Read permissions requested for a set of fields.
///
/// The shape is checked against the field and member lists of the request:
/// - `Single` applies one value to every (field, member) pair
/// - `PerField` holds one value per field, applied to every member
/// - `Matrix` holds one row per field and one column per member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GrantShape {
    /// Same value for every pair.
    Single(bool),
    /// One value per field.
    PerField(Vec<bool>),
    /// One value per (field, member).
    Matrix(Vec<Vec<bool>>),
}

impl Default for GrantShape {
    fn default() -> Self {
        GrantShape::Single(true)
    }
}

/// The two notification channels a participant can listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Host to members: shared field changes.
    Updates,
    /// Members to host: submitted inputs.
    Inputs,
}

/// One operation, tagged by its `op` name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create an account and open its first session.
    Register {
        /// Opaque credential.
        credential: String,
        /// Idle timeout in minutes.
        timeout_minutes: u32,
    },
    /// Delete the calling account.
    Unregister,
    /// Open a new session, invalidating the previous one.
    Login {
        /// Opaque credential.
        credential: String,
    },
    /// Invalidate the current session.
    Logout,
    /// Keep the session alive.
    Ping,
    /// Create a group hosted by the caller.
    StartGroup {
        /// Group id.
        group: String,
        /// Application namespace.
        app: String,
    },
    /// Close a hosted group.
    CloseGroup {
        /// Group id.
        group: String,
    },
    /// Join a group as a member.
    JoinGroup {
        /// Group id.
        group: String,
    },
    /// Leave a group.
    LeaveGroup {
        /// Group id.
        group: String,
    },
    /// Add a member to a hosted group.
    AddMember {
        /// Group id.
        group: String,
        /// Identity to add.
        member: String,
    },
    /// Remove a member from a hosted group.
    RemoveMember {
        /// Group id.
        group: String,
        /// Identity to remove.
        member: String,
    },
    /// List the groups of an application.
    ListGroups {
        /// Application namespace.
        app: String,
    },
    /// List the members of a group.
    ListMembers {
        /// Group id.
        group: String,
    },
    /// Grant or revoke read access to fields.
    SetPermissions {
        /// Group id.
        group: String,
        /// Fields affected.
        fields: Vec<String>,
        /// Members affected; all current members when absent.
        #[serde(default)]
        members: Option<Vec<String>>,
        /// Permission values; grant everything when absent.
        #[serde(default)]
        grants: Option<GrantShape>,
    },
    /// Write shared fields and notify permitted members.
    SubmitUpdate {
        /// Group id.
        group: String,
        /// Field names.
        fields: Vec<String>,
        /// One payload per field.
        data: Vec<String>,
        /// Members for an accompanying permission change.
        #[serde(default)]
        members: Option<Vec<String>>,
        /// Accompanying permission change.
        #[serde(default)]
        grants: Option<GrantShape>,
    },
    /// Wait for field updates.
    ListenUpdates {
        /// Group id.
        group: String,
        /// Notice ids received by the previous delivery.
        #[serde(default)]
        ack: Vec<String>,
        /// Inline size limit for this and later deliveries.
        #[serde(default)]
        threshold: Option<usize>,
    },
    /// Read fields explicitly.
    FetchFields {
        /// Group id.
        group: String,
        /// Field names.
        fields: Vec<String>,
    },
    /// Set the inline size limit for update deliveries.
    SetThreshold {
        /// Group id.
        group: String,
        /// Payloads of this size or larger are not inlined.
        bytes: usize,
    },
    /// Send an input to the host.
    SubmitInput {
        /// Group id.
        group: String,
        /// Opaque payload.
        input: String,
    },
    /// Wait for member inputs (host only).
    ListenInput {
        /// Group id.
        group: String,
        /// Input ids received by the previous delivery.
        #[serde(default)]
        ack: Vec<String>,
    },
    /// Abandon an outstanding listen.
    StopListening {
        /// Group id.
        group: String,
        /// Channel to cancel; both when absent.
        #[serde(default)]
        channel: Option<Channel>,
    },
    /// Store account-private data.
    SetPrivate {
        /// Slot name.
        key: String,
        /// Opaque payload.
        data: String,
    },
    /// Read account-private data.
    GetPrivate {
        /// Slot name.
        key: String,
    },
    /// Delete account-private data.
    DeletePrivate {
        /// Slot name.
        key: String,
    },
}

impl Operation {
    /// Returns the wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Register { .. } => "register",
            Operation::Unregister => "unregister",
            Operation::Login { .. } => "login",
            Operation::Logout => "logout",
            Operation::Ping => "ping",
            Operation::StartGroup { .. } => "start_group",
            Operation::CloseGroup { .. } => "close_group",
            Operation::JoinGroup { .. } => "join_group",
            Operation::LeaveGroup { .. } => "leave_group",
            Operation::AddMember { .. } => "add_member",
            Operation::RemoveMember { .. } => "remove_member",
            Operation::ListGroups { .. } => "list_groups",
            Operation::ListMembers { .. } => "list_members",
            Operation::SetPermissions { .. } => "set_permissions",
            Operation::SubmitUpdate { .. } => "submit_update",
            Operation::ListenUpdates { .. } => "listen_updates",
            Operation::FetchFields { .. } => "fetch_fields",
            Operation::SetThreshold { .. } => "set_threshold",
            Operation::SubmitInput { .. } => "submit_input",
            Operation::ListenInput { .. } => "listen_input",
            Operation::StopListening { .. } => "stop_listening",
            Operation::SetPrivate { .. } => "set_private",
            Operation::GetPrivate { .. } => "get_private",
            Operation::DeletePrivate { .. } => "delete_private",
        }
    }

    /// Returns true if the operation may be held open until data arrives.
    pub fn is_long_poll(&self) -> bool {
        matches!(
            self,
            Operation::ListenUpdates { .. } | Operation::ListenInput { .. }
        )
    }
}

/// A request as sent by a client: caller credentials plus one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Client-chosen correlation id, echoed in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Caller identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Caller session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// The operation.
    #[serde(flatten)]
    pub op: Operation,
}

impl RequestEnvelope {
    /// Creates an envelope without credentials.
    pub fn new(op: Operation) -> Self {
        Self {
            id: None,
            identity: None,
            session: None,
            op,
        }
    }

    /// Sets the correlation id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the caller identity and session.
    pub fn with_session(mut self, identity: impl Into<String>, session: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self.session = Some(session.into());
        self
    }

    /// Sets only the caller identity (register and login).
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Encodes to a single JSON line (without the trailing newline).
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
