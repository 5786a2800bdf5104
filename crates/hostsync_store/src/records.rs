//! Typed rows exchanged with a [`crate::Store`].

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Unique identity (login name).
    pub identity: String,
    /// Opaque credential compared for equality on login.
    pub credential: String,
    /// Idle timeout in minutes.
    pub timeout_minutes: u32,
    /// Current session token. Empty when logged out.
    pub session: String,
    /// Last time the session was used.
    pub last_activity: Timestamp,
}

/// A group row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Unique group identifier.
    pub group_id: String,
    /// Application namespace the group belongs to.
    pub app: String,
    /// Identity of the host.
    pub host: String,
    /// Creation time.
    pub created: Timestamp,
}

/// Read permission on one field for one member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grant {
    /// Field name.
    pub field: String,
    /// Member allowed to read the field.
    pub member: String,
}

impl Grant {
    /// Creates a grant.
    pub fn new(field: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            member: member.into(),
        }
    }
}

/// Host-authored data stored under a field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedField {
    /// Field name.
    pub field: String,
    /// Opaque payload.
    pub data: String,
}

/// Durable "recipient should learn this field changed" entry.
///
/// At most one exists per (group, field, recipient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotice {
    /// Field that changed or became readable.
    pub field: String,
    /// Member to notify.
    pub recipient: String,
    /// Dedup id used for acknowledgment.
    pub id: String,
    /// Time the notice was (re)written.
    pub time: Timestamp,
}

/// Durable member input addressed to the group's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputNotice {
    /// Group the input was submitted to.
    pub group_id: String,
    /// Member that submitted the input.
    pub sender: String,
    /// Dedup id used for acknowledgment.
    pub id: String,
    /// Opaque payload.
    pub payload: String,
    /// Server time of submission.
    pub time: Timestamp,
}

/// A set of writes to one group committed as a unit.
///
/// Application order: field upserts, grant deletions, grant insertions,
/// notice upserts.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Group the changes apply to.
    pub group_id: String,
    /// Field values to insert or replace.
    pub fields: Vec<SharedField>,
    /// Grants to insert (existing ones are kept).
    pub grant: Vec<Grant>,
    /// Grants to delete.
    pub revoke: Vec<Grant>,
    /// Update notices to insert, refreshing id and time on conflict.
    pub notices: Vec<UpdateNotice>,
}

impl ChangeSet {
    /// Creates an empty change set for a group.
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Self::default()
        }
    }

    /// Returns true if the change set writes nothing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.grant.is_empty()
            && self.revoke.is_empty()
            && self.notices.is_empty()
    }
}
