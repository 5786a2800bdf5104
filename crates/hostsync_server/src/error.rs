//! Error types for the group synchronization engine.

use hostsync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type GroupResult<T> = Result<T, GroupError>;

/// Errors returned by engine operations.
///
/// Every variant has a stable tag (see [`GroupError::tag`]) that is sent to
/// clients alongside the human-readable message.
#[derive(Error, Debug)]
pub enum GroupError {
    /// Malformed or missing input, detected before any storage access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage collaborator failed.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// No account, or the token does not match the current session.
    #[error("invalid session for {0}")]
    InvalidSession(String),

    /// The session was idle longer than the account's timeout.
    #[error("session for {0} has expired")]
    ExpiredSession(String),

    /// The group does not exist.
    #[error("no such group: {0}")]
    NoSuchGroup(String),

    /// The caller is not the host of the group.
    #[error("{identity} is not the host of {group}")]
    NotHost {
        /// Caller identity.
        identity: String,
        /// Group id.
        group: String,
    },

    /// The identity is not a member of the group.
    #[error("{identity} is not a member of {group}")]
    NotMember {
        /// Identity that was checked.
        identity: String,
        /// Group id.
        group: String,
    },

    /// A unique constraint was violated (account, group or membership).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Login with an unknown identity or a mismatching credential.
    #[error("wrong credential for {0}")]
    WrongCredential(String),
}

impl GroupError {
    /// Returns the stable machine-readable tag of this error.
    pub fn tag(&self) -> &'static str {
        match self {
            GroupError::InvalidArgument(_) => "invalid_argument",
            GroupError::Store(_) => "store_error",
            GroupError::InvalidSession(_) => "invalid_session",
            GroupError::ExpiredSession(_) => "expired_session",
            GroupError::NoSuchGroup(_) => "no_such_group",
            GroupError::NotHost { .. } => "not_host",
            GroupError::NotMember { .. } => "not_member",
            GroupError::Duplicate(_) => "duplicate",
            GroupError::WrongCredential(_) => "wrong_credential",
        }
    }

    /// Returns true if the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns true if the server failed to complete a valid request.
    pub fn is_server_error(&self) -> bool {
        matches!(self, GroupError::Store(_))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        GroupError::InvalidArgument(message.into())
    }
}

impl From<StoreError> for GroupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => GroupError::Duplicate(message),
            other => GroupError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(GroupError::invalid("bad").is_client_error());
        assert!(GroupError::Store(StoreError::Backend("down".into())).is_server_error());
        assert!(!GroupError::NoSuchGroup("g1".into()).is_server_error());
    }

    #[test]
    fn store_conflict_becomes_duplicate() {
        let err: GroupError = StoreError::Conflict("group g1 already exists".into()).into();
        assert_eq!(err.tag(), "duplicate");

        let err: GroupError = StoreError::Backend("disk".into()).into();
        assert_eq!(err.tag(), "store_error");
    }

    #[test]
    fn error_display() {
        let err = GroupError::NotHost {
            identity: "bob".into(),
            group: "g1".into(),
        };
        assert_eq!(err.to_string(), "bob is not the host of g1");
    }
}
