//! The storage collaborator interface.

use crate::error::StoreResult;
use crate::records::{
    Account, ChangeSet, GroupRecord, Grant, InputNotice, SharedField, Timestamp, UpdateNotice,
};

/// Relational store used by the group synchronization engine.
///
/// Every method is a single parameterized statement or a short transaction
/// against the store. Implementations must enforce:
///
/// - one account per identity, one group per id, one membership per pair
///   (violations are reported as [`crate::StoreError::Conflict`])
/// - memberships, grants, fields and notices cannot outlive their group
/// - grants and update notices cannot outlive the recipient's membership
/// - deleting an account removes its memberships, hosted groups and private data
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - For tests and ephemeral servers
/// - [`crate::SqliteStore`] - For persistent servers
pub trait Store: Send + Sync {
    /// Inserts a new account.
    fn insert_account(&self, account: &Account) -> StoreResult<()>;

    /// Looks up an account by identity.
    fn account(&self, identity: &str) -> StoreResult<Option<Account>>;

    /// Replaces the session token and activity time of an account.
    fn set_session(&self, identity: &str, session: &str, last_activity: Timestamp)
        -> StoreResult<()>;

    /// Updates the activity time of an account.
    fn touch_account(&self, identity: &str, last_activity: Timestamp) -> StoreResult<()>;

    /// Deletes an account and everything it owns.
    ///
    /// Returns `false` if no such account existed.
    fn delete_account(&self, identity: &str) -> StoreResult<bool>;

    /// Inserts a group together with the host's membership.
    fn insert_group(&self, group: &GroupRecord) -> StoreResult<()>;

    /// Looks up a group.
    fn group(&self, group_id: &str) -> StoreResult<Option<GroupRecord>>;

    /// Lists the groups of an application namespace, ordered by id.
    fn groups_in_app(&self, app: &str) -> StoreResult<Vec<GroupRecord>>;

    /// Lists the groups hosted by an identity.
    fn groups_hosted_by(&self, host: &str) -> StoreResult<Vec<GroupRecord>>;

    /// Lists the ids of the groups an identity is a member of (hosted ones included).
    fn groups_joined_by(&self, member: &str) -> StoreResult<Vec<String>>;

    /// Deletes a group and everything that belongs to it.
    ///
    /// Returns `false` if no such group existed.
    fn delete_group(&self, group_id: &str) -> StoreResult<bool>;

    /// Adds a member to a group.
    fn insert_membership(&self, group_id: &str, member: &str) -> StoreResult<()>;

    /// Returns true if the identity is a member of the group.
    fn is_member(&self, group_id: &str, member: &str) -> StoreResult<bool>;

    /// Lists the members of a group, ordered by identity.
    fn members(&self, group_id: &str) -> StoreResult<Vec<String>>;

    /// Removes a membership together with the member's grants and update notices.
    ///
    /// Returns `false` if no such membership existed.
    fn delete_membership(&self, group_id: &str, member: &str) -> StoreResult<bool>;

    /// Applies a [`ChangeSet`] atomically.
    fn commit(&self, changes: &ChangeSet) -> StoreResult<()>;

    /// Lists the grants on any of the given fields.
    fn grants_for_fields(&self, group_id: &str, fields: &[String]) -> StoreResult<Vec<Grant>>;

    /// Lists the grants held by one member.
    fn grants_for_member(&self, group_id: &str, member: &str) -> StoreResult<Vec<Grant>>;

    /// Reads the given fields. Fields that were never written are skipped.
    fn fields(&self, group_id: &str, names: &[String]) -> StoreResult<Vec<SharedField>>;

    /// Lists the pending update notices of a recipient, ordered by time.
    fn update_notices(&self, group_id: &str, recipient: &str) -> StoreResult<Vec<UpdateNotice>>;

    /// Deletes the recipient's update notices with the given ids.
    ///
    /// Returns the number of notices removed.
    fn delete_update_notices(
        &self,
        group_id: &str,
        recipient: &str,
        ids: &[String],
    ) -> StoreResult<usize>;

    /// Queues an input for the group's host.
    fn insert_input_notice(&self, notice: &InputNotice) -> StoreResult<()>;

    /// Lists the pending inputs of a group, oldest first.
    fn input_notices(&self, group_id: &str) -> StoreResult<Vec<InputNotice>>;

    /// Deletes the group's input notices with the given ids.
    ///
    /// Returns the number of notices removed.
    fn delete_input_notices(&self, group_id: &str, ids: &[String]) -> StoreResult<usize>;

    /// Stores account-private data under a key.
    fn put_private(&self, identity: &str, key: &str, data: &str) -> StoreResult<()>;

    /// Reads account-private data.
    fn private(&self, identity: &str, key: &str) -> StoreResult<Option<String>>;

    /// Deletes account-private data. Returns `false` if the key was not set.
    fn delete_private(&self, identity: &str, key: &str) -> StoreResult<bool>;
}
