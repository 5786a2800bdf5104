//! In-memory store for tests and ephemeral servers.

use crate::error::{StoreError, StoreResult};
use crate::records::{
    Account, ChangeSet, GroupRecord, Grant, InputNotice, SharedField, Timestamp, UpdateNotice,
};
use crate::store::Store;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

type Pair = (String, String);

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<String, Account>,
    groups: BTreeMap<String, GroupRecord>,
    /// (group, member)
    memberships: BTreeSet<Pair>,
    /// (group, field, member)
    grants: BTreeSet<(String, Grant)>,
    /// (group, field) -> data
    fields: BTreeMap<Pair, String>,
    /// (group, field, recipient) -> notice
    update_notices: BTreeMap<(String, String, String), UpdateNotice>,
    /// Insertion order is kept so equal timestamps stay stable.
    input_notices: Vec<InputNotice>,
    /// (identity, key) -> data
    private: BTreeMap<Pair, String>,
}

impl Tables {
    fn is_member(&self, group_id: &str, member: &str) -> bool {
        self.memberships
            .contains(&(group_id.to_string(), member.to_string()))
    }

    fn remove_group(&mut self, group_id: &str) -> bool {
        if self.groups.remove(group_id).is_none() {
            return false;
        }
        self.memberships.retain(|(g, _)| g != group_id);
        self.grants.retain(|(g, _)| g != group_id);
        self.fields.retain(|(g, _), _| g != group_id);
        self.update_notices.retain(|(g, _, _), _| g != group_id);
        self.input_notices.retain(|n| n.group_id != group_id);
        true
    }

    fn remove_membership(&mut self, group_id: &str, member: &str) -> bool {
        if !self
            .memberships
            .remove(&(group_id.to_string(), member.to_string()))
        {
            return false;
        }
        self.grants
            .retain(|(g, grant)| !(g == group_id && grant.member == member));
        self.update_notices
            .retain(|(g, _, r), _| !(g == group_id && r == member));
        true
    }
}

/// A [`Store`] that keeps every table in memory.
///
/// Enforces the same uniqueness and cascade rules as [`crate::SqliteStore`],
/// so engine tests behave identically against either backend.
///
/// # Example
///
/// ```rust
/// use hostsync_store::{Account, MemoryStore, Store};
///
/// let store = MemoryStore::new();
/// store.insert_account(&Account {
///     identity: "alice".into(),
///     credential: "secret".into(),
///     timeout_minutes: 15,
///     session: String::new(),
///     last_activity: 0,
/// }).unwrap();
/// assert!(store.account("alice").unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.accounts.contains_key(&account.identity) {
            return Err(StoreError::Conflict(format!(
                "account {} already exists",
                account.identity
            )));
        }
        tables
            .accounts
            .insert(account.identity.clone(), account.clone());
        Ok(())
    }

    fn account(&self, identity: &str) -> StoreResult<Option<Account>> {
        Ok(self.tables.read().accounts.get(identity).cloned())
    }

    fn set_session(
        &self,
        identity: &str,
        session: &str,
        last_activity: Timestamp,
    ) -> StoreResult<()> {
        if let Some(account) = self.tables.write().accounts.get_mut(identity) {
            account.session = session.to_string();
            account.last_activity = last_activity;
        }
        Ok(())
    }

    fn touch_account(&self, identity: &str, last_activity: Timestamp) -> StoreResult<()> {
        if let Some(account) = self.tables.write().accounts.get_mut(identity) {
            account.last_activity = last_activity;
        }
        Ok(())
    }

    fn delete_account(&self, identity: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        if tables.accounts.remove(identity).is_none() {
            return Ok(false);
        }
        let hosted: Vec<String> = tables
            .groups
            .values()
            .filter(|g| g.host == identity)
            .map(|g| g.group_id.clone())
            .collect();
        for group_id in hosted {
            tables.remove_group(&group_id);
        }
        let joined: Vec<String> = tables
            .memberships
            .iter()
            .filter(|(_, m)| m == identity)
            .map(|(g, _)| g.clone())
            .collect();
        for group_id in joined {
            tables.remove_membership(&group_id, identity);
        }
        tables.private.retain(|(owner, _), _| owner != identity);
        Ok(true)
    }

    fn insert_group(&self, group: &GroupRecord) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.groups.contains_key(&group.group_id) {
            return Err(StoreError::Conflict(format!(
                "group {} already exists",
                group.group_id
            )));
        }
        if !tables.accounts.contains_key(&group.host) {
            return Err(StoreError::MissingParent(format!(
                "account {} does not exist",
                group.host
            )));
        }
        tables.groups.insert(group.group_id.clone(), group.clone());
        tables
            .memberships
            .insert((group.group_id.clone(), group.host.clone()));
        Ok(())
    }

    fn group(&self, group_id: &str) -> StoreResult<Option<GroupRecord>> {
        Ok(self.tables.read().groups.get(group_id).cloned())
    }

    fn groups_in_app(&self, app: &str) -> StoreResult<Vec<GroupRecord>> {
        Ok(self
            .tables
            .read()
            .groups
            .values()
            .filter(|g| g.app == app)
            .cloned()
            .collect())
    }

    fn groups_hosted_by(&self, host: &str) -> StoreResult<Vec<GroupRecord>> {
        Ok(self
            .tables
            .read()
            .groups
            .values()
            .filter(|g| g.host == host)
            .cloned()
            .collect())
    }

    fn groups_joined_by(&self, member: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .memberships
            .iter()
            .filter(|(_, m)| m == member)
            .map(|(g, _)| g.clone())
            .collect())
    }

    fn delete_group(&self, group_id: &str) -> StoreResult<bool> {
        Ok(self.tables.write().remove_group(group_id))
    }

    fn insert_membership(&self, group_id: &str, member: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.groups.contains_key(group_id) {
            return Err(StoreError::MissingParent(format!(
                "group {group_id} does not exist"
            )));
        }
        if !tables.accounts.contains_key(member) {
            return Err(StoreError::MissingParent(format!(
                "account {member} does not exist"
            )));
        }
        if !tables
            .memberships
            .insert((group_id.to_string(), member.to_string()))
        {
            return Err(StoreError::Conflict(format!(
                "{member} is already a member of {group_id}"
            )));
        }
        Ok(())
    }

    fn is_member(&self, group_id: &str, member: &str) -> StoreResult<bool> {
        Ok(self.tables.read().is_member(group_id, member))
    }

    fn members(&self, group_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .memberships
            .iter()
            .filter(|(g, _)| g == group_id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    fn delete_membership(&self, group_id: &str, member: &str) -> StoreResult<bool> {
        Ok(self.tables.write().remove_membership(group_id, member))
    }

    fn commit(&self, changes: &ChangeSet) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let group_id = changes.group_id.as_str();

        // Validate everything first so a rejected change set writes nothing.
        if !tables.groups.contains_key(group_id) {
            return Err(StoreError::MissingParent(format!(
                "group {group_id} does not exist"
            )));
        }
        let recipients = changes
            .grant
            .iter()
            .map(|g| &g.member)
            .chain(changes.notices.iter().map(|n| &n.recipient));
        for member in recipients {
            if !tables.is_member(group_id, member) {
                return Err(StoreError::MissingParent(format!(
                    "{member} is not a member of {group_id}"
                )));
            }
        }

        for field in &changes.fields {
            tables.fields.insert(
                (group_id.to_string(), field.field.clone()),
                field.data.clone(),
            );
        }
        for grant in &changes.revoke {
            tables.grants.remove(&(group_id.to_string(), grant.clone()));
        }
        for grant in &changes.grant {
            tables.grants.insert((group_id.to_string(), grant.clone()));
        }
        for notice in &changes.notices {
            tables.update_notices.insert(
                (
                    group_id.to_string(),
                    notice.field.clone(),
                    notice.recipient.clone(),
                ),
                notice.clone(),
            );
        }
        Ok(())
    }

    fn grants_for_fields(&self, group_id: &str, fields: &[String]) -> StoreResult<Vec<Grant>> {
        Ok(self
            .tables
            .read()
            .grants
            .iter()
            .filter(|(g, grant)| g == group_id && fields.contains(&grant.field))
            .map(|(_, grant)| grant.clone())
            .collect())
    }

    fn grants_for_member(&self, group_id: &str, member: &str) -> StoreResult<Vec<Grant>> {
        Ok(self
            .tables
            .read()
            .grants
            .iter()
            .filter(|(g, grant)| g == group_id && grant.member == member)
            .map(|(_, grant)| grant.clone())
            .collect())
    }

    fn fields(&self, group_id: &str, names: &[String]) -> StoreResult<Vec<SharedField>> {
        let tables = self.tables.read();
        Ok(names
            .iter()
            .filter_map(|name| {
                tables
                    .fields
                    .get(&(group_id.to_string(), name.clone()))
                    .map(|data| SharedField {
                        field: name.clone(),
                        data: data.clone(),
                    })
            })
            .collect())
    }

    fn update_notices(&self, group_id: &str, recipient: &str) -> StoreResult<Vec<UpdateNotice>> {
        let mut notices: Vec<UpdateNotice> = self
            .tables
            .read()
            .update_notices
            .iter()
            .filter(|((g, _, r), _)| g == group_id && r == recipient)
            .map(|(_, notice)| notice.clone())
            .collect();
        notices.sort_by_key(|n| n.time);
        Ok(notices)
    }

    fn delete_update_notices(
        &self,
        group_id: &str,
        recipient: &str,
        ids: &[String],
    ) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.update_notices.len();
        tables
            .update_notices
            .retain(|(g, _, r), n| !(g == group_id && r == recipient && ids.contains(&n.id)));
        Ok(before - tables.update_notices.len())
    }

    fn insert_input_notice(&self, notice: &InputNotice) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.groups.contains_key(&notice.group_id) {
            return Err(StoreError::MissingParent(format!(
                "group {} does not exist",
                notice.group_id
            )));
        }
        tables.input_notices.push(notice.clone());
        Ok(())
    }

    fn input_notices(&self, group_id: &str) -> StoreResult<Vec<InputNotice>> {
        let mut notices: Vec<InputNotice> = self
            .tables
            .read()
            .input_notices
            .iter()
            .filter(|n| n.group_id == group_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        notices.sort_by_key(|n| n.time);
        Ok(notices)
    }

    fn delete_input_notices(&self, group_id: &str, ids: &[String]) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.input_notices.len();
        tables
            .input_notices
            .retain(|n| !(n.group_id == group_id && ids.contains(&n.id)));
        Ok(before - tables.input_notices.len())
    }

    fn put_private(&self, identity: &str, key: &str, data: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.accounts.contains_key(identity) {
            return Err(StoreError::MissingParent(format!(
                "account {identity} does not exist"
            )));
        }
        tables
            .private
            .insert((identity.to_string(), key.to_string()), data.to_string());
        Ok(())
    }

    fn private(&self, identity: &str, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .tables
            .read()
            .private
            .get(&(identity.to_string(), key.to_string()))
            .cloned())
    }

    fn delete_private(&self, identity: &str, key: &str) -> StoreResult<bool> {
        Ok(self
            .tables
            .write()
            .private
            .remove(&(identity.to_string(), key.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(identity: &str) -> Account {
        Account {
            identity: identity.into(),
            credential: "pw".into(),
            timeout_minutes: 15,
            session: String::new(),
            last_activity: 0,
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_account(&account("alice")).unwrap();
        store.insert_account(&account("bob")).unwrap();
        store
            .insert_group(&GroupRecord {
                group_id: "g1".into(),
                app: "demo".into(),
                host: "alice".into(),
                created: 1,
            })
            .unwrap();
        store.insert_membership("g1", "bob").unwrap();
        store
    }

    fn notice(field: &str, recipient: &str, id: &str, time: u64) -> UpdateNotice {
        UpdateNotice {
            field: field.into(),
            recipient: recipient.into(),
            id: id.into(),
            time,
        }
    }

    #[test]
    fn duplicate_account_is_conflict() {
        let store = MemoryStore::new();
        store.insert_account(&account("alice")).unwrap();
        let err = store.insert_account(&account("alice")).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn group_insert_adds_host_membership() {
        let store = seeded();
        assert!(store.is_member("g1", "alice").unwrap());
        assert_eq!(store.members("g1").unwrap(), vec!["alice", "bob"]);
    }

    #[test]
    fn duplicate_membership_is_conflict() {
        let store = seeded();
        assert!(store.insert_membership("g1", "bob").unwrap_err().is_conflict());
    }

    #[test]
    fn membership_requires_group() {
        let store = seeded();
        let err = store.insert_membership("nope", "bob").unwrap_err();
        assert!(matches!(err, StoreError::MissingParent(_)));
    }

    #[test]
    fn notice_upsert_refreshes_instead_of_duplicating() {
        let store = seeded();
        let mut changes = ChangeSet::new("g1");
        changes.notices.push(notice("board", "bob", "n1", 10));
        store.commit(&changes).unwrap();

        let mut changes = ChangeSet::new("g1");
        changes.notices.push(notice("board", "bob", "n2", 20));
        store.commit(&changes).unwrap();

        let pending = store.update_notices("g1", "bob").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "n2");
        assert_eq!(pending[0].time, 20);
    }

    #[test]
    fn rejected_commit_writes_nothing() {
        let store = seeded();
        let mut changes = ChangeSet::new("g1");
        changes.fields.push(SharedField {
            field: "board".into(),
            data: "X".into(),
        });
        changes.notices.push(notice("board", "mallory", "n1", 10));

        assert!(store.commit(&changes).is_err());
        assert!(store.fields("g1", &["board".into()]).unwrap().is_empty());
    }

    #[test]
    fn removing_member_cascades_grants_and_notices() {
        let store = seeded();
        let mut changes = ChangeSet::new("g1");
        changes.grant.push(Grant::new("board", "bob"));
        changes.notices.push(notice("board", "bob", "n1", 10));
        store.commit(&changes).unwrap();

        assert!(store.delete_membership("g1", "bob").unwrap());
        assert!(store.grants_for_member("g1", "bob").unwrap().is_empty());
        assert!(store.update_notices("g1", "bob").unwrap().is_empty());
    }

    #[test]
    fn deleting_group_cascades_everything() {
        let store = seeded();
        let mut changes = ChangeSet::new("g1");
        changes.fields.push(SharedField {
            field: "board".into(),
            data: "X".into(),
        });
        changes.grant.push(Grant::new("board", "bob"));
        changes.notices.push(notice("board", "bob", "n1", 10));
        store.commit(&changes).unwrap();

        assert!(store.delete_group("g1").unwrap());
        assert!(store.members("g1").unwrap().is_empty());
        assert!(store.fields("g1", &["board".into()]).unwrap().is_empty());
        assert!(store.grants_for_fields("g1", &["board".into()]).unwrap().is_empty());
        assert!(store.update_notices("g1", "bob").unwrap().is_empty());
    }

    #[test]
    fn deleting_account_removes_hosted_groups_and_private_data() {
        let store = seeded();
        store.put_private("alice", "deck", "red").unwrap();

        assert!(store.delete_account("alice").unwrap());
        assert!(store.group("g1").unwrap().is_none());
        assert!(store.private("alice", "deck").unwrap().is_none());
        assert!(store.groups_joined_by("bob").unwrap().is_empty());
    }

    #[test]
    fn input_notices_are_ordered_by_time() {
        let store = seeded();
        for (id, time) in [("b", 20), ("a", 10), ("c", 20)] {
            store
                .insert_input_notice(&InputNotice {
                    group_id: "g1".into(),
                    sender: "bob".into(),
                    id: id.into(),
                    payload: "{}".into(),
                    time,
                })
                .unwrap();
        }
        let ids: Vec<_> = store
            .input_notices("g1")
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert_eq!(store.delete_input_notices("g1", &["a".into(), "zzz".into()]).unwrap(), 1);
        assert_eq!(store.input_notices("g1").unwrap().len(), 2);
    }
}
