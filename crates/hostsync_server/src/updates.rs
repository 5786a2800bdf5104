//! Update channel: host-authored shared fields delivered to permitted members.
//!
//! Writes go to storage as a single [`ChangeSet`]: field data, the
//! accompanying permission change and one update notice per recipient. Only
//! after the commit are waiting listeners woken, so a delivery never refers
//! to data that is not durable.

use crate::auth::require_non_empty;
use crate::error::{GroupError, GroupResult};
use crate::permissions::{plan, Grantee, PermissionPlan, Permissions};
use crate::server::{Credentials, GroupServer};
use hostsync_protocol::{Channel, Delivery, UpdateDelivery};
use hostsync_store::{ChangeSet, Grant, SharedField, Store, UpdateNotice};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, error};
use uuid::Uuid;

pub(crate) fn notice_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl<S: Store> GroupServer<S> {
    pub(crate) fn check_fields(&self, fields: &[String]) -> GroupResult<()> {
        if fields.is_empty() {
            return Err(GroupError::invalid("field list must not be empty"));
        }
        if fields.len() > self.config.max_fields_per_request {
            return Err(GroupError::invalid(format!(
                "{} fields exceed limit of {}",
                fields.len(),
                self.config.max_fields_per_request
            )));
        }
        if fields.iter().any(String::is_empty) {
            return Err(GroupError::invalid("field names must not be empty"));
        }
        Ok(())
    }

    /// Resolves each grantee column to concrete members and plans the change.
    ///
    /// The current member list is read at most once and shared by every
    /// [`Grantee::AllCurrentMembers`] column.
    fn plan_permissions(
        &self,
        group: &str,
        fields: &[String],
        permissions: &Permissions,
        matrix: &[Vec<bool>],
    ) -> GroupResult<PermissionPlan> {
        let grantees = &permissions.grantees;
        let current = if grantees
            .iter()
            .any(|g| matches!(g, Grantee::AllCurrentMembers))
        {
            self.store.members(group)?
        } else {
            Vec::new()
        };

        let mut columns: Vec<&[String]> = Vec::with_capacity(grantees.len());
        for grantee in grantees {
            match grantee {
                Grantee::Member(member) => {
                    if !self.store.is_member(group, member)? {
                        return Err(GroupError::NotMember {
                            identity: member.clone(),
                            group: group.to_string(),
                        });
                    }
                    columns.push(std::slice::from_ref(member));
                }
                Grantee::AllCurrentMembers => columns.push(&current),
            }
        }
        Ok(plan(fields, &columns, matrix))
    }

    fn notice(&self, grant: &Grant) -> UpdateNotice {
        UpdateNotice {
            field: grant.field.clone(),
            recipient: grant.member.clone(),
            id: notice_id(),
            time: self.now(),
        }
    }

    /// Commits a change set and wakes every recipient of its notices.
    fn commit_and_notify(&self, changes: ChangeSet) -> GroupResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.store.commit(&changes)?;
        debug!(
            group = %changes.group_id,
            fields = changes.fields.len(),
            granted = changes.grant.len(),
            revoked = changes.revoke.len(),
            notices = changes.notices.len(),
            "change set committed"
        );

        let recipients: BTreeSet<&str> = changes
            .notices
            .iter()
            .map(|n| n.recipient.as_str())
            .collect();
        for recipient in recipients {
            if let Err(err) = self.deliver_updates(&changes.group_id, recipient) {
                error!(group = %changes.group_id, recipient, error = %err, "update delivery failed");
            }
        }
        Ok(())
    }

    /// Grants or revokes read access to fields.
    ///
    /// Every granted pair gets an update notice, so the member learns the
    /// field became readable even if its data did not change. Revocation
    /// does not notify.
    pub fn set_permissions(
        &self,
        creds: &Credentials,
        group: &str,
        fields: &[String],
        permissions: &Permissions,
    ) -> GroupResult<()> {
        require_non_empty("group", group)?;
        self.check_fields(fields)?;
        let matrix = permissions.matrix(fields.len())?;
        self.authenticate(creds)?;
        self.check_host(&creds.identity, group)?;

        let plan = self.plan_permissions(group, fields, permissions, &matrix)?;
        let mut changes = ChangeSet::new(group);
        changes.notices = plan.grant.iter().map(|g| self.notice(g)).collect();
        changes.grant = plan.grant;
        changes.revoke = plan.revoke;
        self.commit_and_notify(changes)
    }

    /// Writes shared fields and notifies every member allowed to read them.
    ///
    /// With `permissions`, the permission change is applied to the same
    /// fields in the same transaction, and recipients are computed from the
    /// resulting grants.
    pub fn submit_update(
        &self,
        creds: &Credentials,
        group: &str,
        fields: &[String],
        data: &[String],
        permissions: Option<&Permissions>,
    ) -> GroupResult<()> {
        require_non_empty("group", group)?;
        self.check_fields(fields)?;
        if fields.len() != data.len() {
            return Err(GroupError::invalid(format!(
                "{} fields but {} data items",
                fields.len(),
                data.len()
            )));
        }
        for item in data {
            self.check_payload(item)?;
        }
        let matrix = permissions
            .map(|p| p.matrix(fields.len()))
            .transpose()?;
        self.authenticate(creds)?;
        self.check_host(&creds.identity, group)?;

        let plan = match (permissions, matrix) {
            (Some(permissions), Some(matrix)) => {
                self.plan_permissions(group, fields, permissions, &matrix)?
            }
            _ => PermissionPlan::default(),
        };

        let mut readers: BTreeSet<Grant> = self
            .store
            .grants_for_fields(group, fields)?
            .into_iter()
            .collect();
        for revoked in &plan.revoke {
            readers.remove(revoked);
        }
        readers.extend(plan.grant.iter().cloned());

        let mut changes = ChangeSet::new(group);
        changes.fields = fields
            .iter()
            .zip(data)
            .map(|(field, data)| SharedField {
                field: field.clone(),
                data: data.clone(),
            })
            .collect();
        changes.notices = readers.iter().map(|g| self.notice(g)).collect();
        changes.grant = plan.grant;
        changes.revoke = plan.revoke;
        self.commit_and_notify(changes)
    }

    /// Completes the recipient's update hook if notices are pending.
    ///
    /// Notices for fields the recipient can no longer read are discarded.
    /// Field data is inlined only when smaller than the recipient's
    /// threshold. Returns true if a listener received the delivery.
    pub fn deliver_updates(&self, group: &str, recipient: &str) -> GroupResult<bool> {
        if !self.hooks.is_waiting(group, recipient, Channel::Updates) {
            return Ok(false);
        }

        let notices = self.store.update_notices(group, recipient)?;
        if notices.is_empty() {
            return Ok(false);
        }

        let readable: HashSet<String> = self
            .store
            .grants_for_member(group, recipient)?
            .into_iter()
            .map(|g| g.field)
            .collect();
        let (live, stale): (Vec<_>, Vec<_>) = notices
            .into_iter()
            .partition(|n| readable.contains(&n.field));
        if !stale.is_empty() {
            let ids: Vec<String> = stale.into_iter().map(|n| n.id).collect();
            self.store.delete_update_notices(group, recipient, &ids)?;
        }
        if live.is_empty() {
            return Ok(false);
        }

        let threshold = self
            .hooks
            .threshold(group, recipient)
            .unwrap_or(self.config.default_threshold);
        let fields: Vec<String> = live.iter().map(|n| n.field.clone()).collect();
        let data: BTreeMap<String, String> = self
            .store
            .fields(group, &fields)?
            .into_iter()
            .filter(|f| f.data.len() < threshold)
            .map(|f| (f.field, f.data))
            .collect();
        let delivery = UpdateDelivery {
            fields,
            data,
            ack: live.into_iter().map(|n| n.id).collect(),
        };

        debug!(group, recipient, fields = delivery.fields.len(), "delivering updates");
        Ok(self
            .hooks
            .complete(group, recipient, Channel::Updates, Delivery::Updates(delivery)))
    }

    /// Waits for field updates.
    ///
    /// Notices named in `ack` are cleared first. If notices remain, the call
    /// completes at once; otherwise it is held until a later write, a
    /// cancellation or the end of the caller's membership.
    pub async fn listen_updates(
        &self,
        creds: &Credentials,
        group: &str,
        ack: &[String],
        threshold: Option<usize>,
    ) -> GroupResult<Delivery> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;

        let identity = creds.identity.as_str();
        let hook = self.hooks.register(group, identity, Channel::Updates);
        debug!(group, identity, "listening for updates");

        let prepared = self.require_member(identity, group).and_then(|_| {
            if let Some(bytes) = threshold {
                self.hooks.set_threshold(group, identity, bytes);
            }
            if !ack.is_empty() {
                self.store.delete_update_notices(group, identity, ack)?;
            }
            self.deliver_updates(group, identity)
        });
        if let Err(err) = prepared {
            self.hooks
                .withdraw(group, identity, Channel::Updates, hook.id());
            return Err(err);
        }

        Ok(hook.wait().await)
    }

    /// Reads fields explicitly.
    ///
    /// The host reads any field; other members only fields they hold a
    /// grant for. Unreadable and unwritten fields are omitted.
    pub fn fetch_fields(
        &self,
        creds: &Credentials,
        group: &str,
        fields: &[String],
    ) -> GroupResult<BTreeMap<String, String>> {
        require_non_empty("group", group)?;
        self.check_fields(fields)?;
        self.authenticate(creds)?;
        let record = self.require_member(&creds.identity, group)?;

        let names: Vec<String> = if record.host == creds.identity {
            fields.to_vec()
        } else {
            let readable: HashSet<String> = self
                .store
                .grants_for_member(group, &creds.identity)?
                .into_iter()
                .map(|g| g.field)
                .collect();
            fields
                .iter()
                .filter(|f| readable.contains(*f))
                .cloned()
                .collect()
        };

        Ok(self
            .store
            .fields(group, &names)?
            .into_iter()
            .map(|f| (f.field, f.data))
            .collect())
    }

    /// Sets the caller's inline delivery threshold for a group.
    pub fn set_threshold(&self, creds: &Credentials, group: &str, bytes: usize) -> GroupResult<()> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;
        self.require_member(&creds.identity, group)?;
        self.hooks.set_threshold(group, &creds.identity, bytes);
        Ok(())
    }
}
