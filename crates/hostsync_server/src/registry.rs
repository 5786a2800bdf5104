//! Group and membership bookkeeping.

use crate::auth::require_non_empty;
use crate::error::{GroupError, GroupResult};
use crate::server::{Credentials, GroupServer};
use hostsync_protocol::Interrupt;
use hostsync_store::{GroupRecord, Store};
use tracing::info;

impl<S: Store> GroupServer<S> {
    /// Looks up a group, failing with [`GroupError::NoSuchGroup`].
    pub(crate) fn require_group(&self, group: &str) -> GroupResult<GroupRecord> {
        self.store
            .group(group)?
            .ok_or_else(|| GroupError::NoSuchGroup(group.to_string()))
    }

    /// Host guard shared by every host-restricted operation.
    pub fn check_host(&self, identity: &str, group: &str) -> GroupResult<GroupRecord> {
        let record = self.require_group(group)?;
        if record.host != identity {
            return Err(GroupError::NotHost {
                identity: identity.to_string(),
                group: group.to_string(),
            });
        }
        Ok(record)
    }

    /// Membership guard; the host counts as a member.
    pub fn require_member(&self, identity: &str, group: &str) -> GroupResult<GroupRecord> {
        let record = self.require_group(group)?;
        if !self.store.is_member(group, identity)? {
            return Err(GroupError::NotMember {
                identity: identity.to_string(),
                group: group.to_string(),
            });
        }
        Ok(record)
    }

    /// Creates a group hosted by the caller.
    pub fn start_group(&self, creds: &Credentials, group: &str, app: &str) -> GroupResult<()> {
        require_non_empty("group", group)?;
        require_non_empty("app", app)?;
        self.authenticate(creds)?;

        self.store.insert_group(&GroupRecord {
            group_id: group.to_string(),
            app: app.to_string(),
            host: creds.identity.clone(),
            created: self.now(),
        })?;
        self.hooks.open_group(group);

        info!(group, app, host = %creds.identity, "group started");
        Ok(())
    }

    /// Closes a hosted group, completing every outstanding hook in it.
    pub fn close_group(&self, creds: &Credentials, group: &str) -> GroupResult<()> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;
        self.check_host(&creds.identity, group)?;
        self.close(group)
    }

    fn close(&self, group: &str) -> GroupResult<()> {
        self.store.delete_group(group)?;
        let interrupted = self.hooks.close_group(group);
        info!(group, interrupted, "group closed");
        Ok(())
    }

    /// Adds an existing account to a hosted group.
    pub fn add_member(&self, creds: &Credentials, group: &str, member: &str) -> GroupResult<()> {
        require_non_empty("group", group)?;
        require_non_empty("member", member)?;
        self.authenticate(creds)?;
        self.check_host(&creds.identity, group)?;

        if self.store.account(member)?.is_none() {
            return Err(GroupError::invalid(format!("no account named {member}")));
        }
        self.store.insert_membership(group, member)?;
        info!(group, member, "member added");
        Ok(())
    }

    /// Removes a member from a hosted group. Removing the host closes it.
    pub fn remove_member(&self, creds: &Credentials, group: &str, member: &str) -> GroupResult<()> {
        require_non_empty("group", group)?;
        require_non_empty("member", member)?;
        self.authenticate(creds)?;
        let record = self.check_host(&creds.identity, group)?;

        if record.host == member {
            return self.close(group);
        }
        self.expel(group, member)
    }

    fn expel(&self, group: &str, member: &str) -> GroupResult<()> {
        if !self.store.delete_membership(group, member)? {
            return Err(GroupError::NotMember {
                identity: member.to_string(),
                group: group.to_string(),
            });
        }
        self.hooks
            .interrupt_participant(group, member, Interrupt::Removed);
        info!(group, member, "member removed");
        Ok(())
    }

    /// Joins a group as a member.
    pub fn join_group(&self, creds: &Credentials, group: &str) -> GroupResult<()> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;
        self.require_group(group)?;
        self.store.insert_membership(group, &creds.identity)?;
        info!(group, member = %creds.identity, "member joined");
        Ok(())
    }

    /// Leaves a group. The host leaving closes it.
    pub fn leave_group(&self, creds: &Credentials, group: &str) -> GroupResult<()> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;
        let record = self.require_group(group)?;

        if record.host == creds.identity {
            return self.close(group);
        }
        self.expel(group, &creds.identity)
    }

    /// Lists the groups of an application namespace.
    pub fn list_groups(&self, creds: &Credentials, app: &str) -> GroupResult<Vec<GroupRecord>> {
        require_non_empty("app", app)?;
        self.authenticate(creds)?;
        Ok(self.store.groups_in_app(app)?)
    }

    /// Lists the members of a group the caller belongs to.
    pub fn list_members(&self, creds: &Credentials, group: &str) -> GroupResult<Vec<String>> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;
        self.require_member(&creds.identity, group)?;
        Ok(self.store.members(group)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::config::ServerConfig;
    use crate::server::{Credentials, GroupServer};
    use hostsync_protocol::{Channel, Interrupt};
    use hostsync_store::{MemoryStore, Store};
    use std::sync::Arc;

    fn server() -> GroupServer<MemoryStore> {
        GroupServer::with_clock(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_000)),
            ServerConfig::default(),
        )
    }

    fn account(server: &GroupServer<MemoryStore>, name: &str) -> Credentials {
        Credentials::new(name, server.register(name, "pw", 60).unwrap())
    }

    #[test]
    fn host_is_implicit_member() {
        let server = server();
        let alice = account(&server, "alice");
        server.start_group(&alice, "g1", "demo").unwrap();
        assert_eq!(server.list_members(&alice, "g1").unwrap(), vec!["alice"]);
    }

    #[test]
    fn duplicate_group_rejected() {
        let server = server();
        let alice = account(&server, "alice");
        server.start_group(&alice, "g1", "demo").unwrap();
        assert_eq!(
            server.start_group(&alice, "g1", "demo").unwrap_err().tag(),
            "duplicate"
        );
    }

    #[test]
    fn only_host_manages_members() {
        let server = server();
        let alice = account(&server, "alice");
        let bob = account(&server, "bob");
        account(&server, "carol");
        server.start_group(&alice, "g1", "demo").unwrap();
        server.add_member(&alice, "g1", "bob").unwrap();

        assert_eq!(
            server.add_member(&bob, "g1", "carol").unwrap_err().tag(),
            "not_host"
        );
        assert_eq!(server.close_group(&bob, "g1").unwrap_err().tag(), "not_host");
        assert_eq!(
            server.close_group(&alice, "g2").unwrap_err().tag(),
            "no_such_group"
        );
    }

    #[test]
    fn add_member_requires_account() {
        let server = server();
        let alice = account(&server, "alice");
        server.start_group(&alice, "g1", "demo").unwrap();
        assert_eq!(
            server.add_member(&alice, "g1", "ghost").unwrap_err().tag(),
            "invalid_argument"
        );
    }

    #[tokio::test]
    async fn removing_member_interrupts_their_hook() {
        let server = server();
        let alice = account(&server, "alice");
        account(&server, "bob");
        server.start_group(&alice, "g1", "demo").unwrap();
        server.add_member(&alice, "g1", "bob").unwrap();

        let hook = server.hooks().register("g1", "bob", Channel::Updates);
        server.remove_member(&alice, "g1", "bob").unwrap();

        assert_eq!(hook.wait().await.interrupt(), Some(Interrupt::Removed));
        assert!(!server.store().is_member("g1", "bob").unwrap());
    }

    #[tokio::test]
    async fn removing_host_closes_group() {
        let server = server();
        let alice = account(&server, "alice");
        server.start_group(&alice, "g1", "demo").unwrap();

        let hook = server.hooks().register("g1", "alice", Channel::Inputs);
        server.remove_member(&alice, "g1", "alice").unwrap();

        assert_eq!(hook.wait().await.interrupt(), Some(Interrupt::Closed));
        assert!(server.store().group("g1").unwrap().is_none());
    }

    #[test]
    fn join_and_leave() {
        let server = server();
        let alice = account(&server, "alice");
        let bob = account(&server, "bob");
        server.start_group(&alice, "g1", "demo").unwrap();

        server.join_group(&bob, "g1").unwrap();
        assert_eq!(server.join_group(&bob, "g1").unwrap_err().tag(), "duplicate");
        assert_eq!(server.list_members(&bob, "g1").unwrap(), vec!["alice", "bob"]);

        server.leave_group(&bob, "g1").unwrap();
        assert_eq!(server.leave_group(&bob, "g1").unwrap_err().tag(), "not_member");
        assert_eq!(server.list_members(&bob, "g1").unwrap_err().tag(), "not_member");
    }

    #[test]
    fn list_groups_by_app() {
        let server = server();
        let alice = account(&server, "alice");
        server.start_group(&alice, "g1", "demo").unwrap();
        server.start_group(&alice, "g2", "other").unwrap();

        let groups = server.list_groups(&alice, "demo").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_id, "g1");
        assert_eq!(groups[0].host, "alice");
    }
}
