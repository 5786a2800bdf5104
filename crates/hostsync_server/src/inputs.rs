//! Input channel: member inputs queued for the group's host.

use crate::auth::require_non_empty;
use crate::error::GroupResult;
use crate::server::{Credentials, GroupServer};
use crate::updates::notice_id;
use hostsync_protocol::{Channel, Delivery, InputDelivery, InputItem};
use hostsync_store::{InputNotice, Store};
use tracing::{debug, error};

impl<S: Store> GroupServer<S> {
    /// Queues an input for the host and wakes the host if it is listening.
    ///
    /// Any member may submit, the host included.
    pub fn submit_input(&self, creds: &Credentials, group: &str, input: &str) -> GroupResult<()> {
        require_non_empty("group", group)?;
        self.check_payload(input)?;
        self.authenticate(creds)?;
        let record = self.require_member(&creds.identity, group)?;

        self.store.insert_input_notice(&InputNotice {
            group_id: group.to_string(),
            sender: creds.identity.clone(),
            id: notice_id(),
            payload: input.to_string(),
            time: self.now(),
        })?;
        debug!(group, sender = %creds.identity, "input queued");

        if let Err(err) = self.deliver_inputs(group, &record.host) {
            error!(group, host = %record.host, error = %err, "input delivery failed");
        }
        Ok(())
    }

    /// Completes the host's input hook with every queued input, oldest first.
    ///
    /// Returns true if a listener received the delivery.
    pub fn deliver_inputs(&self, group: &str, host: &str) -> GroupResult<bool> {
        if !self.hooks.is_waiting(group, host, Channel::Inputs) {
            return Ok(false);
        }

        let notices = self.store.input_notices(group)?;
        if notices.is_empty() {
            return Ok(false);
        }

        let mut delivery = InputDelivery::default();
        for notice in notices {
            delivery.ack.push(notice.id);
            delivery.inputs.push(InputItem {
                user: notice.sender,
                input: notice.payload,
                time: notice.time,
            });
        }

        debug!(group, host, inputs = delivery.inputs.len(), "delivering inputs");
        Ok(self
            .hooks
            .complete(group, host, Channel::Inputs, Delivery::Inputs(delivery)))
    }

    /// Waits for member inputs. Host only.
    ///
    /// Inputs named in `ack` are cleared first; remaining inputs complete the
    /// call at once, otherwise it is held until a member submits.
    pub async fn listen_input(
        &self,
        creds: &Credentials,
        group: &str,
        ack: &[String],
    ) -> GroupResult<Delivery> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;

        let identity = creds.identity.as_str();
        let hook = self.hooks.register(group, identity, Channel::Inputs);
        debug!(group, identity, "listening for inputs");

        let prepared = self.check_host(identity, group).and_then(|_| {
            if !ack.is_empty() {
                self.store.delete_input_notices(group, ack)?;
            }
            self.deliver_inputs(group, identity)
        });
        if let Err(err) = prepared {
            self.hooks
                .withdraw(group, identity, Channel::Inputs, hook.id());
            return Err(err);
        }

        Ok(hook.wait().await)
    }

    /// Abandons the caller's outstanding listens in a group.
    ///
    /// Cancels the hook of `channel`, or of both channels when none is given.
    /// Nothing outstanding is not an error. Returns the number of hooks
    /// cancelled.
    pub fn stop_listening(
        &self,
        creds: &Credentials,
        group: &str,
        channel: Option<Channel>,
    ) -> GroupResult<usize> {
        require_non_empty("group", group)?;
        self.authenticate(creds)?;
        let cancelled = self.hooks.cancel(group, &creds.identity, channel);
        debug!(group, identity = %creds.identity, cancelled, "listening stopped");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::config::ServerConfig;
    use crate::server::{Credentials, GroupServer};
    use hostsync_protocol::{Channel, Delivery, Interrupt};
    use hostsync_store::{MemoryStore, Store};
    use std::sync::Arc;
    use std::time::Duration;

    fn fixture() -> (Arc<GroupServer<MemoryStore>>, Arc<ManualClock>, Credentials, Credentials) {
        let clock = Arc::new(ManualClock::new(1_000));
        let server = GroupServer::with_clock(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            ServerConfig::default(),
        );
        let alice = Credentials::new("alice", server.register("alice", "pw", 60).unwrap());
        let bob = Credentials::new("bob", server.register("bob", "pw", 60).unwrap());
        server.start_group(&alice, "g1", "demo").unwrap();
        server.add_member(&alice, "g1", "bob").unwrap();
        (Arc::new(server), clock, alice, bob)
    }

    #[tokio::test]
    async fn queued_inputs_delivered_in_order() {
        let (server, clock, alice, bob) = fixture();
        server.submit_input(&bob, "g1", "first").unwrap();
        clock.advance(Duration::from_millis(5));
        server.submit_input(&alice, "g1", "second").unwrap();

        let Delivery::Inputs(inputs) = server.listen_input(&alice, "g1", &[]).await.unwrap() else {
            panic!("expected inputs");
        };
        let payloads: Vec<&str> = inputs.inputs.iter().map(|i| i.input.as_str()).collect();
        assert_eq!(payloads, vec!["first", "second"]);
        assert_eq!(inputs.inputs[0].user, "bob");
        assert_eq!(inputs.ack.len(), 2);

        let pending = server.listen_input(&alice, "g1", &inputs.ack);
        assert!(tokio::time::timeout(Duration::from_millis(50), pending)
            .await
            .is_err());
        assert!(server.store().input_notices("g1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_host_listens_for_inputs() {
        let (server, _, _, bob) = fixture();
        let err = server.listen_input(&bob, "g1", &[]).await.unwrap_err();
        assert_eq!(err.tag(), "not_host");
        assert_eq!(server.hooks().waiting_count("g1"), 0);
    }

    #[test]
    fn non_member_cannot_submit() {
        let (server, _, _, _) = fixture();
        let carol = Credentials::new("carol", server.register("carol", "pw", 60).unwrap());
        assert_eq!(
            server.submit_input(&carol, "g1", "hi").unwrap_err().tag(),
            "not_member"
        );
    }

    #[tokio::test]
    async fn stop_listening_cancels_held_listen() {
        let (server, _, alice, _) = fixture();
        let listener = {
            let server = Arc::clone(&server);
            let alice = alice.clone();
            tokio::spawn(async move { server.listen_input(&alice, "g1", &[]).await })
        };
        while !server.hooks().is_waiting("g1", "alice", Channel::Inputs) {
            tokio::task::yield_now().await;
        }

        assert_eq!(server.stop_listening(&alice, "g1", None).unwrap(), 1);
        let delivery = listener.await.unwrap().unwrap();
        assert_eq!(delivery.interrupt(), Some(Interrupt::Cancelled));
        assert_eq!(server.stop_listening(&alice, "g1", None).unwrap(), 0);
    }

    #[tokio::test]
    async fn input_listens_on_unknown_groups_leave_no_tables() {
        let (server, _, alice, _) = fixture();
        let tracked = server.hooks().group_count();
        for i in 0..50 {
            let group = format!("missing-{i}");
            let err = server.listen_input(&alice, &group, &[]).await.unwrap_err();
            assert_eq!(err.tag(), "no_such_group");
        }
        assert_eq!(server.hooks().group_count(), tracked);
    }
}
