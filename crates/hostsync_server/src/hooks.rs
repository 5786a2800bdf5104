//! Registry of held listen responses.
//!
//! A hook is the sending half of a oneshot channel whose receiver is parked
//! in a listen request. Hooks are keyed by (group, participant, channel):
//! a participant holds at most one hook per channel, so a member may wait
//! for updates while, as host, also waiting for inputs.
//!
//! All mutations happen under one lock. Installing a hook where one already
//! exists completes the old one with [`Interrupt::Replaced`] first, so no
//! held response is ever abandoned.

use hostsync_protocol::{Channel, Delivery, Interrupt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct Pending {
    id: u64,
    sender: oneshot::Sender<Delivery>,
}

impl Pending {
    fn complete(self, delivery: Delivery) -> bool {
        self.sender.send(delivery).is_ok()
    }
}

#[derive(Default)]
struct Slot {
    updates: Option<Pending>,
    inputs: Option<Pending>,
    threshold: Option<usize>,
}

impl Slot {
    fn channel(&mut self, channel: Channel) -> &mut Option<Pending> {
        match channel {
            Channel::Updates => &mut self.updates,
            Channel::Inputs => &mut self.inputs,
        }
    }

    fn is_vacant(&self) -> bool {
        self.updates.is_none() && self.inputs.is_none() && self.threshold.is_none()
    }

    fn drain(&mut self) -> impl Iterator<Item = Pending> {
        [self.updates.take(), self.inputs.take()].into_iter().flatten()
    }
}

type GroupSlots = HashMap<String, Slot>;

/// Drops the participant's slot once it holds nothing, and the group's table
/// once it has no slots left.
fn prune(groups: &mut HashMap<String, GroupSlots>, group: &str, participant: &str) {
    let Some(slots) = groups.get_mut(group) else {
        return;
    };
    if slots.get(participant).is_some_and(Slot::is_vacant) {
        slots.remove(participant);
    }
    if slots.is_empty() {
        groups.remove(group);
    }
}

/// A parked listen request.
///
/// Returned by [`HookRegistry::register`]; resolves once the hook is
/// completed with data or interrupted.
#[derive(Debug)]
pub struct Hook {
    id: u64,
    receiver: oneshot::Receiver<Delivery>,
}

impl Hook {
    /// Registration id, used to withdraw exactly this hook.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the hook to be completed.
    ///
    /// If the registry drops the hook without completing it, the wait ends
    /// as [`Interrupt::Cancelled`].
    pub async fn wait(self) -> Delivery {
        self.receiver
            .await
            .unwrap_or(Delivery::interrupted(Interrupt::Cancelled))
    }
}

/// In-memory hook and threshold tables, scoped by (group, participant).
#[derive(Default)]
pub struct HookRegistry {
    groups: Mutex<HashMap<String, GroupSlots>>,
    next_id: AtomicU64,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the (empty) tables of a new group.
    pub fn open_group(&self, group: &str) {
        self.groups.lock().entry(group.to_string()).or_default();
    }

    /// Installs a hook, completing any previous hook on the same channel
    /// with [`Interrupt::Replaced`].
    pub fn register(&self, group: &str, participant: &str, channel: Channel) -> Hook {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        let previous = {
            let mut groups = self.groups.lock();
            let slot = groups
                .entry(group.to_string())
                .or_default()
                .entry(participant.to_string())
                .or_default();
            slot.channel(channel).replace(Pending { id, sender })
        };

        if let Some(old) = previous {
            debug!(group, participant, ?channel, "replacing outstanding hook");
            old.complete(Delivery::interrupted(Interrupt::Replaced));
        }

        Hook { id, receiver }
    }

    /// Removes a hook without completing it, if it is still the one
    /// identified by `id`.
    pub fn withdraw(&self, group: &str, participant: &str, channel: Channel, id: u64) {
        let mut groups = self.groups.lock();
        if let Some(pending) = groups
            .get_mut(group)
            .and_then(|slots| slots.get_mut(participant))
            .map(|slot| slot.channel(channel))
        {
            if pending.as_ref().is_some_and(|p| p.id == id) {
                pending.take();
            }
        }
        prune(&mut groups, group, participant);
    }

    /// Returns true if the participant has an outstanding hook on the channel.
    pub fn is_waiting(&self, group: &str, participant: &str, channel: Channel) -> bool {
        let mut groups = self.groups.lock();
        groups
            .get_mut(group)
            .and_then(|slots| slots.get_mut(participant))
            .is_some_and(|slot| slot.channel(channel).is_some())
    }

    /// Completes and removes the participant's hook on the channel.
    ///
    /// Returns false if no hook was outstanding or its receiver is gone.
    pub fn complete(
        &self,
        group: &str,
        participant: &str,
        channel: Channel,
        delivery: Delivery,
    ) -> bool {
        let pending = {
            let mut groups = self.groups.lock();
            let pending = groups
                .get_mut(group)
                .and_then(|slots| slots.get_mut(participant))
                .and_then(|slot| slot.channel(channel).take());
            prune(&mut groups, group, participant);
            pending
        };

        match pending {
            Some(pending) => {
                let delivered = pending.complete(delivery);
                if !delivered {
                    warn!(group, participant, ?channel, "listener went away before delivery");
                }
                delivered
            }
            None => false,
        }
    }

    /// Completes the participant's hooks with [`Interrupt::Cancelled`].
    ///
    /// With no channel given, both channels are cancelled. Returns the number
    /// of hooks that were outstanding.
    pub fn cancel(&self, group: &str, participant: &str, channel: Option<Channel>) -> usize {
        let cancelled: Vec<Pending> = {
            let mut groups = self.groups.lock();
            let Some(slot) = groups
                .get_mut(group)
                .and_then(|slots| slots.get_mut(participant))
            else {
                return 0;
            };
            let cancelled = match channel {
                Some(channel) => slot.channel(channel).take().into_iter().collect(),
                None => slot.drain().collect(),
            };
            prune(&mut groups, group, participant);
            cancelled
        };

        let count = cancelled.len();
        for pending in cancelled {
            pending.complete(Delivery::interrupted(Interrupt::Cancelled));
        }
        count
    }

    /// Drops the participant's tables in a group, completing their hooks
    /// with `reason`. Returns the number of hooks that were outstanding.
    pub fn interrupt_participant(&self, group: &str, participant: &str, reason: Interrupt) -> usize {
        let slot = {
            let mut groups = self.groups.lock();
            let slot = groups
                .get_mut(group)
                .and_then(|slots| slots.remove(participant));
            prune(&mut groups, group, participant);
            slot
        };

        let Some(mut slot) = slot else {
            return 0;
        };
        let mut count = 0;
        for pending in slot.drain() {
            pending.complete(Delivery::interrupted(reason));
            count += 1;
        }
        count
    }

    /// Discards a group's tables, completing every hook with
    /// [`Interrupt::Closed`]. Returns the number of hooks that were
    /// outstanding.
    pub fn close_group(&self, group: &str) -> usize {
        let slots = self.groups.lock().remove(group);
        let Some(slots) = slots else {
            return 0;
        };

        let mut count = 0;
        for (_, mut slot) in slots {
            for pending in slot.drain() {
                pending.complete(Delivery::interrupted(Interrupt::Closed));
                count += 1;
            }
        }
        count
    }

    /// Sets the participant's inline delivery threshold.
    pub fn set_threshold(&self, group: &str, participant: &str, bytes: usize) {
        self.groups
            .lock()
            .entry(group.to_string())
            .or_default()
            .entry(participant.to_string())
            .or_default()
            .threshold = Some(bytes);
    }

    /// Returns the participant's inline delivery threshold, if one was set.
    pub fn threshold(&self, group: &str, participant: &str) -> Option<usize> {
        self.groups
            .lock()
            .get(group)
            .and_then(|slots| slots.get(participant))
            .and_then(|slot| slot.threshold)
    }

    /// Returns the number of groups with tables in the registry.
    #[cfg(test)]
    pub(crate) fn group_count(&self) -> usize {
        self.groups.lock().len()
    }

    /// Returns the number of outstanding hooks in a group.
    pub fn waiting_count(&self, group: &str) -> usize {
        self.groups.lock().get(group).map_or(0, |slots| {
            slots
                .values()
                .map(|slot| usize::from(slot.updates.is_some()) + usize::from(slot.inputs.is_some()))
                .sum()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostsync_protocol::UpdateDelivery;

    fn updates(field: &str) -> Delivery {
        Delivery::Updates(UpdateDelivery {
            fields: vec![field.to_string()],
            ..UpdateDelivery::default()
        })
    }

    #[tokio::test]
    async fn complete_wakes_listener() {
        let hooks = HookRegistry::new();
        let hook = hooks.register("g1", "bob", Channel::Updates);
        assert!(hooks.is_waiting("g1", "bob", Channel::Updates));

        assert!(hooks.complete("g1", "bob", Channel::Updates, updates("board")));
        assert_eq!(hook.wait().await, updates("board"));
        assert!(!hooks.is_waiting("g1", "bob", Channel::Updates));
    }

    #[tokio::test]
    async fn second_register_replaces_first() {
        let hooks = HookRegistry::new();
        let first = hooks.register("g1", "bob", Channel::Updates);
        let second = hooks.register("g1", "bob", Channel::Updates);

        assert_eq!(
            first.wait().await.interrupt(),
            Some(Interrupt::Replaced)
        );
        assert_eq!(hooks.waiting_count("g1"), 1);

        hooks.complete("g1", "bob", Channel::Updates, updates("map"));
        assert_eq!(second.wait().await, updates("map"));
    }

    #[test]
    fn channels_are_independent() {
        let hooks = HookRegistry::new();
        let _updates = hooks.register("g1", "alice", Channel::Updates);
        let _inputs = hooks.register("g1", "alice", Channel::Inputs);
        assert_eq!(hooks.waiting_count("g1"), 2);

        assert_eq!(hooks.cancel("g1", "alice", Some(Channel::Inputs)), 1);
        assert!(hooks.is_waiting("g1", "alice", Channel::Updates));
        assert!(!hooks.is_waiting("g1", "alice", Channel::Inputs));
    }

    #[tokio::test]
    async fn cancel_without_hook_is_noop() {
        let hooks = HookRegistry::new();
        assert_eq!(hooks.cancel("g1", "bob", None), 0);

        let hook = hooks.register("g1", "bob", Channel::Updates);
        assert_eq!(hooks.cancel("g1", "bob", None), 1);
        assert_eq!(hook.wait().await.interrupt(), Some(Interrupt::Cancelled));
    }

    #[tokio::test]
    async fn close_group_interrupts_everyone() {
        let hooks = HookRegistry::new();
        hooks.open_group("g1");
        hooks.set_threshold("g1", "bob", 10);
        let bob = hooks.register("g1", "bob", Channel::Updates);
        let alice = hooks.register("g1", "alice", Channel::Inputs);

        assert_eq!(hooks.close_group("g1"), 2);
        assert_eq!(bob.wait().await.interrupt(), Some(Interrupt::Closed));
        assert_eq!(alice.wait().await.interrupt(), Some(Interrupt::Closed));
        assert_eq!(hooks.threshold("g1", "bob"), None);
        assert_eq!(hooks.waiting_count("g1"), 0);
    }

    #[tokio::test]
    async fn interrupt_participant_leaves_others() {
        let hooks = HookRegistry::new();
        let bob = hooks.register("g1", "bob", Channel::Updates);
        let _carol = hooks.register("g1", "carol", Channel::Updates);

        assert_eq!(hooks.interrupt_participant("g1", "bob", Interrupt::Removed), 1);
        assert_eq!(bob.wait().await.interrupt(), Some(Interrupt::Removed));
        assert!(hooks.is_waiting("g1", "carol", Channel::Updates));
    }

    #[test]
    fn withdraw_ignores_newer_hook() {
        let hooks = HookRegistry::new();
        let old = hooks.register("g1", "bob", Channel::Updates);
        let old_id = old.id();
        let _new = hooks.register("g1", "bob", Channel::Updates);

        hooks.withdraw("g1", "bob", Channel::Updates, old_id);
        assert!(hooks.is_waiting("g1", "bob", Channel::Updates));
    }

    #[test]
    fn withdrawn_hooks_leave_no_tables() {
        let hooks = HookRegistry::new();
        for i in 0..100 {
            let group = format!("unknown-{i}");
            let hook = hooks.register(&group, "mallory", Channel::Updates);
            hooks.withdraw(&group, "mallory", Channel::Updates, hook.id());
        }
        assert_eq!(hooks.group_count(), 0);
    }

    #[tokio::test]
    async fn tables_pruned_once_hooks_resolve() {
        let hooks = HookRegistry::new();
        let bob = hooks.register("g1", "bob", Channel::Updates);
        let _carol = hooks.register("g2", "carol", Channel::Inputs);
        let _dave = hooks.register("g3", "dave", Channel::Updates);

        hooks.complete("g1", "bob", Channel::Updates, updates("board"));
        bob.wait().await;
        hooks.cancel("g2", "carol", None);
        hooks.interrupt_participant("g3", "dave", Interrupt::Removed);
        assert_eq!(hooks.group_count(), 0);

        hooks.set_threshold("g1", "bob", 10);
        hooks.cancel("g1", "bob", None);
        assert_eq!(hooks.threshold("g1", "bob"), Some(10));
        assert_eq!(hooks.group_count(), 1);
    }

    #[test]
    fn complete_after_receiver_dropped() {
        let hooks = HookRegistry::new();
        drop(hooks.register("g1", "bob", Channel::Updates));
        assert!(!hooks.complete("g1", "bob", Channel::Updates, updates("board")));
    }
}
