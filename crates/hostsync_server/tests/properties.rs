//! Property tests for sessions and permission shapes.

use hostsync_server::{is_expired, resolve_shape, GroupError, Permissions};
use hostsync_store::Store;
use hostsync_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn authenticate_succeeds_iff_within_timeout(
        timeout in timeout_strategy(),
        idle_minutes in 0u64..300,
    ) {
        let t = TestServer::memory();
        let alice = t.account_with_timeout("alice", timeout);
        let before = t.store().account("alice").unwrap().unwrap();

        t.advance_minutes(idle_minutes);
        let result = t.authenticate(&alice);

        if idle_minutes < u64::from(timeout) {
            prop_assert!(result.is_ok());
            let after = t.store().account("alice").unwrap().unwrap();
            prop_assert!(after.last_activity > before.last_activity);
        } else {
            prop_assert!(matches!(result, Err(GroupError::ExpiredSession(_))));
            prop_assert!(is_expired(&before, t.now()));
        }
    }

    #[test]
    fn login_invalidates_old_tokens(logins in 1usize..5) {
        let t = TestServer::memory();
        let mut tokens = vec![t.account("alice")];
        for _ in 0..logins {
            tokens.push(t.login("alice"));
        }

        let (current, old) = tokens.split_last().unwrap();
        prop_assert!(t.ping(current).is_ok());
        for creds in old {
            prop_assert_eq!(t.ping(creds).unwrap_err().tag(), "invalid_session");
        }
    }

    #[test]
    fn well_formed_shapes_resolve(
        (fields, grantees, shape) in (1usize..6, 1usize..6)
            .prop_flat_map(|(f, g)| (Just(f), Just(g), grant_shape_strategy(f, g)))
    ) {
        let matrix = resolve_shape(&shape, fields, grantees).unwrap();
        prop_assert_eq!(matrix.len(), fields);
        prop_assert!(matrix.iter().all(|row| row.len() == grantees));
    }

    #[test]
    fn mismatched_shapes_rejected_before_storage(
        (fields, shape) in (1usize..4)
            .prop_flat_map(|f| (Just(f), mismatched_shape_strategy(f, 1)))
    ) {
        let t = TestServer::memory();
        let alice = t.account("alice");
        let names: Vec<String> = (0..fields).map(|i| format!("f{i}")).collect();

        let perms = Permissions::new(Some(vec!["alice".into()]), Some(shape));
        let err = t.set_permissions(&alice, "no-such-group", &names, &perms).unwrap_err();
        prop_assert_eq!(err.tag(), "invalid_argument");
    }

    #[test]
    fn ack_removes_exactly_named_ids(
        fields in field_names_strategy(6),
        ack_mask in prop::collection::vec(any::<bool>(), 6),
    ) {
        let t = TestServer::memory();
        let alice = t.account("alice");
        t.group(&alice, "g1", &["bob"]);
        let data: Vec<String> = fields.iter().map(|f| format!("v-{f}")).collect();
        t.submit_update(&alice, "g1", &fields, &data, Some(&Permissions::broadcast())).unwrap();

        let notices = t.store().update_notices("g1", "bob").unwrap();
        let acked: Vec<String> = notices
            .iter()
            .zip(&ack_mask)
            .filter(|(_, ack)| **ack)
            .map(|(n, _)| n.id.clone())
            .collect();
        let removed = t.store().delete_update_notices("g1", "bob", &acked).unwrap();
        prop_assert_eq!(removed, acked.len());

        let remaining = t.store().update_notices("g1", "bob").unwrap();
        prop_assert_eq!(remaining.len(), notices.len() - acked.len());
        prop_assert!(remaining.iter().all(|n| !acked.contains(&n.id)));
    }
}
