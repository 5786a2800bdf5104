//! The engine over a SQLite file behaves like it does over memory.

use hostsync_protocol::Delivery;
use hostsync_server::Permissions;
use hostsync_store::Store;
use hostsync_testkit::prelude::*;

fn exercise<S: Store>(t: &TestServer<S>) {
    let alice = t.account("alice");
    t.group(&alice, "g1", &["bob", "carol"]);

    t.submit_update(
        &alice,
        "g1",
        &strings(&["board", "hand"]),
        &strings(&["X..", "4h"]),
        Some(&Permissions::broadcast()),
    )
    .unwrap();
    assert_eq!(t.store().update_notices("g1", "bob").unwrap().len(), 2);

    t.remove_member(&alice, "g1", "bob").unwrap();
    assert!(t.store().update_notices("g1", "bob").unwrap().is_empty());
    assert!(t.store().grants_for_member("g1", "bob").unwrap().is_empty());
    assert_eq!(t.store().update_notices("g1", "carol").unwrap().len(), 2);

    let carol = t.login("carol");
    t.submit_input(&carol, "g1", "hello").unwrap();
    assert_eq!(t.store().input_notices("g1").unwrap().len(), 1);

    t.close_group(&alice, "g1").unwrap();
    assert!(t.store().group("g1").unwrap().is_none());
    assert!(t.store().update_notices("g1", "carol").unwrap().is_empty());
    assert!(t.store().input_notices("g1").unwrap().is_empty());
    assert!(t.store().fields("g1", &strings(&["board"])).unwrap().is_empty());
}

#[test]
fn cascades_agree_memory() {
    exercise(&TestServer::memory());
}

#[test]
fn cascades_agree_sqlite() {
    exercise(&TestServer::sqlite());
}

#[tokio::test]
async fn sqlite_delivery_round_trip() {
    let t = TestServer::sqlite();
    let alice = t.account("alice");
    t.group(&alice, "g1", &["bob"]);
    let bob = t.login("bob");

    t.submit_update(
        &alice,
        "g1",
        &strings(&["board"]),
        &strings(&["X.."]),
        Some(&Permissions::broadcast()),
    )
    .unwrap();

    let Delivery::Updates(updates) = t.listen_updates(&bob, "g1", &[], None).await.unwrap() else {
        panic!("expected updates");
    };
    assert_eq!(updates.data.get("board").map(String::as_str), Some("X.."));
    assert_eq!(updates.ack.len(), 1);
}
