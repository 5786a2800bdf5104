//! Benchmark utilities.

#![allow(missing_docs)]

use hostsync_server::{Credentials, GroupServer, Permissions, ServerConfig};
use hostsync_store::Store;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

/// Generate a random payload of the specified size.
pub fn random_payload(size: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(size)
        .map(char::from)
        .collect()
}

/// Field names `f0..fN`.
pub fn field_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("f{i}")).collect()
}

/// A server with one group `g1` hosted by `host` and `members` members
/// named `m0..mN`, all granted read access to `fields`.
pub struct Populated<S: Store> {
    pub server: Arc<GroupServer<S>>,
    pub host: Credentials,
    pub members: Vec<Credentials>,
    pub fields: Vec<String>,
}

pub fn populate<S: Store>(store: S, members: usize, fields: usize) -> Populated<S> {
    let server = Arc::new(GroupServer::new(Arc::new(store), ServerConfig::default()));
    let host = Credentials::new("host", server.register("host", "pw", 60).unwrap());
    server.start_group(&host, "g1", "bench").unwrap();

    let members = (0..members)
        .map(|i| {
            let name = format!("m{i}");
            let session = server.register(&name, "pw", 60).unwrap();
            server.add_member(&host, "g1", &name).unwrap();
            Credentials::new(name, session)
        })
        .collect();

    let fields = field_names(fields);
    server
        .set_permissions(&host, "g1", &fields, &Permissions::broadcast())
        .unwrap();

    Populated {
        server,
        host,
        members,
        fields,
    }
}
