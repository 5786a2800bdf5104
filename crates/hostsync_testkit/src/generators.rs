//! Property-based test generators using proptest.

use hostsync_protocol::GrantShape;
use proptest::prelude::*;

/// Strategy for generating identities.
pub fn identity_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating distinct identities.
pub fn identities_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(identity_strategy(), 1..=max)
        .prop_map(|set| set.into_iter().collect())
}

/// Strategy for generating group ids.
pub fn group_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("g[a-zA-Z0-9\\-]{1,20}").expect("Invalid regex")
}

/// Strategy for generating distinct field names.
pub fn field_names_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(
        prop::string::string_regex("[a-z]{1,12}").expect("Invalid regex"),
        1..=max,
    )
    .prop_map(|set| set.into_iter().collect())
}

/// Strategy for generating opaque payloads.
pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('!', '~'), 0..=max_len)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy for generating account timeouts in minutes.
pub fn timeout_strategy() -> impl Strategy<Value = u32> {
    1u32..=240
}

/// Strategy for generating grant shapes that fit `fields` x `grantees`.
pub fn grant_shape_strategy(fields: usize, grantees: usize) -> impl Strategy<Value = GrantShape> {
    prop_oneof![
        any::<bool>().prop_map(GrantShape::Single),
        prop::collection::vec(any::<bool>(), fields).prop_map(GrantShape::PerField),
        prop::collection::vec(prop::collection::vec(any::<bool>(), grantees), fields)
            .prop_map(GrantShape::Matrix),
    ]
}

/// Strategy for generating grant shapes whose dimensions do not fit
/// `fields` x `grantees`.
pub fn mismatched_shape_strategy(
    fields: usize,
    grantees: usize,
) -> impl Strategy<Value = GrantShape> {
    prop_oneof![
        prop::collection::vec(any::<bool>(), (fields + 1)..(fields + 4))
            .prop_map(GrantShape::PerField),
        prop::collection::vec(
            prop::collection::vec(any::<bool>(), (grantees + 1)..(grantees + 3)),
            fields,
        )
        .prop_map(GrantShape::Matrix),
    ]
}
