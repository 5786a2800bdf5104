//! Per-field, per-member read permissions.
//!
//! A permission change is a boolean matrix over (field x grantee). A grantee
//! is either a named member or every current member of the group; the latter
//! is expanded to a concrete member list when the change is applied, so
//! members who join later are not covered by it.

use crate::error::{GroupError, GroupResult};
use hostsync_protocol::GrantShape;
use hostsync_store::Grant;
use std::collections::BTreeMap;

/// Who a column of the permission matrix applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    /// One named member.
    Member(String),
    /// Every member of the group at the time of the call, host included.
    AllCurrentMembers,
}

/// A permission change: the grantee columns and the values to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permissions {
    /// Matrix columns.
    pub grantees: Vec<Grantee>,
    /// Matrix values.
    pub shape: GrantShape,
}

impl Permissions {
    /// Builds a permission change from optional wire arguments.
    ///
    /// Without a member list the single column is [`Grantee::AllCurrentMembers`];
    /// without grants every pair is granted.
    pub fn new(members: Option<Vec<String>>, grants: Option<GrantShape>) -> Self {
        let grantees = match members {
            Some(members) => members.into_iter().map(Grantee::Member).collect(),
            None => vec![Grantee::AllCurrentMembers],
        };
        Self {
            grantees,
            shape: grants.unwrap_or_default(),
        }
    }

    /// Grants every field to every current member.
    pub fn broadcast() -> Self {
        Self::new(None, None)
    }

    /// Validates the grantees and resolves the shape to a full
    /// fields x grantees matrix.
    pub fn matrix(&self, fields: usize) -> GroupResult<Vec<Vec<bool>>> {
        if self.grantees.is_empty() {
            return Err(GroupError::invalid("member list must not be empty"));
        }
        if self
            .grantees
            .iter()
            .any(|g| matches!(g, Grantee::Member(name) if name.is_empty()))
        {
            return Err(GroupError::invalid("member names must not be empty"));
        }
        resolve_shape(&self.shape, fields, self.grantees.len())
    }
}

/// Expands a grant shape to one row per field and one column per grantee.
///
/// Fails with [`GroupError::InvalidArgument`] on any length mismatch.
pub fn resolve_shape(
    shape: &GrantShape,
    fields: usize,
    grantees: usize,
) -> GroupResult<Vec<Vec<bool>>> {
    match shape {
        GrantShape::Single(value) => Ok(vec![vec![*value; grantees]; fields]),
        GrantShape::PerField(values) => {
            if values.len() != fields {
                return Err(GroupError::invalid(format!(
                    "expected {fields} permission values, got {}",
                    values.len()
                )));
            }
            Ok(values.iter().map(|v| vec![*v; grantees]).collect())
        }
        GrantShape::Matrix(rows) => {
            if rows.len() != fields {
                return Err(GroupError::invalid(format!(
                    "expected {fields} permission rows, got {}",
                    rows.len()
                )));
            }
            if let Some(row) = rows.iter().find(|row| row.len() != grantees) {
                return Err(GroupError::invalid(format!(
                    "expected {grantees} permission columns, got {}",
                    row.len()
                )));
            }
            Ok(rows.clone())
        }
    }
}

/// Grants to insert and delete for one permission change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPlan {
    /// Pairs resolved to true.
    pub grant: Vec<Grant>,
    /// Pairs resolved to false.
    pub revoke: Vec<Grant>,
}

/// Computes the grant and revoke sets of a resolved matrix.
///
/// `columns` holds the concrete members of each grantee column. When a pair
/// is covered by several cells, the last one wins.
pub fn plan<C: AsRef<[String]>>(
    fields: &[String],
    columns: &[C],
    matrix: &[Vec<bool>],
) -> PermissionPlan {
    let mut cells: BTreeMap<Grant, bool> = BTreeMap::new();
    for (field, row) in fields.iter().zip(matrix) {
        for (members, value) in columns.iter().zip(row) {
            for member in members.as_ref() {
                cells.insert(Grant::new(field.as_str(), member.as_str()), *value);
            }
        }
    }

    let mut plan = PermissionPlan::default();
    for (grant, value) in cells {
        if value {
            plan.grant.push(grant);
        } else {
            plan.revoke.push(grant);
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn omitted_arguments_broadcast_grant() {
        let perms = Permissions::new(None, None);
        assert_eq!(perms.grantees, vec![Grantee::AllCurrentMembers]);
        assert_eq!(perms.matrix(2).unwrap(), vec![vec![true], vec![true]]);
        assert_eq!(perms, Permissions::broadcast());
    }

    #[test]
    fn per_field_values_apply_to_all_members() {
        let perms = Permissions::new(
            Some(names(&["bob", "carol"])),
            Some(GrantShape::PerField(vec![true, false])),
        );
        assert_eq!(
            perms.matrix(2).unwrap(),
            vec![vec![true, true], vec![false, false]]
        );
    }

    #[test]
    fn shape_mismatches_rejected() {
        let err = resolve_shape(&GrantShape::PerField(vec![true]), 2, 1).unwrap_err();
        assert_eq!(err.tag(), "invalid_argument");

        let err = resolve_shape(&GrantShape::Matrix(vec![vec![true, false]]), 1, 3).unwrap_err();
        assert_eq!(err.tag(), "invalid_argument");

        let empty = Permissions::new(Some(vec![]), None);
        assert_eq!(empty.matrix(1).unwrap_err().tag(), "invalid_argument");
    }

    #[test]
    fn plan_splits_grants_and_revokes() {
        let fields = names(&["board", "hand"]);
        let columns = vec![names(&["bob"]), names(&["carol"])];
        let matrix = vec![vec![true, false], vec![false, true]];

        let plan = plan(&fields, &columns, &matrix);
        assert_eq!(
            plan.grant,
            vec![Grant::new("board", "bob"), Grant::new("hand", "carol")]
        );
        assert_eq!(
            plan.revoke,
            vec![Grant::new("board", "carol"), Grant::new("hand", "bob")]
        );
    }

    #[test]
    fn broadcast_column_expands_to_members() {
        let fields = names(&["board"]);
        let columns = vec![names(&["alice", "bob", "carol"])];
        let plan = plan(&fields, &columns, &[vec![true]]);
        assert_eq!(plan.grant.len(), 3);
        assert!(plan.revoke.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn matrix_has_requested_dimensions(
            fields in 1usize..8,
            grantees in 1usize..8,
            value in proptest::bool::ANY,
        ) {
            let matrix = resolve_shape(&GrantShape::Single(value), fields, grantees).unwrap();
            proptest::prop_assert_eq!(matrix.len(), fields);
            proptest::prop_assert!(matrix.iter().all(|row| row.len() == grantees));
        }
    }
}
