//! Parent-before-child ordering of an account's permissions.

use statemig_models::name::Name;
use statemig_models::permission::PermissionObject;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Order `nodes` breadth first from the roots so that every permission comes
/// after its parent.
///
/// Nodes whose parent is not in `nodes` (and their descendants) are dropped
/// and logged.
pub fn sort_permissions(nodes: Vec<PermissionObject>) -> Vec<PermissionObject> {
    let mut children: HashMap<(Name, Name), Vec<usize>> = HashMap::new();
    let mut queue = VecDeque::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.is_root() {
            queue.push_back(i);
        } else {
            children.entry((node.owner, node.parent)).or_default().push(i);
        }
    }

    let mut emitted = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = queue.pop_front() {
        if std::mem::replace(&mut emitted[i], true) {
            continue;
        }
        order.push(i);
        if let Some(kids) = children.get(&(nodes[i].owner, nodes[i].name)) {
            queue.extend(kids.iter().copied());
        }
    }

    for (node, _) in nodes.iter().zip(&emitted).filter(|(_, emitted)| !**emitted) {
        warn!(
            "dropping permission {}@{}: parent {} is not exported",
            node.owner, node.name, node.parent
        );
    }

    let mut slots: Vec<Option<PermissionObject>> = nodes.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use statemig_models::permission::Authority;
    use std::str::FromStr;

    fn perm(owner: &str, name: &str, parent: &str) -> PermissionObject {
        PermissionObject {
            owner: Name::from_str(owner).unwrap(),
            name: Name::from_str(name).unwrap(),
            parent: Name::from_str(parent).unwrap(),
            authority: Authority {
                threshold: 1,
                keys: vec![],
                accounts: vec![],
                waits: vec![],
            },
        }
    }

    fn names(nodes: &[PermissionObject]) -> Vec<String> {
        nodes.iter().map(|n| n.name.to_string()).collect()
    }

    #[test]
    fn test_chain_is_ordered() {
        let sorted = sort_permissions(vec![
            perm("alice", "claimer", "active"),
            perm("alice", "active", "owner"),
            perm("alice", "owner", ""),
        ]);
        assert_eq!(names(&sorted), vec!["owner", "active", "claimer"]);
    }

    #[test]
    fn test_breadth_first_keeps_input_order_among_siblings() {
        let sorted = sort_permissions(vec![
            perm("alice", "owner", ""),
            perm("alice", "deep", "b"),
            perm("alice", "b", "active"),
            perm("alice", "active", "owner"),
            perm("alice", "a", "owner"),
        ]);
        assert_eq!(names(&sorted), vec!["owner", "active", "a", "b", "deep"]);
        for (i, node) in sorted.iter().enumerate() {
            if !node.is_root() {
                assert!(sorted[..i].iter().any(|p| p.name == node.parent));
            }
        }
    }

    #[test]
    fn test_dangling_children_are_dropped() {
        let sorted = sort_permissions(vec![
            perm("alice", "owner", ""),
            perm("alice", "orphan", "ghost"),
            perm("alice", "grandchild", "orphan"),
            perm("alice", "active", "owner"),
        ]);
        assert_eq!(names(&sorted), vec!["owner", "active"]);
    }

    #[test]
    fn test_same_names_under_different_owners() {
        let sorted = sort_permissions(vec![
            perm("bob", "active", "owner"),
            perm("alice", "owner", ""),
            perm("bob", "owner", ""),
        ]);
        assert_eq!(sorted.len(), 3);
        assert_eq!(sorted[2].owner, Name::from_str("bob").unwrap());
        assert_eq!(sorted[2].name, Name::from_str("active").unwrap());
    }
}
