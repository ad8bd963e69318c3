//! Pure operations over `Arc<ConfigNode>` trees.
//!
//! Every function that returns a tree returns the *same* `Arc` when nothing
//! changed, so callers detect no-ops with `Arc::ptr_eq`.

use super::{ConfigNode, NodePatch};
use crate::error::PolicyViolation;
use crate::id::NodeId;
use crate::link::CompositionPolicy;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Depth-first search. Ids are unique, so the first match is the only one.
pub fn find<'a>(root: &'a Arc<ConfigNode>, id: &NodeId) -> Option<&'a Arc<ConfigNode>> {
    if &root.id == id {
        return Some(root);
    }
    root.children.iter().find_map(|c| find(c, id))
}

/// The node that has `id` among its children. `None` for the root or unknown ids.
pub fn find_parent<'a>(root: &'a Arc<ConfigNode>, id: &NodeId) -> Option<&'a Arc<ConfigNode>> {
    if root.children.iter().any(|c| &c.id == id) {
        return Some(root);
    }
    root.children.iter().find_map(|c| find_parent(c, id))
}

/// Shallow-merge `patch` into the node with `id`.
///
/// Unknown ids are a silent no-op: the original tree comes back unchanged.
pub fn update(root: &Arc<ConfigNode>, id: &NodeId, patch: &NodePatch) -> Arc<ConfigNode> {
    map_node(root, id, &mut |n| patch.apply_to(n)).unwrap_or_else(|| Arc::clone(root))
}

/// Remove `id` wherever it occurs as a child, together with its subtree.
///
/// Only children lists are filtered, so removing the root is a no-op.
pub fn remove(root: &Arc<ConfigNode>, id: &NodeId) -> Arc<ConfigNode> {
    remove_child(root, id)
        .map(|(tree, _)| tree)
        .unwrap_or_else(|| Arc::clone(root))
}

/// Append `child` as the last child of `parent_id`, after policy checks.
///
/// The child's subtree is re-leveled under its new parent. Ids in the child
/// subtree must not already exist in the tree.
pub fn attach(
    root: &Arc<ConfigNode>,
    parent_id: &NodeId,
    child: Arc<ConfigNode>,
    policy: &CompositionPolicy,
) -> Result<Arc<ConfigNode>, PolicyViolation> {
    let parent =
        find(root, parent_id).ok_or_else(|| PolicyViolation::UnknownNode(parent_id.clone()))?;
    if child.kind.is_root() {
        return Err(PolicyViolation::SecondRoot(child.id.clone()));
    }
    let existing: BTreeSet<NodeId> = ids(root).into_iter().collect();
    for id in ids(&child) {
        if id.is_empty() {
            return Err(PolicyViolation::EmptyId);
        }
        if existing.contains(&id) {
            return Err(PolicyViolation::DuplicateId(id));
        }
    }
    policy.check(&child, parent)?;

    Ok(append_child(root, parent_id, child))
}

/// Move the subtree at `node_id` to be the last child of `new_parent_id`.
///
/// Rejected without touching the tree if the move would create a cycle, moves
/// the root, or breaks the kind table.
pub fn reparent(
    root: &Arc<ConfigNode>,
    node_id: &NodeId,
    new_parent_id: &NodeId,
    policy: &CompositionPolicy,
) -> Result<Arc<ConfigNode>, PolicyViolation> {
    if &root.id == node_id {
        return Err(PolicyViolation::RootNotMovable(node_id.clone()));
    }
    let node = find(root, node_id).ok_or_else(|| PolicyViolation::UnknownNode(node_id.clone()))?;
    let parent = find(root, new_parent_id)
        .ok_or_else(|| PolicyViolation::UnknownNode(new_parent_id.clone()))?;
    policy.check(node, parent)?;

    let (detached, moved) = remove_child(root, node_id)
        .ok_or_else(|| PolicyViolation::UnknownNode(node_id.clone()))?;
    Ok(append_child(&detached, new_parent_id, moved))
}

/// Recompute `level` top-down starting at `level` for `node`.
///
/// Subtrees whose levels are already right are shared, not copied.
pub fn relevel(node: &Arc<ConfigNode>, level: u32) -> Arc<ConfigNode> {
    let children: Vec<Arc<ConfigNode>> =
        node.children.iter().map(|c| relevel(c, level + 1)).collect();
    let unchanged = node.level == level
        && children
            .iter()
            .zip(&node.children)
            .all(|(a, b)| Arc::ptr_eq(a, b));
    if unchanged {
        return Arc::clone(node);
    }
    let mut copy = (**node).clone();
    copy.level = level;
    copy.children = children;
    Arc::new(copy)
}

/// Change a node's id. References in other nodes' `connections` follow it.
pub fn rename_id(
    root: &Arc<ConfigNode>,
    from: &NodeId,
    to: &NodeId,
) -> Result<Arc<ConfigNode>, PolicyViolation> {
    if to.is_empty() {
        return Err(PolicyViolation::EmptyId);
    }
    if find(root, from).is_none() {
        return Err(PolicyViolation::UnknownNode(from.clone()));
    }
    if from == to {
        return Ok(Arc::clone(root));
    }
    if find(root, to).is_some() {
        return Err(PolicyViolation::DuplicateId(to.clone()));
    }

    let renamed = map_node(root, from, &mut |n| {
        let mut out = n.clone();
        out.id = to.clone();
        out
    })
    .unwrap_or_else(|| Arc::clone(root));

    Ok(map_all(&renamed, &mut |n| {
        let conns = n.connections.as_ref()?;
        if !conns.contains(from) {
            return None;
        }
        let mut out = n.clone();
        out.connections = Some(
            conns
                .iter()
                .map(|c| if c == from { to.clone() } else { c.clone() })
                .collect(),
        );
        Some(out)
    }))
}

/// Drop every reference to `removed` from `connections` lists.
pub fn strip_connections(root: &Arc<ConfigNode>, removed: &BTreeSet<NodeId>) -> Arc<ConfigNode> {
    if removed.is_empty() {
        return Arc::clone(root);
    }
    map_all(root, &mut |n| {
        let conns = n.connections.as_ref()?;
        if !conns.iter().any(|c| removed.contains(c)) {
            return None;
        }
        let mut out = n.clone();
        out.connections = Some(
            conns
                .iter()
                .filter(|c| !removed.contains(*c))
                .cloned()
                .collect(),
        );
        Some(out)
    })
}

/// All ids in pre-order (root first, children in order).
pub fn ids(root: &ConfigNode) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_ids(root, &mut out);
    out
}

/// Ids of `id` and all of its descendants. Empty if `id` is unknown.
pub fn subtree_ids(root: &Arc<ConfigNode>, id: &NodeId) -> Vec<NodeId> {
    find(root, id).map(|n| ids(n)).unwrap_or_default()
}

pub fn node_count(root: &ConfigNode) -> usize {
    1 + root.children.iter().map(|c| node_count(c)).sum::<usize>()
}

/// What `id` depends on: its own `connections` that resolve to a node.
pub fn depends_on(root: &Arc<ConfigNode>, id: &NodeId) -> Vec<NodeId> {
    let Some(node) = find(root, id) else {
        return Vec::new();
    };
    node.connections
        .iter()
        .flatten()
        .filter(|c| find(root, c).is_some())
        .cloned()
        .collect()
}

/// Every node whose `connections` mention `id`, in pre-order.
pub fn required_by(root: &Arc<ConfigNode>, id: &NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    walk(root, &mut |n| {
        if n.connections.iter().flatten().any(|c| c == id) {
            out.push(n.id.clone());
        }
    });
    out
}

fn collect_ids(node: &ConfigNode, out: &mut Vec<NodeId>) {
    out.push(node.id.clone());
    for child in &node.children {
        collect_ids(child, out);
    }
}

fn walk<F: FnMut(&ConfigNode)>(node: &ConfigNode, f: &mut F) {
    f(node);
    for child in &node.children {
        walk(child, f);
    }
}

/// Rebuild the path to `id`, replacing that node with `f(node)`.
fn map_node<F>(node: &Arc<ConfigNode>, id: &NodeId, f: &mut F) -> Option<Arc<ConfigNode>>
where
    F: FnMut(&ConfigNode) -> ConfigNode,
{
    if &node.id == id {
        return Some(Arc::new(f(node)));
    }
    for (idx, child) in node.children.iter().enumerate() {
        if let Some(new_child) = map_node(child, id, f) {
            let mut copy = (**node).clone();
            copy.children[idx] = new_child;
            return Some(Arc::new(copy));
        }
    }
    None
}

/// Apply `f` to every node; `f` returns `None` to keep a node as is.
fn map_all<F>(node: &Arc<ConfigNode>, f: &mut F) -> Arc<ConfigNode>
where
    F: FnMut(&ConfigNode) -> Option<ConfigNode>,
{
    let children: Vec<Arc<ConfigNode>> = node.children.iter().map(|c| map_all(c, f)).collect();
    let children_same = children
        .iter()
        .zip(&node.children)
        .all(|(a, b)| Arc::ptr_eq(a, b));

    match f(node) {
        Some(mut replaced) => {
            replaced.children = children;
            Arc::new(replaced)
        }
        None if children_same => Arc::clone(node),
        None => {
            let mut copy = (**node).clone();
            copy.children = children;
            Arc::new(copy)
        }
    }
}

/// Detach the child `id`; returns the new tree and the detached subtree.
fn remove_child(
    node: &Arc<ConfigNode>,
    id: &NodeId,
) -> Option<(Arc<ConfigNode>, Arc<ConfigNode>)> {
    if let Some(idx) = node.children.iter().position(|c| &c.id == id) {
        let mut copy = (**node).clone();
        let removed = copy.children.remove(idx);
        return Some((Arc::new(copy), removed));
    }
    for (idx, child) in node.children.iter().enumerate() {
        if let Some((new_child, removed)) = remove_child(child, id) {
            let mut copy = (**node).clone();
            copy.children[idx] = new_child;
            return Some((Arc::new(copy), removed));
        }
    }
    None
}

fn append_child(
    root: &Arc<ConfigNode>,
    parent_id: &NodeId,
    child: Arc<ConfigNode>,
) -> Arc<ConfigNode> {
    let mut child = Some(child);
    map_node(root, parent_id, &mut |parent| {
        let mut copy = parent.clone();
        if let Some(child) = child.take() {
            copy.children.push(relevel(&child, parent.level + 1));
        }
        copy
    })
    .unwrap_or_else(|| Arc::clone(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;
    use pretty_assertions::assert_eq;

    /// main
    /// ├── env (injector)
    /// │   ├── path (partial)
    /// │   └── tools (injector)
    /// │       └── fzf (partial)
    /// └── aliases (injector)
    fn sample() -> Arc<ConfigNode> {
        let fzf = ConfigNode::new("fzf", NodeKind::Partial, "fzf", "source fzf.zsh");
        let tools = ConfigNode::new("tools", NodeKind::Injector, "tools", "").with_children(vec![fzf]);
        let path = ConfigNode::new("path", NodeKind::Partial, "path", "export PATH");
        let env =
            ConfigNode::new("env", NodeKind::Injector, "env", "").with_children(vec![path, tools]);
        let aliases = ConfigNode::new("aliases", NodeKind::Injector, "aliases", "")
            .with_connections(vec!["path".into()]);
        let root = ConfigNode::main_root().with_children(vec![env, aliases]);
        relevel(&Arc::new(root), 0)
    }

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn levels(root: &Arc<ConfigNode>) -> Vec<(String, u32)> {
        let mut out = Vec::new();
        walk(root, &mut |n| out.push((n.id.to_string(), n.level)));
        out
    }

    #[test]
    fn find_and_parent() {
        let tree = sample();
        assert_eq!(find(&tree, &id("fzf")).map(|n| n.title.as_str()), Some("fzf"));
        assert!(find(&tree, &id("nope")).is_none());
        assert_eq!(find_parent(&tree, &id("fzf")).map(|n| n.id.clone()), Some(id("tools")));
        assert!(find_parent(&tree, &id("main")).is_none());
    }

    #[test]
    fn update_shares_untouched_subtrees() {
        let tree = sample();
        let updated = update(&tree, &id("fzf"), &NodePatch::content("eval \"$(fzf --zsh)\""));

        assert!(!Arc::ptr_eq(&tree, &updated));
        // aliases is off the path to fzf
        assert!(Arc::ptr_eq(&tree.children[1], &updated.children[1]));
        // path is a sibling of the path
        assert!(Arc::ptr_eq(&tree.children[0].children[0], &updated.children[0].children[0]));
        assert_eq!(
            find(&updated, &id("fzf")).map(|n| n.content.as_str()),
            Some("eval \"$(fzf --zsh)\"")
        );
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let tree = sample();
        let same = update(&tree, &id("ghost"), &NodePatch::title("x"));
        assert!(Arc::ptr_eq(&tree, &same));
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let tree = sample();
        let pruned = remove(&tree, &id("env"));
        assert_eq!(ids(&pruned), vec![id("main"), id("aliases")]);
    }

    #[test]
    fn remove_root_is_noop() {
        let tree = sample();
        assert!(Arc::ptr_eq(&tree, &remove(&tree, &id("main"))));
    }

    #[test]
    fn reparent_moves_and_relevels() {
        let tree = sample();
        let policy = CompositionPolicy::default();
        let moved = reparent(&tree, &id("tools"), &id("main"), &policy).unwrap();

        assert_eq!(
            ids(&moved),
            vec![id("main"), id("env"), id("path"), id("aliases"), id("tools"), id("fzf")]
        );
        assert_eq!(find(&moved, &id("tools")).map(|n| n.level), Some(1));
        assert_eq!(find(&moved, &id("fzf")).map(|n| n.level), Some(2));
    }

    #[test]
    fn reparent_into_own_descendant_is_rejected() {
        let tree = sample();
        let policy = CompositionPolicy::default();
        let err = reparent(&tree, &id("env"), &id("tools"), &policy).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::Cycle {
                node: id("env"),
                parent: id("tools")
            }
        );
        let err = reparent(&tree, &id("env"), &id("env"), &policy).unwrap_err();
        assert!(matches!(err, PolicyViolation::Cycle { .. }));
    }

    #[test]
    fn reparent_partial_under_main_is_rejected() {
        let tree = sample();
        let err = reparent(&tree, &id("path"), &id("main"), &CompositionPolicy::default())
            .unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::IncompatibleKinds {
                child: NodeKind::Partial,
                parent: NodeKind::Main
            }
        );
    }

    #[test]
    fn reparent_root_is_rejected() {
        let tree = sample();
        let err = reparent(&tree, &id("main"), &id("env"), &CompositionPolicy::default())
            .unwrap_err();
        assert_eq!(err, PolicyViolation::RootNotMovable(id("main")));
    }

    #[test]
    fn attach_rejects_duplicates_and_second_roots() {
        let tree = sample();
        let policy = CompositionPolicy::default();

        let dup = Arc::new(ConfigNode::new("path", NodeKind::Partial, "dup", ""));
        assert_eq!(
            attach(&tree, &id("env"), dup, &policy).unwrap_err(),
            PolicyViolation::DuplicateId(id("path"))
        );

        let root = Arc::new(ConfigNode::new("bash", NodeKind::Bash, ".bashrc", ""));
        assert_eq!(
            attach(&tree, &id("env"), root, &policy).unwrap_err(),
            PolicyViolation::SecondRoot(id("bash"))
        );
    }

    #[test]
    fn attach_sets_levels() {
        let tree = sample();
        let node = Arc::new(ConfigNode::new("git", NodeKind::Partial, "git", ""));
        let tree = attach(&tree, &id("tools"), node, &CompositionPolicy::default()).unwrap();
        assert_eq!(find(&tree, &id("git")).map(|n| n.level), Some(3));
        assert_eq!(find_parent(&tree, &id("git")).map(|n| n.id.clone()), Some(id("tools")));
    }

    #[test]
    fn relevel_fixes_stale_levels() {
        let mut bad = ConfigNode::new("inj", NodeKind::Injector, "inj", "");
        bad.level = 7;
        let root = Arc::new(ConfigNode::main_root().with_children(vec![bad]));
        let fixed = relevel(&root, 0);
        assert_eq!(levels(&fixed), vec![("main".into(), 0), ("inj".into(), 1)]);

        let again = relevel(&fixed, 0);
        assert!(Arc::ptr_eq(&fixed, &again));
    }

    #[test]
    fn rename_id_follows_connections() {
        let tree = sample();
        let renamed = rename_id(&tree, &id("path"), &id("path-setup")).unwrap();
        assert!(find(&renamed, &id("path")).is_none());
        assert!(find(&renamed, &id("path-setup")).is_some());
        assert_eq!(depends_on(&renamed, &id("aliases")), vec![id("path-setup")]);

        assert_eq!(
            rename_id(&tree, &id("path"), &id("fzf")).unwrap_err(),
            PolicyViolation::DuplicateId(id("fzf"))
        );
        assert_eq!(
            rename_id(&tree, &id("path"), &id(" ")).unwrap_err(),
            PolicyViolation::EmptyId
        );
    }

    #[test]
    fn strip_connections_only_copies_referrers() {
        let tree = sample();
        let removed: BTreeSet<NodeId> = [id("path")].into_iter().collect();
        let stripped = strip_connections(&tree, &removed);
        assert_eq!(
            find(&stripped, &id("aliases")).and_then(|n| n.connections.clone()),
            Some(vec![])
        );
        assert!(Arc::ptr_eq(&tree.children[0], &stripped.children[0]));
    }

    #[test]
    fn dependency_views() {
        let tree = sample();
        assert_eq!(depends_on(&tree, &id("aliases")), vec![id("path")]);
        assert_eq!(required_by(&tree, &id("path")), vec![id("aliases")]);
        assert!(required_by(&tree, &id("fzf")).is_empty());
    }

    #[test]
    fn counts_and_subtrees() {
        let tree = sample();
        assert_eq!(node_count(&tree), 6);
        assert_eq!(subtree_ids(&tree, &id("tools")), vec![id("tools"), id("fzf")]);
        assert!(subtree_ids(&tree, &id("nope")).is_empty());
    }
}
