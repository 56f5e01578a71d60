use crate::domain::node::NodeId;
use crate::domain::view::ViewState;
use std::collections::HashSet;

/// Transitive visible children of `root_id`.
///
/// Iterative (explicit work stack) so deep containment trees cannot blow the
/// call stack, and guarded by the result set so a cyclic parent chain still
/// terminates. The root itself is never part of the result. Read-only.
pub fn descendants_of(root_id: &str, view: &ViewState) -> HashSet<NodeId> {
    let mut result: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<&str> = vec![root_id];

    while let Some(current) = stack.pop() {
        for child in view.children_of(current) {
            if child == root_id || result.contains(child) {
                continue;
            }
            result.insert(child.clone());
            stack.push(child);
        }
    }

    result
}

/// Union of `roots` and all of their descendants.
pub fn closure_of<'a>(roots: impl IntoIterator<Item = &'a NodeId>, view: &ViewState) -> HashSet<NodeId> {
    let mut scope = HashSet::new();
    for root in roots {
        scope.extend(descendants_of(root, view));
        scope.insert(root.clone());
    }
    scope
}
