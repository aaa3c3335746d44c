//! Piping tree reconstruction.

use std::collections::{BTreeMap, HashSet, VecDeque};

use super::model::{Piping, PipingId};
use crate::errors::TemplateError;

/// A node of a [`PipingTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// The piping.
    pub piping: Piping,
    /// Children, in the order they were found.
    pub child_ids: Vec<PipingId>,
}

/// A pipeline's pipings arranged as a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipingTree {
    root_id: PipingId,
    nodes: BTreeMap<PipingId, TreeNode>,
}

impl PipingTree {
    /// Returns the root piping id.
    #[must_use]
    pub fn root_id(&self) -> PipingId {
        self.root_id
    }

    /// Returns a node.
    #[must_use]
    pub fn get(&self, id: PipingId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    /// Returns the children of a piping.
    #[must_use]
    pub fn children(&self, id: PipingId) -> &[PipingId] {
        self.nodes.get(&id).map_or(&[], |n| n.child_ids.as_slice())
    }

    /// Returns the number of pipings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no pipings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns every piping id breadth-first from the root.
    #[must_use]
    pub fn breadth_first(&self) -> Vec<PipingId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([self.root_id]);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(self.children(id).iter().copied());
        }
        order
    }
}

/// Arranges a flat collection of pipings into a tree.
///
/// The input may be in any order. Fails with [`TemplateError::Malformed`]
/// unless the pipings form exactly one tree: unique ids, a single root,
/// every `previous` present, and every piping reachable from the root.
pub fn build_tree(pipeline: &str, pipings: &[Piping]) -> Result<PipingTree, TemplateError> {
    let mut nodes: BTreeMap<PipingId, TreeNode> = BTreeMap::new();
    for piping in pipings {
        let node = TreeNode {
            piping: piping.clone(),
            child_ids: Vec::new(),
        };
        if nodes.insert(piping.id, node).is_some() {
            return Err(TemplateError::malformed(
                pipeline,
                format!("piping id {} appears more than once", piping.id),
            ));
        }
    }

    let roots: Vec<PipingId> = pipings
        .iter()
        .filter(|p| p.previous.is_none())
        .map(|p| p.id)
        .collect();
    let root_id = match roots.as_slice() {
        [root] => *root,
        [] => return Err(TemplateError::malformed(pipeline, "no root piping")),
        _ => {
            return Err(TemplateError::malformed(
                pipeline,
                format!("{} root pipings", roots.len()),
            ))
        }
    };

    for piping in pipings {
        let Some(parent) = piping.previous else { continue };
        match nodes.get_mut(&parent) {
            Some(node) => node.child_ids.push(piping.id),
            None => {
                return Err(TemplateError::malformed(
                    pipeline,
                    format!("piping {} points to unknown previous piping {parent}", piping.id),
                ))
            }
        }
    }

    // A cycle detached from the root leaves pipings unreachable.
    let mut seen: HashSet<PipingId> = HashSet::with_capacity(nodes.len());
    let mut queue = VecDeque::from([root_id]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(node) = nodes.get(&id) {
            queue.extend(node.child_ids.iter().copied());
        }
    }
    if seen.len() != nodes.len() {
        return Err(TemplateError::malformed(
            pipeline,
            format!(
                "{} pipings are not connected to the root",
                nodes.len() - seen.len()
            ),
        ));
    }

    Ok(PipingTree { root_id, nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample() -> Vec<Piping> {
        vec![
            Piping::new(1, "root", 1, None),
            Piping::new(2, "a", 2, Some(1)),
            Piping::new(3, "b", 2, Some(1)),
            Piping::new(4, "c", 2, Some(2)),
            Piping::new(5, "d", 3, Some(4)),
        ]
    }

    fn shape(tree: &PipingTree) -> BTreeMap<PipingId, BTreeSet<PipingId>> {
        tree.nodes
            .iter()
            .map(|(id, node)| (*id, node.child_ids.iter().copied().collect()))
            .collect()
    }

    #[test]
    fn test_build_tree() {
        let tree = build_tree("p", &sample()).unwrap();

        assert_eq!(tree.root_id(), 1);
        assert_eq!(tree.children(1), &[2, 3]);
        assert_eq!(tree.children(4), &[5]);
        assert!(tree.children(5).is_empty());
        assert_eq!(tree.breadth_first(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_build_tree_any_order() {
        let expected = shape(&build_tree("p", &sample()).unwrap());

        let mut pipings = sample();
        pipings.reverse();
        assert_eq!(shape(&build_tree("p", &pipings).unwrap()), expected);

        pipings.rotate_left(2);
        let tree = build_tree("p", &pipings).unwrap();
        assert_eq!(tree.root_id(), 1);
        assert_eq!(shape(&tree), expected);
    }

    #[test]
    fn test_root_count_is_checked() {
        let mut pipings = sample();
        pipings.push(Piping::new(6, "other root", 1, None));
        assert!(matches!(build_tree("p", &pipings), Err(TemplateError::Malformed { .. })));

        let headless: Vec<_> = sample().into_iter().filter(|p| p.id != 1).collect();
        assert!(build_tree("p", &headless).is_err());
    }

    #[test]
    fn test_detached_cycle_is_malformed() {
        let mut pipings = sample();
        pipings.push(Piping::new(6, "x", 2, Some(7)));
        pipings.push(Piping::new(7, "y", 2, Some(6)));

        let err = build_tree("p", &pipings).unwrap_err();
        assert!(err.to_string().contains("not connected"));
    }

    #[test]
    fn test_unknown_previous_and_duplicates() {
        let mut pipings = sample();
        pipings.push(Piping::new(6, "x", 2, Some(42)));
        assert!(build_tree("p", &pipings).is_err());

        let mut pipings = sample();
        pipings.push(Piping::new(2, "dup", 2, Some(1)));
        assert!(build_tree("p", &pipings).is_err());
    }
}
