//! The bidirectional node graph populated during parsing.
//!
//! Five mappings are kept in step: id to AST node, id to context node, id to
//! parent, id to ordered children, and the leaf set. An id lives in exactly
//! one of the two node maps; promotion from context to AST happens atomically
//! when a node closes.

use pq_common::CommonError;

use crate::node::{AstNode, ContextNode, NodeId, NodeKind, XorNode};
use crate::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct NodeIdMap {
    ast_by_id: HashMap<NodeId, AstNode>,
    context_by_id: HashMap<NodeId, ContextNode>,
    parent_by_id: HashMap<NodeId, NodeId>,
    children_by_id: HashMap<NodeId, Vec<NodeId>>,
    leaf_ids: HashSet<NodeId>,
}

static_assertions::assert_impl_all!(NodeIdMap: Send, Sync);

impl NodeIdMap {
    #[must_use]
    pub fn ast_node(&self, id: NodeId) -> Option<&AstNode> {
        self.ast_by_id.get(&id)
    }

    #[must_use]
    pub fn context_node(&self, id: NodeId) -> Option<&ContextNode> {
        self.context_by_id.get(&id)
    }

    #[must_use]
    pub fn xor_node(&self, id: NodeId) -> Option<XorNode> {
        if let Some(ast) = self.ast_by_id.get(&id) {
            return Some(XorNode::Ast(ast.clone()));
        }
        self.context_by_id
            .get(&id)
            .map(|context| XorNode::Context(context.clone()))
    }

    #[must_use]
    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        self.parent_by_id.get(&id).copied()
    }

    #[must_use]
    pub fn parent_xor(&self, id: NodeId) -> Option<XorNode> {
        self.parent_id(id).and_then(|parent| self.xor_node(parent))
    }

    #[must_use]
    pub fn children_ids(&self, id: NodeId) -> &[NodeId] {
        self.children_by_id.get(&id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.leaf_ids.contains(&id)
    }

    #[must_use]
    pub fn leaf_ids(&self) -> &HashSet<NodeId> {
        &self.leaf_ids
    }

    pub fn ast_nodes(&self) -> impl Iterator<Item = &AstNode> {
        self.ast_by_id.values()
    }

    pub fn context_nodes(&self) -> impl Iterator<Item = &ContextNode> {
        self.context_by_id.values()
    }

    /// The child sitting at `attribute_index`, optionally checked against an
    /// expected kind set.
    #[must_use]
    pub fn child_by_attribute_index(
        &self,
        id: NodeId,
        attribute_index: u32,
        expected: Option<&[NodeKind]>,
    ) -> Option<XorNode> {
        let child = self
            .children_ids(id)
            .iter()
            .copied()
            .filter_map(|child_id| self.xor_node(child_id))
            .find(|child| child.attribute_index() == Some(attribute_index))?;

        match expected {
            Some(kinds) if !kinds.contains(&child.kind()) => None,
            _ => Some(child),
        }
    }

    /// The first child of the given kind, in attribute order.
    #[must_use]
    pub fn first_child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<XorNode> {
        self.children_ids(id)
            .iter()
            .copied()
            .filter_map(|child_id| self.xor_node(child_id))
            .find(|child| child.kind() == kind)
    }

    /// The chain from `id` (inclusive) up to the document root.
    #[must_use]
    pub fn ancestry(&self, id: NodeId) -> Vec<XorNode> {
        let mut chain = Vec::new();
        let mut current = self.xor_node(id);

        while let Some(node) = current {
            let next = self.parent_xor(node.id());
            chain.push(node);
            current = next;
        }

        chain
    }

    /// The nearest ancestor (excluding `id` itself) of the given kind.
    #[must_use]
    pub fn ancestor_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<XorNode> {
        let mut current = self.parent_id(id);
        while let Some(ancestor_id) = current {
            let ancestor = self.xor_node(ancestor_id)?;
            if ancestor.kind() == kind {
                return Some(ancestor);
            }
            current = self.parent_id(ancestor_id);
        }
        None
    }

    /// Leftmost leaf under `id`, if the subtree contains any closed leaf.
    #[must_use]
    pub fn leftmost_leaf(&self, id: NodeId) -> Option<AstNode> {
        self.edge_leaf(id, false)
    }

    /// Rightmost leaf under `id`, if the subtree contains any closed leaf.
    #[must_use]
    pub fn rightmost_leaf(&self, id: NodeId) -> Option<AstNode> {
        self.edge_leaf(id, true)
    }

    fn edge_leaf(&self, id: NodeId, rightmost: bool) -> Option<AstNode> {
        if let Some(ast) = self.ast_node(id) {
            if ast.is_leaf() {
                return Some(ast.clone());
            }
        }

        let children = self.children_ids(id);
        let ordered: Box<dyn Iterator<Item = &NodeId>> = if rightmost {
            Box::new(children.iter().rev())
        } else {
            Box::new(children.iter())
        };

        for child in ordered {
            if let Some(leaf) = self.edge_leaf(*child, rightmost) {
                return Some(leaf);
            }
        }
        None
    }

    /// All descendant ids of the given kind, depth first.
    #[must_use]
    pub fn descendant_ids_of_kind(&self, id: NodeId, kind: NodeKind) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children_ids(id).to_vec();

        while let Some(current) = stack.pop() {
            if let Some(node) = self.xor_node(current) {
                if node.kind() == kind {
                    found.push(current);
                }
            }
            stack.extend(self.children_ids(current));
        }

        found
    }

    /// Check the structural invariants the parser promises; used by tests.
    pub fn validate(&self) -> Result<(), CommonError> {
        for id in self.ast_by_id.keys() {
            if self.context_by_id.contains_key(id) {
                return Err(CommonError::invariant(format!(
                    "node {id} is both AST and context"
                )));
            }
        }

        for (parent, children) in &self.children_by_id {
            for (expected_index, child) in children.iter().enumerate() {
                let node = self.xor_node(*child).ok_or_else(|| {
                    CommonError::invariant(format!("child {child} of {parent} is unknown"))
                })?;
                if node.attribute_index() != Some(expected_index as u32) {
                    return Err(CommonError::invariant(format!(
                        "child {child} of {parent} has a sparse attribute index"
                    )));
                }
                if self.parent_id(*child) != Some(*parent) {
                    return Err(CommonError::invariant(format!(
                        "child {child} does not link back to {parent}"
                    )));
                }
            }
        }

        for (id, ast) in &self.ast_by_id {
            if ast.is_leaf() != self.leaf_ids.contains(id) {
                return Err(CommonError::invariant(format!(
                    "leaf set disagrees with node {id}"
                )));
            }
            let range = ast.token_range;
            if range.token_index_start > range.token_index_end
                || range.position_start > range.position_end
            {
                return Err(CommonError::invariant(format!(
                    "node {id} has an inverted token range"
                )));
            }
            if let (Some(first), Some(last)) =
                (self.leftmost_leaf(*id), self.rightmost_leaf(*id))
            {
                if first.token_range.position_start != range.position_start
                    || last.token_range.position_end != range.position_end
                {
                    return Err(CommonError::invariant(format!(
                        "node {id}'s token range is not the union of its leaves"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Mutators, used only while a parse is running.
impl NodeIdMap {
    pub(crate) fn insert_context(&mut self, node: ContextNode, parent: Option<NodeId>) {
        let id = node.id;
        self.context_by_id.insert(id, node);
        if let Some(parent) = parent {
            self.parent_by_id.insert(id, parent);
            self.children_by_id.entry(parent).or_default().push(id);
        }
    }

    /// Atomically replace the context node with its closed AST form.
    pub(crate) fn promote(&mut self, ast: AstNode) {
        let id = ast.id;
        let removed = self.context_by_id.remove(&id);
        debug_assert!(removed.is_some(), "promoting a node that was never opened");
        if ast.is_leaf() {
            self.leaf_ids.insert(id);
        }
        self.ast_by_id.insert(id, ast);
    }

    /// Drop an open context node, re-linking its lone child (if any) into the
    /// vacated slot.
    pub(crate) fn remove_context(&mut self, id: NodeId) -> Option<ContextNode> {
        let removed = self.context_by_id.remove(&id)?;
        let maybe_parent = self.parent_by_id.remove(&id);
        let children = self.children_by_id.remove(&id).unwrap_or_default();
        debug_assert!(children.len() <= 1, "deleting a context with many children");

        match maybe_parent {
            Some(parent) => {
                let siblings = self.children_by_id.entry(parent).or_default();
                if let Some(slot) = siblings.iter().position(|sibling| *sibling == id) {
                    match children.first() {
                        Some(child) => {
                            siblings[slot] = *child;
                            self.parent_by_id.insert(*child, parent);
                        }
                        None => {
                            siblings.remove(slot);
                        }
                    }
                }
            }
            None => {
                if let Some(child) = children.first() {
                    self.parent_by_id.remove(child);
                }
            }
        }

        Some(removed)
    }

    /// Interpose `new_parent` between `child` and its current parent, used
    /// when a left-folded chain grows another link.
    pub(crate) fn interpose(&mut self, child: NodeId, new_parent: NodeId) {
        if let Some(old_parent) = self.parent_by_id.get(&child).copied() {
            if let Some(siblings) = self.children_by_id.get_mut(&old_parent) {
                if let Some(slot) = siblings.iter().position(|sibling| *sibling == child) {
                    siblings[slot] = new_parent;
                }
            }
            self.parent_by_id.insert(new_parent, old_parent);
        }

        self.parent_by_id.insert(child, new_parent);
        self.children_by_id.entry(new_parent).or_default().push(child);
    }

    pub(crate) fn context_node_mut(&mut self, id: NodeId) -> Option<&mut ContextNode> {
        self.context_by_id.get_mut(&id)
    }

    pub(crate) fn set_attribute_index(&mut self, id: NodeId, attribute_index: Option<u32>) {
        if let Some(context) = self.context_by_id.get_mut(&id) {
            context.attribute_index = attribute_index;
        } else if let Some(ast) = self.ast_by_id.get_mut(&id) {
            ast.attribute_index = attribute_index;
        }
    }
}
