//! `id_tree` hands out `NodeId`s whose slots get recycled once a node is removed, so they can't serve as
//! long-lived handles. This maps them to never-reused [`NodeID`]s and back.

pub struct LayerNode;
/// Stable, never-reused handle to a node of a [`super::LayerTree`].
pub type NodeID = crate::FuzzID<LayerNode>;

#[derive(Default)]
pub(super) struct StableIDMap {
    to_tree: hashbrown::HashMap<NodeID, id_tree::NodeId>,
    from_tree: hashbrown::HashMap<id_tree::NodeId, NodeID>,
}
impl StableIDMap {
    /// Assign a fresh stable ID to this tree node.
    pub fn insert(&mut self, tree_id: id_tree::NodeId) -> NodeID {
        let id = NodeID::new();
        self.to_tree.insert(id, tree_id.clone());
        self.from_tree.insert(tree_id, id);
        id
    }
    pub fn tree_id(&self, id: NodeID) -> Option<&id_tree::NodeId> {
        self.to_tree.get(&id)
    }
    pub fn stable_id(&self, tree_id: &id_tree::NodeId) -> Option<NodeID> {
        self.from_tree.get(tree_id).copied()
    }
    /// Forget a tree node. Its stable ID will never resolve again.
    pub fn forget(&mut self, tree_id: &id_tree::NodeId) {
        if let Some(id) = self.from_tree.remove(tree_id) {
            self.to_tree.remove(&id);
        }
    }
    pub fn len(&self) -> usize {
        self.to_tree.len()
    }
}
