//! # Layer tree
//!
//! The layers of an image form a tree. The root is always a group, groups may hold any number of children,
//! and paint layers (which own pixels) are always leaves. Children are ordered top to bottom, index 0 being
//! the topmost.
//!
//! Nodes are addressed by [`NodeID`], which never dangles: once a node is removed its ID simply stops
//! resolving, which is what lets queued work hold on to nodes without owning them.

mod stable_id;

use crate::state::raster::Raster;
use crate::util::{Opacity, Rect};
pub use stable_id::{LayerNode, NodeID};

#[derive(Clone, PartialEq, Debug)]
pub enum NodeKind {
    /// Holds other layers.
    Group,
    /// A leaf with pixel content.
    Paint(Raster),
}

#[derive(Clone, Debug)]
pub struct NodeData {
    name: String,
    kind: NodeKind,
    opacity: Opacity,
    visible: bool,
    /// Area that changed since the renderer last drained it.
    dirty: Option<Rect>,
    /// How many times the projection of this node was regenerated.
    refreshes: u64,
}
impl NodeData {
    fn new(name: String, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            opacity: Opacity::OPAQUE,
            visible: true,
            dirty: None,
            refreshes: 0,
        }
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }
    #[must_use]
    pub fn paint(&self) -> Option<&Raster> {
        match &self.kind {
            NodeKind::Paint(raster) => Some(raster),
            NodeKind::Group => None,
        }
    }
    pub fn paint_mut(&mut self) -> Option<&mut Raster> {
        match &mut self.kind {
            NodeKind::Paint(raster) => Some(raster),
            NodeKind::Group => None,
        }
    }
    #[must_use]
    pub fn opacity(&self) -> Opacity {
        self.opacity
    }
    pub fn set_opacity(&mut self, opacity: Opacity) {
        self.opacity = opacity;
    }
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
    #[must_use]
    pub fn dirty_region(&self) -> Option<Rect> {
        self.dirty
    }
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }
    fn add_dirty(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.dirty = Some(match self.dirty {
            Some(old) => old.union(&rect),
            None => rect,
        });
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError {
    #[error("node not found")]
    TargetNotFound,
    #[error("paint layers can't have children")]
    NotAGroup,
    #[error("operation not allowed on the root")]
    IsRoot,
}

#[derive(Copy, Clone, Debug)]
pub enum Location {
    /// Directly above this sibling, under the same parent.
    Above(NodeID),
    /// Set as the nth child of this group, where top = 0.
    ///
    /// An index too large will be clamped to the bottom position.
    IndexInto(NodeID, usize),
}

/// Node data is individually locked, so jobs on different nodes never wait on each other. The tree lock
/// (held by the image) only guards structure.
type Slot = std::sync::Arc<parking_lot::Mutex<NodeData>>;
/// Exclusive access to one node's data.
pub type NodeGuard<'a> = parking_lot::MutexGuard<'a, NodeData>;

pub struct LayerTree {
    tree: id_tree::Tree<Slot>,
    ids: stable_id::StableIDMap,
    root: NodeID,
}
impl Default for LayerTree {
    fn default() -> Self {
        Self::new()
    }
}
impl LayerTree {
    /// A tree holding only an empty root group.
    #[must_use]
    pub fn new() -> Self {
        let tree = id_tree::TreeBuilder::new()
            .with_root(id_tree::Node::new(Slot::new(
                NodeData::new("root".to_owned(), NodeKind::Group).into(),
            )))
            .build();
        let mut ids = stable_id::StableIDMap::default();
        // Built with a root, can't be None.
        let root_tree_id = tree.root_node_id().cloned();
        let root = ids.insert(root_tree_id.expect("tree built without a root"));
        Self { tree, ids, root }
    }
    #[must_use]
    pub fn root(&self) -> NodeID {
        self.root
    }
    /// Number of live nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        // There's always a root.
        false
    }
    #[must_use]
    pub fn contains(&self, id: NodeID) -> bool {
        self.ids.tree_id(id).is_some()
    }
    fn node(&self, id: NodeID) -> Option<&id_tree::Node<Slot>> {
        self.tree.get(self.ids.tree_id(id)?).ok()
    }
    /// Lock the data of a node.
    #[must_use]
    pub fn get(&self, id: NodeID) -> Option<NodeGuard<'_>> {
        self.node(id).map(|node| node.data().lock())
    }
    /// A shared handle to the node's data, usable after the tree itself is unlocked.
    /// Removing the node from the tree does not invalidate the handle, it just detaches it.
    pub(crate) fn slot(&self, id: NodeID) -> Option<Slot> {
        self.node(id).map(|node| node.data().clone())
    }
    /// The parent of this node, None for the root or unknown nodes.
    #[must_use]
    pub fn parent(&self, id: NodeID) -> Option<NodeID> {
        self.ids.stable_id(self.node(id)?.parent()?)
    }
    /// The children of this node, top to bottom.
    pub fn children(&self, id: NodeID) -> impl Iterator<Item = NodeID> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|node| node.children().iter())
            .filter_map(|child| self.ids.stable_id(child))
    }
    #[must_use]
    pub fn first_child(&self, id: NodeID) -> Option<NodeID> {
        self.children(id).next()
    }
    /// The sibling directly below this one.
    #[must_use]
    pub fn next_sibling(&self, id: NodeID) -> Option<NodeID> {
        let tree_id = self.ids.tree_id(id)?;
        let parent = self.tree.get(tree_id).ok()?.parent()?;
        let siblings = self.tree.get(parent).ok()?.children();
        let idx = siblings.iter().position(|sibling| sibling == tree_id)?;
        self.ids.stable_id(siblings.get(idx + 1)?)
    }
    /// The node and all of its descendants, children before parents.
    #[must_use]
    pub fn post_order(&self, id: NodeID) -> Vec<NodeID> {
        let Some(tree_id) = self.ids.tree_id(id) else {
            return Vec::new();
        };
        self.tree
            .traverse_post_order_ids(tree_id)
            .map(|iter| {
                iter.filter_map(|id| self.ids.stable_id(&id))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    }
    /// Resolve a location to the parent's tree ID and the child index.
    fn find_location(&self, location: Location) -> Result<(id_tree::NodeId, usize), TargetError> {
        match location {
            Location::Above(sibling) => {
                let tree_id = self
                    .ids
                    .tree_id(sibling)
                    .ok_or(TargetError::TargetNotFound)?;
                let node = self
                    .tree
                    .get(tree_id)
                    .map_err(|_| TargetError::TargetNotFound)?;
                let parent = node.parent().ok_or(TargetError::IsRoot)?;
                let idx = self
                    .tree
                    .get(parent)
                    .map_err(|_| TargetError::TargetNotFound)?
                    .children()
                    .iter()
                    .position(|child| child == tree_id)
                    .ok_or(TargetError::TargetNotFound)?;
                Ok((parent.clone(), idx))
            }
            Location::IndexInto(group, idx) => {
                let is_group = self
                    .get(group)
                    .ok_or(TargetError::TargetNotFound)?
                    .is_group();
                if !is_group {
                    return Err(TargetError::NotAGroup);
                }
                // Checked by `get` above.
                let tree_id = self
                    .ids
                    .tree_id(group)
                    .ok_or(TargetError::TargetNotFound)?;
                Ok((tree_id.clone(), idx))
            }
        }
    }
    fn insert(&mut self, location: Location, data: NodeData) -> Result<NodeID, TargetError> {
        let (parent, idx) = self.find_location(location)?;
        let new_node = self
            .tree
            .insert(
                id_tree::Node::new(Slot::new(data.into())),
                id_tree::InsertBehavior::UnderNode(&parent),
            )
            .map_err(|_| TargetError::TargetNotFound)?;
        // Inserted as the last child, so clamping to the last index leaves it there.
        let last = self
            .tree
            .get(&parent)
            .map(|parent| parent.children().len().saturating_sub(1))
            .unwrap_or_default();
        self.tree
            .make_nth_sibling(&new_node, idx.min(last))
            .map_err(|_| TargetError::TargetNotFound)?;
        Ok(self.ids.insert(new_node))
    }
    pub fn add_group(
        &mut self,
        location: Location,
        name: impl Into<String>,
    ) -> Result<NodeID, TargetError> {
        self.insert(location, NodeData::new(name.into(), NodeKind::Group))
    }
    pub fn add_paint_layer(
        &mut self,
        location: Location,
        name: impl Into<String>,
        raster: Raster,
    ) -> Result<NodeID, TargetError> {
        self.insert(location, NodeData::new(name.into(), NodeKind::Paint(raster)))
    }
    /// Remove the node along with all of its descendants. All of their IDs stop resolving.
    pub fn remove(&mut self, id: NodeID) -> Result<NodeData, TargetError> {
        if id == self.root {
            return Err(TargetError::IsRoot);
        }
        let tree_id = self
            .ids
            .tree_id(id)
            .cloned()
            .ok_or(TargetError::TargetNotFound)?;
        let doomed: Vec<id_tree::NodeId> = self
            .tree
            .traverse_post_order_ids(&tree_id)
            .map_err(|_| TargetError::TargetNotFound)?
            .collect();
        let removed = self
            .tree
            .remove_node(tree_id, id_tree::RemoveBehavior::DropChildren)
            .map_err(|_| TargetError::TargetNotFound)?;
        for doomed in &doomed {
            self.ids.forget(doomed);
        }
        let data = removed.data().lock().clone();
        Ok(data)
    }
    /// Mark an area of the node as changed. Parents composite their children, so they are marked too.
    ///
    /// Returns false if the node is unknown.
    pub fn mark_dirty(&self, id: NodeID, rect: Rect) -> bool {
        let mut cursor = Some(id);
        let mut found = false;
        while let Some(current) = cursor {
            let Some(mut data) = self.get(current) else {
                break;
            };
            data.add_dirty(rect);
            found = true;
            drop(data);
            cursor = self.parent(current);
        }
        found
    }
    #[must_use]
    pub fn dirty_region(&self, id: NodeID) -> Option<Rect> {
        self.get(id)?.dirty
    }
    /// Drain the dirty region of a node, as a renderer would after redrawing it.
    pub fn take_dirty(&self, id: NodeID) -> Option<Rect> {
        self.get(id)?.dirty.take()
    }
    /// Regenerate the projections of this subtree. Returns how many nodes were refreshed.
    pub(crate) fn refresh(&self, id: NodeID) -> usize {
        let nodes = self.post_order(id);
        for node in &nodes {
            if let Some(mut data) = self.get(*node) {
                data.refreshes += 1;
            }
        }
        nodes.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// ```ignore
    ///        root
    ///       /    \
    ///      a      b
    ///             |
    ///             c
    /// ```
    fn make_tree() -> (LayerTree, [NodeID; 3]) {
        let mut tree = LayerTree::new();
        let root = tree.root();
        let a = tree
            .add_paint_layer(Location::IndexInto(root, 0), "a", Raster::transparent(2, 2))
            .unwrap();
        let b = tree.add_group(Location::IndexInto(root, 1), "b").unwrap();
        let c = tree
            .add_paint_layer(Location::IndexInto(b, 0), "c", Raster::transparent(2, 2))
            .unwrap();
        (tree, [a, b, c])
    }
    #[test]
    fn navigation() {
        let (tree, [a, b, c]) = make_tree();
        let root = tree.root();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.first_child(root), Some(a));
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.next_sibling(b), None);
        assert_eq!(tree.first_child(b), Some(c));
        assert_eq!(tree.first_child(c), None);
        assert_eq!(tree.parent(c), Some(b));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.post_order(root), vec![a, c, b, root]);
    }
    #[test]
    fn insert_locations() {
        let (mut tree, [a, b, _]) = make_tree();
        let root = tree.root();
        let above_b = tree.add_group(Location::Above(b), "above b").unwrap();
        // Clamped to the bottom.
        let bottom = tree.add_group(Location::IndexInto(root, 100), "bottom").unwrap();
        let top = tree.add_group(Location::IndexInto(root, 0), "top").unwrap();
        assert_eq!(
            tree.children(root).collect::<Vec<_>>(),
            vec![top, a, above_b, b, bottom]
        );
        assert_eq!(
            tree.add_group(Location::IndexInto(a, 0), "nope"),
            Err(TargetError::NotAGroup)
        );
        assert_eq!(
            tree.add_group(Location::Above(root), "nope"),
            Err(TargetError::IsRoot)
        );
    }
    #[test]
    fn removed_ids_go_dead() {
        let (mut tree, [a, b, c]) = make_tree();
        let removed = tree.remove(b).unwrap();
        assert_eq!(removed.name(), "b");
        assert!(!tree.contains(b));
        assert!(!tree.contains(c));
        assert!(tree.get(c).is_none());
        assert_eq!(tree.next_sibling(a), None);
        assert!(!tree.mark_dirty(c, Rect::from_size(1, 1)));
        assert_eq!(tree.remove(b).unwrap_err(), TargetError::TargetNotFound);
        assert_eq!(tree.remove(tree.root()).unwrap_err(), TargetError::IsRoot);

        // New nodes never take over the old IDs.
        let fresh = tree
            .add_group(Location::IndexInto(tree.root(), 0), "fresh")
            .unwrap();
        assert_ne!(fresh, b);
        assert_ne!(fresh, c);
    }
    #[test]
    fn dirty_propagates_up() {
        let (tree, [a, b, c]) = make_tree();
        let root = tree.root();
        assert!(tree.mark_dirty(c, Rect::new(0, 0, 2, 2)));
        assert!(tree.mark_dirty(c, Rect::new(4, 4, 1, 1)));
        assert_eq!(tree.dirty_region(c), Some(Rect::new(0, 0, 5, 5)));
        assert_eq!(tree.dirty_region(b), Some(Rect::new(0, 0, 5, 5)));
        assert_eq!(tree.dirty_region(root), Some(Rect::new(0, 0, 5, 5)));
        assert_eq!(tree.dirty_region(a), None);

        assert_eq!(tree.take_dirty(c), Some(Rect::new(0, 0, 5, 5)));
        assert_eq!(tree.dirty_region(c), None);
    }
    #[test]
    fn refresh_counts_subtree() {
        let (tree, [a, b, c]) = make_tree();
        assert_eq!(tree.refresh(b), 2);
        assert_eq!(tree.get(b).unwrap().refresh_count(), 1);
        assert_eq!(tree.get(c).unwrap().refresh_count(), 1);
        assert_eq!(tree.get(a).unwrap().refresh_count(), 0);
    }
}
