//! # Undo history
//!
//! A tree of batches, where undos create branches. The present is a cursor into the tree: undoing steps it
//! up to the parent, redoing steps down into the most recent child. Pushing a new batch after an undo
//! starts a new branch without discarding the old one.

use crate::queue::Executed;

/// The executed work of one finished stroke.
#[derive(Clone, Debug)]
pub struct Batch {
    name: String,
    steps: Vec<Executed>,
}
impl Batch {
    #[must_use]
    pub fn new(name: String, steps: Vec<Executed>) -> Self {
        Self { name, steps }
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Steps in the order they executed.
    #[must_use]
    pub fn steps(&self) -> &[Executed] {
        &self.steps
    }
}

pub struct History {
    /// Root holds no batch, it's the state before anything happened.
    tree: slab_tree::Tree<Option<Batch>>,
    present: slab_tree::NodeId,
}
impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
impl History {
    #[must_use]
    pub fn new() -> Self {
        let tree = slab_tree::TreeBuilder::new().with_root(None).build();
        // Built with a root, can't be None.
        let present = tree.root_id().expect("history built without a root");
        Self { tree, present }
    }
    /// Record a batch as the new present.
    pub fn push(&mut self, batch: Batch) {
        log::trace!("recording \"{}\"", batch.name());
        // The cursor never points at a removed node, nothing is ever removed.
        if let Some(mut present) = self.tree.get_mut(self.present) {
            self.present = present.append(Some(batch)).node_id();
        }
    }
    /// Step back, returning the batch to take back.
    pub fn undo(&mut self) -> Option<Batch> {
        let present = self.tree.get(self.present)?;
        let batch = present.data().clone()?;
        self.present = present.parent()?.node_id();
        Some(batch)
    }
    /// Step forward along the most recent branch, returning the batch to apply again.
    pub fn redo(&mut self) -> Option<Batch> {
        let present = self.tree.get(self.present)?;
        let next = present.last_child()?;
        let batch = next.data().clone()?;
        self.present = next.node_id();
        Some(batch)
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.tree
            .get(self.present)
            .is_some_and(|present| present.data().is_some())
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.tree
            .get(self.present)
            .is_some_and(|present| present.last_child().is_some())
    }
    /// Name of the batch the present sits on, None at the very start.
    #[must_use]
    pub fn present_name(&self) -> Option<&str> {
        self.tree
            .get(self.present)?
            .data()
            .as_ref()
            .map(Batch::name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn batch(name: &str) -> Batch {
        Batch::new(name.to_owned(), Vec::new())
    }
    #[test]
    fn undo_redo_walk() {
        let mut history = History::new();
        assert!(!history.can_undo());
        assert!(history.undo().is_none());

        history.push(batch("a"));
        history.push(batch("b"));
        assert_eq!(history.present_name(), Some("b"));
        assert_eq!(history.undo().unwrap().name(), "b");
        assert_eq!(history.undo().unwrap().name(), "a");
        assert!(!history.can_undo());
        assert_eq!(history.present_name(), None);

        assert_eq!(history.redo().unwrap().name(), "a");
        assert_eq!(history.redo().unwrap().name(), "b");
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }
    #[test]
    fn new_work_branches() {
        let mut history = History::new();
        history.push(batch("a"));
        history.push(batch("b"));
        history.undo();
        history.push(batch("c"));
        // Redo from "a" now follows "c", but "b" is still in there.
        history.undo();
        assert_eq!(history.present_name(), Some("a"));
        assert_eq!(history.redo().unwrap().name(), "c");
        let root = history.tree.root().unwrap();
        let a = root.first_child().unwrap();
        let branches: Vec<_> = a
            .children()
            .filter_map(|child| child.data().as_ref().map(|batch| batch.name().to_owned()))
            .collect();
        assert_eq!(branches, ["b", "c"]);
    }
}
