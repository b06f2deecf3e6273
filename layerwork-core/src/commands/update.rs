//! Brackets a batch of edits so the canvas gets refreshed exactly once on whichever edge of the batch
//! is current.
//!
//! A batch opens with a [`UpdateRole::Leading`] command and closes with a [`UpdateRole::Trailing`] one.
//! Applying the batch forward, the trailing command is the last to run and does the refresh. Taking it back,
//! the commands run in reverse and it's the leading command's turn. Each command is therefore inert in one
//! direction.

use std::sync::{Arc, Weak};

use super::{CommandError, Reversible};
use crate::image::Image;
use crate::state::NodeID;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum UpdateRole {
    /// First job of a batch. Refreshes when undone.
    Leading,
    /// Last job of a batch. Refreshes when done.
    Trailing,
}

#[derive(Clone, Debug)]
pub struct UpdateCommand {
    image: Weak<Image>,
    node: NodeID,
    recursive: bool,
    role: UpdateRole,
}
impl UpdateCommand {
    #[must_use]
    pub fn new(image: &Arc<Image>, node: NodeID, recursive: bool, role: UpdateRole) -> Self {
        Self {
            image: Arc::downgrade(image),
            node,
            recursive,
            role,
        }
    }
    #[must_use]
    pub fn node(&self) -> NodeID {
        self.node
    }
    #[must_use]
    pub fn role(&self) -> UpdateRole {
        self.role
    }
    #[must_use]
    pub fn recursive(&self) -> bool {
        self.recursive
    }
    fn update(&self) {
        let Some(image) = self.image.upgrade() else {
            log::debug!("image gone, skipping update of {}", self.node);
            return;
        };
        if !image.contains(self.node) {
            log::debug!("{} was removed, skipping update", self.node);
            return;
        }
        // Queued behind us, not awaited.
        if self.recursive {
            image.refresh_graph_async(self.node);
        }
        image.mark_dirty(self.node, image.bounds());
    }
}
impl Reversible for UpdateCommand {
    fn redo(&self) -> Result<(), CommandError> {
        if self.role == UpdateRole::Trailing {
            self.update();
        }
        Ok(())
    }
    fn undo(&self) -> Result<(), CommandError> {
        if self.role == UpdateRole::Leading {
            self.update();
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::events::ImageEvent;
    use crate::state::{Location, Raster};
    use crate::util::Rect;
    use std::time::Duration;

    fn setup() -> (Arc<Image>, NodeID, NodeID) {
        let image = Image::new(Rect::from_size(16, 16)).unwrap();
        let (group, layer) = image.edit_tree(|tree| {
            let group = tree
                .add_group(Location::IndexInto(tree.root(), 0), "group")
                .unwrap();
            let layer = tree
                .add_paint_layer(
                    Location::IndexInto(group, 0),
                    "layer",
                    Raster::transparent(16, 16),
                )
                .unwrap();
            (group, layer)
        });
        (image, group, layer)
    }
    fn dirty_events(events: &crossbeam::channel::Receiver<ImageEvent>) -> Vec<NodeID> {
        events
            .try_iter()
            .filter_map(|event| match event {
                ImageEvent::Dirty { node, .. } => Some(node),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn leading_refreshes_only_on_undo() {
        let (image, group, _) = setup();
        let events = image.subscribe();
        let leading = UpdateCommand::new(&image, group, false, UpdateRole::Leading);

        leading.redo().unwrap();
        assert!(dirty_events(&events).is_empty());
        assert_eq!(image.tree().dirty_region(group), None);

        leading.undo().unwrap();
        assert_eq!(dirty_events(&events), vec![group]);
        assert_eq!(image.tree().dirty_region(group), Some(image.bounds()));
    }
    #[test]
    fn trailing_refreshes_only_on_redo() {
        let (image, group, _) = setup();
        let events = image.subscribe();
        let trailing = UpdateCommand::new(&image, group, false, UpdateRole::Trailing);

        trailing.undo().unwrap();
        assert!(dirty_events(&events).is_empty());
        assert_eq!(image.tree().dirty_region(group), None);

        trailing.redo().unwrap();
        assert_eq!(dirty_events(&events), vec![group]);
        assert_eq!(image.tree().dirty_region(group), Some(image.bounds()));
    }
    #[test]
    fn recursive_schedules_subtree_refresh() {
        let (image, group, layer) = setup();
        let trailing = UpdateCommand::new(&image, group, true, UpdateRole::Trailing);
        trailing.redo().unwrap();
        assert!(image.wait_for_done_timeout(Duration::from_secs(5)));

        let tree = image.tree();
        assert_eq!(tree.get(group).unwrap().refresh_count(), 1);
        assert_eq!(tree.get(layer).unwrap().refresh_count(), 1);
        assert_eq!(tree.get(tree.root()).unwrap().refresh_count(), 0);
    }
    #[test]
    fn non_recursive_never_refreshes() {
        let (image, group, layer) = setup();
        let leading = UpdateCommand::new(&image, group, false, UpdateRole::Leading);
        leading.undo().unwrap();
        assert!(image.wait_for_done_timeout(Duration::from_secs(5)));
        assert_eq!(image.tree().get(layer).unwrap().refresh_count(), 0);
    }
    #[test]
    fn dead_handles_are_skipped() {
        let (image, group, layer) = setup();
        let events = image.subscribe();
        let removed = UpdateCommand::new(&image, layer, true, UpdateRole::Trailing);
        image.edit_tree(|tree| tree.remove(layer)).unwrap();
        removed.redo().unwrap();
        assert!(dirty_events(&events).is_empty());

        let orphaned = UpdateCommand::new(&image, group, true, UpdateRole::Trailing);
        drop(image);
        // Nothing to do, and nothing to crash on.
        orphaned.redo().unwrap();
    }
}
