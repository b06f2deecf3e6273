use std::sync::{Arc, Weak};

use super::{CommandError, Reversible};
use crate::image::Image;
use crate::state::NodeID;
use crate::visitor::{ProcessingVisitor, VisitContext, VisitError};

/// Runs a visitor against one node. Undoing asks the visitor to revert its visit.
#[derive(Clone)]
pub struct ProcessingCommand {
    visitor: Arc<dyn ProcessingVisitor>,
    image: Weak<Image>,
    node: NodeID,
}
impl std::fmt::Debug for ProcessingCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingCommand")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
impl ProcessingCommand {
    #[must_use]
    pub fn new(image: &Arc<Image>, visitor: Arc<dyn ProcessingVisitor>, node: NodeID) -> Self {
        Self {
            visitor,
            image: Arc::downgrade(image),
            node,
        }
    }
    #[must_use]
    pub fn node(&self) -> NodeID {
        self.node
    }
    #[must_use]
    pub fn visitor(&self) -> &Arc<dyn ProcessingVisitor> {
        &self.visitor
    }
    fn with_node(
        &self,
        f: impl FnOnce(&mut crate::state::NodeData, &VisitContext) -> Result<(), VisitError>,
    ) -> Result<(), CommandError> {
        let Some(image) = self.image.upgrade() else {
            log::debug!("image gone, skipping visit of {}", self.node);
            return Ok(());
        };
        // The tree lock is released here, only the node stays locked while visiting.
        let slot = image.tree().slot(self.node);
        let Some(slot) = slot else {
            log::debug!("{} was removed, skipping visit", self.node);
            return Ok(());
        };
        let cx = VisitContext {
            image_bounds: image.bounds(),
        };
        let mut data = slot.lock();
        f(&mut data, &cx).map_err(|source| CommandError::Visit {
            node: self.node,
            source,
        })
    }
}
impl Reversible for ProcessingCommand {
    fn redo(&self) -> Result<(), CommandError> {
        self.with_node(|data, cx| self.visitor.visit(self.node, data, cx))
    }
    fn undo(&self) -> Result<(), CommandError> {
        self.with_node(|data, cx| self.visitor.revert(self.node, data, cx))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::{Location, NodeData};
    use crate::util::{Opacity, Rect};
    use crate::visitor::OpacityVisitor;

    #[test]
    fn visit_and_revert_through_image() {
        let image = Image::new(Rect::from_size(8, 8)).unwrap();
        let group = image.edit_tree(|tree| {
            tree.add_group(Location::IndexInto(tree.root(), 0), "group")
                .unwrap()
        });
        let half = Opacity::new(0.5).unwrap();
        let command = ProcessingCommand::new(&image, Arc::new(OpacityVisitor::new(half)), group);

        command.redo().unwrap();
        assert_eq!(image.tree().get(group).unwrap().opacity(), half);
        command.undo().unwrap();
        assert_eq!(
            image.tree().get(group).unwrap().opacity(),
            Opacity::OPAQUE
        );
    }
    #[test]
    fn failures_name_the_node() {
        let image = Image::new(Rect::from_size(8, 8)).unwrap();
        let root = image.tree().root();
        let failing = |_: NodeID, _: &mut NodeData, _: &VisitContext| -> Result<(), VisitError> {
            Err(VisitError::Failed("boom".to_owned()))
        };
        let command = ProcessingCommand::new(&image, Arc::new(failing), root);
        assert_eq!(
            command.redo(),
            Err(CommandError::Visit {
                node: root,
                source: VisitError::Failed("boom".to_owned()),
            })
        );
        // Closures have nothing to revert.
        assert_eq!(command.undo(), Ok(()));
    }
    #[test]
    fn dead_nodes_are_skipped() {
        let image = Image::new(Rect::from_size(8, 8)).unwrap();
        let group = image.edit_tree(|tree| {
            tree.add_group(Location::IndexInto(tree.root(), 0), "group")
                .unwrap()
        });
        let panicking = |_: NodeID, _: &mut NodeData, _: &VisitContext| -> Result<(), VisitError> {
            unreachable!("visited a removed node")
        };
        let command = ProcessingCommand::new(&image, Arc::new(panicking), group);
        image.edit_tree(|tree| tree.remove(group)).unwrap();
        assert_eq!(command.redo(), Ok(()));
        drop(image);
        assert_eq!(command.redo(), Ok(()));
    }
}
