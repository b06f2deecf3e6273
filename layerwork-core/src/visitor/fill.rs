use super::{ProcessingVisitor, VisitContext, VisitError};
use crate::state::{NodeData, NodeID, Raster, Rgba};

use smallvec::SmallVec;

/// Floods paint layers with one color. Groups have no pixels of their own and are left alone.
pub struct FillVisitor {
    color: Rgba,
    /// Per layer, the pixels before each visit. Most recent last.
    previous: parking_lot::Mutex<hashbrown::HashMap<NodeID, SmallVec<[Raster; 1]>>>,
}
impl FillVisitor {
    #[must_use]
    pub fn new(color: Rgba) -> Self {
        Self {
            color,
            previous: parking_lot::Mutex::default(),
        }
    }
}
impl ProcessingVisitor for FillVisitor {
    fn visit(&self, id: NodeID, node: &mut NodeData, _: &VisitContext) -> Result<(), VisitError> {
        let Some(raster) = node.paint_mut() else {
            return Ok(());
        };
        self.previous
            .lock()
            .entry(id)
            .or_default()
            .push(raster.clone());
        raster.fill(self.color);
        Ok(())
    }
    fn revert(&self, id: NodeID, node: &mut NodeData, _: &VisitContext) -> Result<(), VisitError> {
        let Some(raster) = node.paint_mut() else {
            return Ok(());
        };
        *raster = super::pop_memo(&mut self.previous.lock(), id)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::{LayerTree, Location};
    use crate::util::Rect;

    #[test]
    fn fills_paint_layers_only() {
        let mut tree = LayerTree::new();
        let root = tree.root();
        let layer = tree
            .add_paint_layer(
                Location::IndexInto(root, 0),
                "layer",
                Raster::filled(2, 2, [1, 1, 1, 1]),
            )
            .unwrap();
        let cx = VisitContext {
            image_bounds: Rect::from_size(2, 2),
        };
        let visitor = FillVisitor::new([255, 0, 0, 255]);

        // Group: untouched, nothing to revert either.
        visitor.visit(root, &mut tree.get(root).unwrap(), &cx).unwrap();
        visitor
            .revert(root, &mut tree.get(root).unwrap(), &cx)
            .unwrap();

        let mut node = tree.get(layer).unwrap();
        visitor.visit(layer, &mut node, &cx).unwrap();
        assert_eq!(node.paint().unwrap().pixel(1, 1), Some([255, 0, 0, 255]));
        visitor.revert(layer, &mut node, &cx).unwrap();
        assert_eq!(node.paint().unwrap(), &Raster::filled(2, 2, [1, 1, 1, 1]));
    }
    #[test]
    fn refill_keeps_the_original() {
        let mut tree = LayerTree::new();
        let layer = tree
            .add_paint_layer(
                Location::IndexInto(tree.root(), 0),
                "layer",
                Raster::filled(2, 2, [1, 1, 1, 1]),
            )
            .unwrap();
        let cx = VisitContext {
            image_bounds: Rect::from_size(2, 2),
        };
        let visitor = FillVisitor::new([0, 0, 255, 255]);

        let mut node = tree.get(layer).unwrap();
        visitor.visit(layer, &mut node, &cx).unwrap();
        visitor.visit(layer, &mut node, &cx).unwrap();
        visitor.revert(layer, &mut node, &cx).unwrap();
        visitor.revert(layer, &mut node, &cx).unwrap();
        assert_eq!(node.paint().unwrap(), &Raster::filled(2, 2, [1, 1, 1, 1]));
    }
}
