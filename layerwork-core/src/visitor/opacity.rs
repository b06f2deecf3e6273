use super::{ProcessingVisitor, VisitContext, VisitError};
use crate::state::{NodeData, NodeID};
use crate::util::Opacity;

use smallvec::SmallVec;

/// Sets the opacity of every visited node, groups included.
pub struct OpacityVisitor {
    opacity: Opacity,
    /// Per node, the opacity before each visit. Most recent last.
    previous: parking_lot::Mutex<hashbrown::HashMap<NodeID, SmallVec<[Opacity; 1]>>>,
}
impl OpacityVisitor {
    #[must_use]
    pub fn new(opacity: Opacity) -> Self {
        Self {
            opacity,
            previous: parking_lot::Mutex::default(),
        }
    }
}
impl ProcessingVisitor for OpacityVisitor {
    fn visit(&self, id: NodeID, node: &mut NodeData, _: &VisitContext) -> Result<(), VisitError> {
        self.previous
            .lock()
            .entry(id)
            .or_default()
            .push(node.opacity());
        node.set_opacity(self.opacity);
        Ok(())
    }
    fn revert(&self, id: NodeID, node: &mut NodeData, _: &VisitContext) -> Result<(), VisitError> {
        let old = super::pop_memo(&mut self.previous.lock(), id)?;
        node.set_opacity(old);
        Ok(())
    }
}
