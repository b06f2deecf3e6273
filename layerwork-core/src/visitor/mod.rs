//! # Processing visitors
//!
//! A visitor is the actual edit of a processing batch - crop, fill, change opacity, and so on. The same
//! visitor instance is shared by every node of a batch and may run for several nodes at once, so any state
//! it needs in order to revert (old pixels, old values) lives inside it, keyed by node. A node can be visited
//! more than once by the same visitor, and reverts come back in the opposite order.
//!
//! Visitors get exclusive access to one node's data for the duration of a call. They must not call back
//! into the image.

mod fill;
mod opacity;

pub use fill::FillVisitor;
pub use opacity::OpacityVisitor;

use crate::state::{NodeData, NodeID};
use crate::util::Rect;

use smallvec::SmallVec;

/// What a visitor may know about its surroundings.
#[derive(Copy, Clone, Debug)]
pub struct VisitContext {
    pub image_bounds: Rect,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VisitError {
    #[error("can't process {0} nodes")]
    Unsupported(&'static str),
    #[error("no record of a previous visit to revert")]
    NothingToRevert,
    #[error("{0}")]
    Failed(String),
}

pub trait ProcessingVisitor: Send + Sync {
    /// Process one node.
    fn visit(&self, id: NodeID, node: &mut NodeData, cx: &VisitContext) -> Result<(), VisitError>;
    /// Take back a previous [`Self::visit`] of this node. Visitors with nothing to take back leave this be.
    fn revert(&self, _id: NodeID, _node: &mut NodeData, _cx: &VisitContext) -> Result<(), VisitError> {
        Ok(())
    }
}

// Plain closures make forward-only visitors.
impl<F> ProcessingVisitor for F
where
    F: Fn(NodeID, &mut NodeData, &VisitContext) -> Result<(), VisitError> + Send + Sync,
{
    fn visit(&self, id: NodeID, node: &mut NodeData, cx: &VisitContext) -> Result<(), VisitError> {
        self(id, node, cx)
    }
}

/// Take the value saved by the most recent unreverted visit of `id`.
fn pop_memo<T>(
    memo: &mut hashbrown::HashMap<NodeID, SmallVec<[T; 1]>>,
    id: NodeID,
) -> Result<T, VisitError> {
    let saved = memo.get_mut(&id).ok_or(VisitError::NothingToRevert)?;
    let value = saved.pop().ok_or(VisitError::NothingToRevert)?;
    if saved.is_empty() {
        memo.remove(&id);
    }
    Ok(value)
}
