//! # State
//!
//! The data an [`Image`](crate::image::Image) is made of. Everything here is plain data, mutated only by
//! commands running inside the image's stroke queue.

pub mod raster;
pub mod tree;

pub use raster::{Raster, Rgba};
pub use tree::{LayerTree, Location, NodeData, NodeGuard, NodeID, NodeKind, TargetError};
