//! # Commands
//!
//! Commands are the only way queued work touches an image. Each one carries both of its directions - `redo`
//! applies it, `undo` takes it back - so the pairing can never drift apart. The same command object is what
//! the stroke queue runs, what the history records, and what undo and redo replay.

pub mod custom;
pub mod processing;
pub mod update;

pub use custom::CustomCommand;
pub use processing::ProcessingCommand;
pub use update::{UpdateCommand, UpdateRole};

use crate::state::NodeID;
use crate::visitor::VisitError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("visiting {node} failed: {source}")]
    Visit {
        node: NodeID,
        #[source]
        source: VisitError,
    },
    #[error("command panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Failed(String),
}

/// Something that can be applied and taken back.
pub trait Reversible {
    /// Apply forward. If this generates an error, the state should ideally not be observably changed.
    fn redo(&self) -> Result<(), CommandError>;
    /// Apply backward.
    fn undo(&self) -> Result<(), CommandError>;
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum Direction {
    Do,
    Undo,
}
impl Direction {
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Do => Self::Undo,
            Self::Undo => Self::Do,
        }
    }
}

#[derive(PartialEq, Eq, Debug)]
pub enum DoUndo<'c, T> {
    Do(&'c T),
    Undo(&'c T),
}
impl<'c, T> DoUndo<'c, T> {
    #[must_use]
    pub fn new(direction: Direction, command: &'c T) -> Self {
        match direction {
            Direction::Do => Self::Do(command),
            Direction::Undo => Self::Undo(command),
        }
    }
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::Do(_) => Direction::Do,
            Self::Undo(_) => Direction::Undo,
        }
    }
    #[must_use]
    pub fn command(&self) -> &'c T {
        match self {
            Self::Do(c) | Self::Undo(c) => c,
        }
    }
}
impl<T: Reversible> DoUndo<'_, T> {
    pub fn execute(&self) -> Result<(), CommandError> {
        match self {
            Self::Do(c) => c.redo(),
            Self::Undo(c) => c.undo(),
        }
    }
}

/// What a command is, without the command. Cheap to copy around in events and logs.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum CommandKind {
    Update(UpdateRole),
    Processing,
    Custom,
}

#[derive(Clone, Debug)]
pub enum Command {
    /// Refreshes the canvas on one edge of a batch.
    Update(UpdateCommand),
    /// Runs a visitor against one node.
    Processing(ProcessingCommand),
    /// Anything else the caller wants in the batch.
    Custom(CustomCommand),
}
impl From<UpdateCommand> for Command {
    fn from(value: UpdateCommand) -> Self {
        Self::Update(value)
    }
}
impl From<ProcessingCommand> for Command {
    fn from(value: ProcessingCommand) -> Self {
        Self::Processing(value)
    }
}
impl From<CustomCommand> for Command {
    fn from(value: CustomCommand) -> Self {
        Self::Custom(value)
    }
}
impl Command {
    #[must_use]
    pub fn update(&self) -> Option<&UpdateCommand> {
        match self {
            Self::Update(c) => Some(c),
            _ => None,
        }
    }
    #[must_use]
    pub fn processing(&self) -> Option<&ProcessingCommand> {
        match self {
            Self::Processing(c) => Some(c),
            _ => None,
        }
    }
    #[must_use]
    pub fn custom(&self) -> Option<&CustomCommand> {
        match self {
            Self::Custom(c) => Some(c),
            _ => None,
        }
    }
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Update(c) => CommandKind::Update(c.role()),
            Self::Processing(_) => CommandKind::Processing,
            Self::Custom(_) => CommandKind::Custom,
        }
    }
    /// The node this command is bound to. Custom commands aren't bound to any.
    #[must_use]
    pub fn node(&self) -> Option<NodeID> {
        match self {
            Self::Update(c) => Some(c.node()),
            Self::Processing(c) => Some(c.node()),
            Self::Custom(_) => None,
        }
    }
}
impl Reversible for Command {
    fn redo(&self) -> Result<(), CommandError> {
        match self {
            Self::Update(c) => c.redo(),
            Self::Processing(c) => c.redo(),
            Self::Custom(c) => c.redo(),
        }
    }
    fn undo(&self) -> Result<(), CommandError> {
        match self {
            Self::Update(c) => c.undo(),
            Self::Processing(c) => c.undo(),
            Self::Custom(c) => c.undo(),
        }
    }
}
