use std::sync::Arc;

use crate::commands::{Command, CommandError, Direction, DoUndo};

/// Ordering of a job relative to the other jobs of its stroke.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, strum::AsRefStr)]
pub enum Sequentiality {
    /// Starts only once every earlier job has completed. Nothing later starts until it completes.
    #[default]
    Sequential,
    /// May run alongside other concurrent jobs, in any order.
    Concurrent,
    /// As [`Self::Sequential`], and additionally waits out every pending asynchronous refresh.
    Barrier,
}
impl Sequentiality {
    /// Whether this job holds back everything submitted after it.
    #[must_use]
    pub fn is_blocking(self) -> bool {
        !matches!(self, Self::Concurrent)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, strum::AsRefStr)]
pub enum Exclusivity {
    #[default]
    Normal,
    /// Never runs while another exclusive job is running on the same image.
    Exclusive,
}

/// A command, which way to run it, and how it may be scheduled.
#[derive(Clone, Debug)]
pub struct Job {
    command: Arc<Command>,
    direction: Direction,
    sequentiality: Sequentiality,
    exclusivity: Exclusivity,
}
impl Job {
    /// A job applying `command` forward.
    #[must_use]
    pub fn new(
        command: impl Into<Command>,
        sequentiality: Sequentiality,
        exclusivity: Exclusivity,
    ) -> Self {
        Self::with_direction(
            Arc::new(command.into()),
            Direction::Do,
            sequentiality,
            exclusivity,
        )
    }
    #[must_use]
    pub fn with_direction(
        command: Arc<Command>,
        direction: Direction,
        sequentiality: Sequentiality,
        exclusivity: Exclusivity,
    ) -> Self {
        Self {
            command,
            direction,
            sequentiality,
            exclusivity,
        }
    }
    #[must_use]
    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
    #[must_use]
    pub fn sequentiality(&self) -> Sequentiality {
        self.sequentiality
    }
    #[must_use]
    pub fn exclusivity(&self) -> Exclusivity {
        self.exclusivity
    }
    pub(crate) fn execute(&self) -> Result<(), CommandError> {
        DoUndo::new(self.direction, &*self.command).execute()
    }
    pub(crate) fn executed(&self) -> Executed {
        Executed {
            command: self.command.clone(),
            direction: self.direction,
        }
    }
}

/// Record of a job that ran successfully.
#[derive(Clone, Debug)]
pub struct Executed {
    command: Arc<Command>,
    direction: Direction,
}
impl Executed {
    #[must_use]
    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }
    /// The direction the command was run in.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
    /// Run the command in the opposite direction it was executed in.
    pub fn revert(&self) -> Result<(), CommandError> {
        DoUndo::new(self.direction.reversed(), &*self.command).execute()
    }
}
