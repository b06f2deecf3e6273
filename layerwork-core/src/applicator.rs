//! # Processing applicator
//!
//! Applies visitors to a node, or to a whole subtree of nodes, as one undoable batch. The applicator opens a
//! stroke on the image as soon as it's created, and the batch is bracketed by two [`UpdateCommand`]s so that
//! the canvas is refreshed exactly once at the end of the batch - and once more at the start, should the
//! batch ever be undone.
//!
//! Everything is submitted up front and runs later on the image's workers. Nothing here waits for the work
//! to happen; the [`BatchHandle`] returned by [`ProcessingApplicator::end`] is how to find out how it went.
//!
//! ```
//! # use std::sync::Arc;
//! # use layerwork_core::{applicator::ProcessingApplicator, image::Image, util::{Opacity, Rect}};
//! # use layerwork_core::queue::{Exclusivity, Sequentiality};
//! # use layerwork_core::visitor::OpacityVisitor;
//! let image = Image::new(Rect::from_size(64, 64)).unwrap();
//! let root = image.tree().root();
//!
//! let mut applicator = ProcessingApplicator::new(&image, root, true, "fade everything");
//! applicator.apply_visitor(
//!     Arc::new(OpacityVisitor::new(Opacity::saturating(0.5))),
//!     Sequentiality::Concurrent,
//!     Exclusivity::Normal,
//! );
//! let report = applicator.end().wait();
//! assert!(report.is_success());
//! ```
//!
//! `end` consumes the applicator, so a finished batch can't be added to or ended again:
//!
//! ```compile_fail
//! # use layerwork_core::{applicator::ProcessingApplicator, image::Image, util::Rect};
//! let image = Image::new(Rect::from_size(4, 4)).unwrap();
//! let root = image.tree().root();
//! let applicator = ProcessingApplicator::new(&image, root, false, "twice");
//! let _ = applicator.end();
//! let _ = applicator.end();
//! ```
//!
//! ```compile_fail
//! # use std::sync::Arc;
//! # use layerwork_core::{applicator::ProcessingApplicator, image::Image, util::{Opacity, Rect}};
//! # use layerwork_core::queue::{Exclusivity, Sequentiality};
//! # use layerwork_core::visitor::OpacityVisitor;
//! let image = Image::new(Rect::from_size(4, 4)).unwrap();
//! let root = image.tree().root();
//! let mut applicator = ProcessingApplicator::new(&image, root, false, "too late");
//! let _ = applicator.end();
//! applicator.apply_visitor(
//!     Arc::new(OpacityVisitor::new(Opacity::OPAQUE)),
//!     Sequentiality::Sequential,
//!     Exclusivity::Normal,
//! );
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::commands::{Command, CommandError, ProcessingCommand, UpdateCommand, UpdateRole};
use crate::image::Image;
use crate::queue::{
    Exclusivity, Job, JobState, Sequentiality, StrokeCompletion, StrokeHandle, StrokeID,
    StrokeReport, StrokeStatus,
};
use crate::state::{LayerTree, NodeID};
use crate::strategy::{FailurePolicy, UndoCommandStrategy};
use crate::visitor::ProcessingVisitor;

pub struct ProcessingApplicator {
    image: Weak<Image>,
    node: NodeID,
    recursive: bool,
    stroke: StrokeHandle,
    /// Cleared by `end`. Still set on drop means the batch was abandoned.
    open: bool,
}
impl ProcessingApplicator {
    /// Start a batch on `node`, or on the subtree under it if `recursive`. Failures are handled as
    /// the image's settings say.
    pub fn new(image: &Arc<Image>, node: NodeID, recursive: bool, name: impl Into<String>) -> Self {
        let policy = image.settings().failure_policy;
        Self::with_policy(image, node, recursive, name, policy)
    }
    pub fn with_policy(
        image: &Arc<Image>,
        node: NodeID,
        recursive: bool,
        name: impl Into<String>,
        policy: FailurePolicy,
    ) -> Self {
        let stroke = image.start_stroke(UndoCommandStrategy::new(image, name, policy));
        let this = Self {
            image: Arc::downgrade(image),
            node,
            recursive,
            stroke,
            open: true,
        };
        this.submit(
            image,
            UpdateCommand::new(image, node, recursive, UpdateRole::Leading),
            Sequentiality::Sequential,
            Exclusivity::Normal,
        );
        this
    }
    #[must_use]
    pub fn node(&self) -> NodeID {
        self.node
    }
    #[must_use]
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
    #[must_use]
    pub fn stroke_id(&self) -> StrokeID {
        self.stroke.id()
    }
    /// Queue a visit of the bound node, or of every node of the subtree children-first if recursive.
    /// Every node gets the same scheduling tags.
    pub fn apply_visitor(
        &mut self,
        visitor: Arc<dyn ProcessingVisitor>,
        sequentiality: Sequentiality,
        exclusivity: Exclusivity,
    ) {
        let Some(image) = self.image.upgrade() else {
            log::debug!("image gone, not applying visitor to {}", self.node);
            return;
        };
        let nodes = if self.recursive {
            visit_recursively(&image.tree(), self.node)
        } else {
            vec![self.node]
        };
        for node in nodes {
            self.submit(
                &image,
                ProcessingCommand::new(&image, visitor.clone(), node),
                sequentiality,
                exclusivity,
            );
        }
    }
    /// Queue an arbitrary command between the visits, as part of the same undoable batch.
    pub fn apply_command(
        &mut self,
        command: impl Into<Command>,
        sequentiality: Sequentiality,
        exclusivity: Exclusivity,
    ) {
        let Some(image) = self.image.upgrade() else {
            log::debug!("image gone, not applying command to {}", self.stroke.id());
            return;
        };
        self.submit(&image, command, sequentiality, exclusivity);
    }
    /// Close the batch. It runs to completion in the background.
    pub fn end(mut self) -> BatchHandle {
        self.open = false;
        let handle = BatchHandle {
            stroke: self.stroke.id(),
            completion: self.stroke.completion().clone(),
        };
        let Some(image) = self.image.upgrade() else {
            log::debug!("image gone, not ending {}", self.stroke.id());
            return handle;
        };
        self.submit(
            &image,
            UpdateCommand::new(&image, self.node, self.recursive, UpdateRole::Trailing),
            Sequentiality::Sequential,
            Exclusivity::Normal,
        );
        if let Err(err) = image.end_stroke(self.stroke.id()) {
            log::debug!("not ending {}: {err}", self.stroke.id());
        }
        handle
    }
    fn submit(
        &self,
        image: &Image,
        command: impl Into<Command>,
        sequentiality: Sequentiality,
        exclusivity: Exclusivity,
    ) {
        let job = Job::new(command, sequentiality, exclusivity);
        if let Err(err) = image.add_job(self.stroke.id(), job) {
            log::debug!("job not queued on {}: {err}", self.stroke.id());
        }
    }
}
impl Drop for ProcessingApplicator {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        let Some(image) = self.image.upgrade() else {
            return;
        };
        log::debug!("{} abandoned without ending, cancelling", self.stroke.id());
        // Errs only if it's already gone.
        let _ = image.cancel_stroke(self.stroke.id());
    }
}

/// Every node of the subtree at `root`, children before their parent and siblings top to bottom.
fn visit_recursively(tree: &LayerTree, root: NodeID) -> Vec<NodeID> {
    let mut order = Vec::new();
    // Each node is pushed twice: first to expand its children, then to be emitted after them.
    let mut stack = vec![(root, false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        stack.push((node, true));
        let mut children = smallvec::SmallVec::<[NodeID; 8]>::new();
        let mut child = tree.first_child(node);
        while let Some(current) = child {
            children.push(current);
            child = tree.next_sibling(current);
        }
        stack.extend(children.into_iter().rev().map(|child| (child, false)));
    }
    order
}

/// Result of one visit.
#[derive(Clone, Debug)]
pub struct NodeOutcome {
    pub node: NodeID,
    pub state: JobState,
}

/// Result of a command queued with [`ProcessingApplicator::apply_command`].
#[derive(Clone, Debug)]
pub struct CommandOutcome {
    pub name: String,
    pub state: JobState,
}

/// How a batch went, once it's done.
#[derive(Clone, Debug)]
pub struct BatchReport {
    name: String,
    status: StrokeStatus,
    outcomes: Vec<NodeOutcome>,
    commands: Vec<CommandOutcome>,
}
impl BatchReport {
    fn from_stroke(report: StrokeReport) -> Self {
        let mut outcomes = Vec::new();
        let mut commands = Vec::new();
        for job in report.jobs {
            match &*job.command {
                Command::Processing(processing) => outcomes.push(NodeOutcome {
                    node: processing.node(),
                    state: job.state,
                }),
                Command::Custom(custom) => commands.push(CommandOutcome {
                    name: custom.name().to_owned(),
                    state: job.state,
                }),
                Command::Update(_) => (),
            }
        }
        Self {
            name: report.name,
            status: report.status,
            outcomes,
            commands,
        }
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[must_use]
    pub fn status(&self) -> StrokeStatus {
        self.status
    }
    /// Every visit, in submission order.
    #[must_use]
    pub fn outcomes(&self) -> &[NodeOutcome] {
        &self.outcomes
    }
    /// Every applied command, in submission order.
    #[must_use]
    pub fn commands(&self) -> &[CommandOutcome] {
        &self.commands
    }
    pub fn succeeded(&self) -> impl Iterator<Item = NodeID> + '_ {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state == JobState::Done)
            .map(|outcome| outcome.node)
    }
    pub fn failures(&self) -> impl Iterator<Item = (NodeID, &CommandError)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.state {
                JobState::Failed(err) => Some((outcome.node, err)),
                _ => None,
            })
    }
    pub fn dropped(&self) -> impl Iterator<Item = NodeID> + '_ {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state == JobState::Dropped)
            .map(|outcome| outcome.node)
    }
    /// Finished, and every visit and command succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StrokeStatus::Finished
            && self
                .outcomes
                .iter()
                .all(|outcome| outcome.state == JobState::Done)
            && self
                .commands
                .iter()
                .all(|command| command.state == JobState::Done)
    }
}

#[derive(Clone, Debug)]
pub struct BatchHandle {
    stroke: StrokeID,
    completion: StrokeCompletion,
}
impl BatchHandle {
    #[must_use]
    pub fn stroke_id(&self) -> StrokeID {
        self.stroke
    }
    /// Block until the batch is done.
    #[must_use]
    pub fn wait(&self) -> BatchReport {
        BatchReport::from_stroke(self.completion.wait())
    }
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BatchReport> {
        self.completion
            .wait_timeout(timeout)
            .map(BatchReport::from_stroke)
    }
    #[must_use]
    pub fn try_get(&self) -> Option<BatchReport> {
        self.completion.try_get().map(BatchReport::from_stroke)
    }
}
