//! # Image
//!
//! The shared canvas. An image owns its layer tree, the stroke queue every edit is funneled through, the
//! undo history, and the bus its events go out on. Images are always handled as `Arc<Image>`, while the work
//! queued against one only holds a `Weak` to it.

use std::sync::Arc;
use std::time::Duration;

use crate::commands::Direction;
use crate::events::{EventBus, ImageEvent};
use crate::history::{Batch, History};
use crate::queue::{
    Exclusivity, Job, Sequentiality, StrokeError, StrokeHandle, StrokeID, StrokeQueue,
    SuspendGuard,
};
use crate::settings::Settings;
use crate::state::{LayerTree, NodeID};
use crate::strategy::{ReplayStrategy, StrokeStrategy};
use crate::util::Rect;

pub type ImageID = crate::FuzzID<Image>;

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("image bounds are empty")]
    EmptyBounds,
    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub struct Image {
    id: ImageID,
    bounds: Rect,
    settings: Settings,
    tree: parking_lot::RwLock<LayerTree>,
    history: parking_lot::Mutex<History>,
    events: Arc<EventBus>,
    queue: StrokeQueue,
}
impl Image {
    pub fn new(bounds: Rect) -> Result<Arc<Self>, ImageError> {
        Self::with_settings(bounds, Settings::default())
    }
    pub fn with_settings(bounds: Rect, settings: Settings) -> Result<Arc<Self>, ImageError> {
        if bounds.is_empty() {
            return Err(ImageError::EmptyBounds);
        }
        let id = ImageID::new();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads)
            .thread_name(move |idx| format!("{id} worker {idx}"))
            .build()?;
        let events = Arc::new(EventBus::default());
        log::info!(
            "created {id} {}x{} with {} workers",
            bounds.width,
            bounds.height,
            pool.current_num_threads()
        );
        Ok(Arc::new(Self {
            id,
            bounds,
            tree: LayerTree::new().into(),
            history: History::new().into(),
            queue: StrokeQueue::new(pool, events.clone()),
            events,
            settings,
        }))
    }
    #[must_use]
    pub fn id(&self) -> ImageID {
        self.id
    }
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    /// Read access to the layer tree. Node data can still be locked and edited through it.
    pub fn tree(&self) -> parking_lot::RwLockReadGuard<'_, LayerTree> {
        self.tree.read()
    }
    /// Change the structure of the tree. Waits for every reader to let go.
    pub fn edit_tree<T>(&self, edit: impl FnOnce(&mut LayerTree) -> T) -> T {
        edit(&mut *self.tree.write())
    }
    #[must_use]
    pub fn contains(&self, node: NodeID) -> bool {
        self.tree.read().contains(node)
    }
    #[must_use]
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<ImageEvent> {
        self.events.subscribe()
    }
    /// Mark an area of the node, and of each of its ancestors, as needing a redraw.
    /// False if the node is unknown.
    pub fn mark_dirty(&self, node: NodeID, rect: Rect) -> bool {
        let marked = self.tree.read().mark_dirty(node, rect);
        if marked {
            self.events.emit(ImageEvent::Dirty { node, rect });
        }
        marked
    }
    /// Regenerate the subtree's projections on the worker pool. Returns immediately.
    pub fn refresh_graph_async(self: &Arc<Self>, node: NodeID) {
        let image = Arc::downgrade(self);
        self.queue.spawn_update(move || {
            let Some(image) = image.upgrade() else {
                return;
            };
            let nodes = image.tree().refresh(node);
            if nodes == 0 {
                log::debug!("{node} was removed before it could be refreshed");
                return;
            }
            image.events.emit(ImageEvent::Refreshed { root: node, nodes });
        });
    }

    pub fn start_stroke(&self, strategy: impl StrokeStrategy + 'static) -> StrokeHandle {
        self.queue.start_stroke(Arc::new(strategy))
    }
    pub fn add_job(&self, stroke: StrokeID, job: Job) -> Result<usize, StrokeError> {
        self.queue.add_job(stroke, job)
    }
    pub fn end_stroke(&self, stroke: StrokeID) -> Result<(), StrokeError> {
        self.queue.end_stroke(stroke)
    }
    pub fn cancel_stroke(&self, stroke: StrokeID) -> Result<(), StrokeError> {
        self.queue.cancel_stroke(stroke)
    }
    /// No queued job starts while the guard lives. Running jobs are unaffected.
    pub fn suspend(&self) -> SuspendGuard {
        self.queue.suspend()
    }
    /// Block until every stroke and refresh has completed.
    pub fn wait_for_done(&self) {
        self.queue.wait_for_done();
    }
    #[must_use]
    pub fn wait_for_done_timeout(&self, timeout: Duration) -> bool {
        self.queue.wait_for_done_timeout(timeout)
    }

    pub fn history(&self) -> parking_lot::MutexGuard<'_, History> {
        self.history.lock()
    }
    /// Take back the most recent batch, as a stroke of its own. None if there's nothing to undo.
    ///
    /// Only finished strokes are in the history - a stroke still in the queue can't be undone yet.
    pub fn undo(&self) -> Option<StrokeHandle> {
        let batch = self.history.lock().undo()?;
        Some(self.replay(&batch, Direction::Undo))
    }
    /// Apply the most recently undone batch again. None if there's nothing to redo.
    pub fn redo(&self) -> Option<StrokeHandle> {
        let batch = self.history.lock().redo()?;
        Some(self.replay(&batch, Direction::Do))
    }
    fn replay(&self, batch: &Batch, direction: Direction) -> StrokeHandle {
        let stroke = self.start_stroke(ReplayStrategy::new(format!(
            "{} {}",
            direction.as_ref(),
            batch.name()
        )));
        let steps = match direction {
            Direction::Do => either::Either::Left(batch.steps().iter()),
            Direction::Undo => either::Either::Right(batch.steps().iter().rev()),
        };
        for step in steps {
            let step_direction = match direction {
                Direction::Do => step.direction(),
                Direction::Undo => step.direction().reversed(),
            };
            let job = Job::with_direction(
                step.command().clone(),
                step_direction,
                Sequentiality::Sequential,
                Exclusivity::Normal,
            );
            if let Err(err) = self.add_job(stroke.id(), job) {
                log::warn!("replaying \"{}\": {err}", batch.name());
                break;
            }
        }
        if let Err(err) = self.end_stroke(stroke.id()) {
            log::warn!("replaying \"{}\": {err}", batch.name());
        }
        stroke
    }
}
impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::Location;

    #[test]
    fn empty_bounds_rejected() {
        assert!(matches!(
            Image::new(Rect::from_size(0, 10)),
            Err(ImageError::EmptyBounds)
        ));
    }
    #[test]
    fn dirty_marks_emit_events() {
        let image = Image::new(Rect::from_size(8, 8)).unwrap();
        let events = image.subscribe();
        let group = image.edit_tree(|tree| {
            tree.add_group(Location::IndexInto(tree.root(), 0), "group")
                .unwrap()
        });
        let rect = Rect::new(1, 1, 2, 2);
        assert!(image.mark_dirty(group, rect));
        assert!(matches!(
            events.try_recv(),
            Ok(ImageEvent::Dirty { node, rect: seen }) if node == group && seen == rect
        ));
        image.edit_tree(|tree| tree.remove(group)).unwrap();
        assert!(!image.mark_dirty(group, rect));
        assert!(events.try_recv().is_err());
    }
    #[test]
    fn refresh_emits_once_done() {
        let image = Image::new(Rect::from_size(8, 8)).unwrap();
        let events = image.subscribe();
        let root = image.tree().root();
        image.refresh_graph_async(root);
        assert!(image.wait_for_done_timeout(Duration::from_secs(5)));
        assert!(matches!(
            events.try_recv(),
            Ok(ImageEvent::Refreshed { root: seen, nodes: 1 }) if seen == root
        ));
    }
    #[test]
    fn worker_count_follows_settings() {
        let settings = Settings {
            worker_threads: 3,
            ..Settings::default()
        };
        let image = Image::with_settings(Rect::from_size(8, 8), settings.clone()).unwrap();
        assert_eq!(image.settings(), &settings);
        assert!(!image.history().can_undo());
        assert!(image.undo().is_none());
        assert!(image.redo().is_none());
    }
}
