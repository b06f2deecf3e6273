//! # Stroke queue
//!
//! All work against an image goes through its stroke queue. A stroke is one logical unit of work - a batch
//! of jobs that is started, filled, and then ended or cancelled. The queue runs strokes one at a time in the
//! order they were started, and the jobs of a stroke on a thread pool, honoring each job's
//! [`Sequentiality`] and [`Exclusivity`].
//!
//! Jobs always *start* in submission order. A job that can't start yet holds back everything behind it,
//! even jobs that would otherwise be free to run.
//!
//! Once a stroke is ended and every job has returned, its strategy gets to [`finish`](StrokeStrategy::finish)
//! with the jobs that executed. Cancelling drops whatever hasn't started, waits out what has, and hands the
//! executed jobs to the strategy's [`cancel`](StrokeStrategy::cancel) instead. Either way the stroke's
//! [`StrokeCompletion`] resolves last.

mod job;
mod report;

pub use job::{Exclusivity, Executed, Job, Sequentiality};
pub use report::{JobOutcome, JobState, StrokeCompletion, StrokeReport, StrokeStatus};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::commands::{Command, CommandError, Direction};
use crate::events::{EventBus, ImageEvent};
use crate::strategy::{FailurePolicy, StrokeStrategy};

pub struct Stroke;
pub type StrokeID = crate::FuzzID<Stroke>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeError {
    #[error("stroke not found")]
    Unknown,
    #[error("stroke already ended")]
    Closed,
    #[error("stroke was cancelled")]
    Cancelled,
}

/// The caller's side of a started stroke.
#[derive(Clone, Debug)]
pub struct StrokeHandle {
    id: StrokeID,
    completion: StrokeCompletion,
}
impl StrokeHandle {
    #[must_use]
    pub fn id(&self) -> StrokeID {
        self.id
    }
    #[must_use]
    pub fn completion(&self) -> &StrokeCompletion {
        &self.completion
    }
    #[must_use]
    pub fn wait(&self) -> StrokeReport {
        self.completion.wait()
    }
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<StrokeReport> {
        self.completion.wait_timeout(timeout)
    }
}

struct JobSlot {
    command: Arc<Command>,
    direction: Direction,
    /// None until the job returns or is dropped.
    state: Option<JobState>,
}

struct StrokeState {
    id: StrokeID,
    strategy: Arc<dyn StrokeStrategy>,
    slots: Vec<JobSlot>,
    pending: VecDeque<(usize, Job)>,
    /// Successful jobs, in completion order.
    executed: Vec<Executed>,
    running: usize,
    /// A sequential or barrier job is running.
    blocking: bool,
    ended: bool,
    cancelled: bool,
    /// The strategy's finish or cancel is underway.
    tearing_down: bool,
    completion: StrokeCompletion,
}
impl StrokeState {
    /// Drop everything that hasn't started yet.
    fn cancel(&mut self, events: &EventBus) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        log::warn!(
            "cancelling stroke {} \"{}\", dropping {} pending jobs",
            self.id,
            self.strategy.name(),
            self.pending.len()
        );
        for (index, _) in self.pending.drain(..) {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.state = Some(JobState::Dropped);
            }
            events.emit(ImageEvent::JobFinished {
                stroke: self.id,
                index,
                state: JobState::Dropped,
            });
        }
    }
    fn report(&mut self) -> StrokeReport {
        StrokeReport {
            stroke: self.id,
            name: self.strategy.name().to_owned(),
            status: if self.cancelled {
                StrokeStatus::Cancelled
            } else {
                StrokeStatus::Finished
            },
            jobs: self
                .slots
                .drain(..)
                .enumerate()
                .map(|(index, slot)| JobOutcome {
                    index,
                    command: slot.command,
                    direction: slot.direction,
                    state: slot.state.unwrap_or(JobState::Dropped),
                })
                .collect(),
        }
    }
}

#[derive(Default)]
struct QueueState {
    /// Started strokes, in order. Only the front one runs.
    strokes: VecDeque<StrokeState>,
    refreshes_pending: usize,
    exclusive_running: bool,
    suspended: usize,
}
impl QueueState {
    fn is_idle(&self) -> bool {
        self.strokes.is_empty() && self.refreshes_pending == 0
    }
    fn stroke_mut(&mut self, id: StrokeID) -> Option<&mut StrokeState> {
        self.strokes.iter_mut().find(|stroke| stroke.id == id)
    }
}

struct Shared {
    pool: rayon::ThreadPool,
    state: parking_lot::Mutex<QueueState>,
    /// Notified whenever the queue becomes idle.
    idle: parking_lot::Condvar,
    events: Arc<EventBus>,
}

pub struct StrokeQueue {
    shared: Arc<Shared>,
}
impl StrokeQueue {
    pub fn new(pool: rayon::ThreadPool, events: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(Shared {
                pool,
                state: parking_lot::Mutex::default(),
                idle: parking_lot::Condvar::new(),
                events,
            }),
        }
    }
    pub fn start_stroke(&self, strategy: Arc<dyn StrokeStrategy>) -> StrokeHandle {
        let id = StrokeID::new();
        let completion = StrokeCompletion::default();
        log::trace!("starting stroke {id} \"{}\"", strategy.name());
        let mut state = self.shared.state.lock();
        state.strokes.push_back(StrokeState {
            id,
            strategy,
            slots: Vec::new(),
            pending: VecDeque::new(),
            executed: Vec::new(),
            running: 0,
            blocking: false,
            ended: false,
            cancelled: false,
            tearing_down: false,
            completion: completion.clone(),
        });
        StrokeHandle { id, completion }
    }
    /// Queue a job at the end of the stroke. Returns its index in submission order.
    pub fn add_job(&self, stroke: StrokeID, job: Job) -> Result<usize, StrokeError> {
        let mut state = self.shared.state.lock();
        let target = state.stroke_mut(stroke).ok_or(StrokeError::Unknown)?;
        if target.cancelled {
            return Err(StrokeError::Cancelled);
        }
        if target.ended {
            return Err(StrokeError::Closed);
        }
        let index = target.slots.len();
        log::trace!(
            "{stroke} job #{index}: {:?} {} {}",
            job.direction(),
            job.sequentiality().as_ref(),
            job.exclusivity().as_ref()
        );
        target.slots.push(JobSlot {
            command: job.command().clone(),
            direction: job.direction(),
            state: None,
        });
        self.shared.events.emit(ImageEvent::JobQueued {
            stroke,
            index,
            kind: job.command().kind(),
            node: job.command().node(),
            direction: job.direction(),
            sequentiality: job.sequentiality(),
            exclusivity: job.exclusivity(),
        });
        target.pending.push_back((index, job));
        dispatch(&self.shared, &mut state);
        Ok(index)
    }
    /// No more jobs will arrive. The stroke completes once everything queued has run.
    pub fn end_stroke(&self, stroke: StrokeID) -> Result<(), StrokeError> {
        let mut state = self.shared.state.lock();
        let target = state.stroke_mut(stroke).ok_or(StrokeError::Unknown)?;
        if target.cancelled {
            return Err(StrokeError::Cancelled);
        }
        if target.ended {
            return Err(StrokeError::Closed);
        }
        target.ended = true;
        dispatch(&self.shared, &mut state);
        Ok(())
    }
    /// Drop every job of the stroke that hasn't started. Cancelling twice is harmless.
    pub fn cancel_stroke(&self, stroke: StrokeID) -> Result<(), StrokeError> {
        let mut state = self.shared.state.lock();
        let target = state.stroke_mut(stroke).ok_or(StrokeError::Unknown)?;
        target.cancel(&self.shared.events);
        dispatch(&self.shared, &mut state);
        Ok(())
    }
    /// Run `update` on the pool, outside of any stroke. Barrier jobs wait for it.
    pub fn spawn_update(&self, update: impl FnOnce() + Send + 'static) {
        self.shared.state.lock().refreshes_pending += 1;
        let shared = self.shared.clone();
        self.shared.pool.spawn(move || {
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(update)) {
                log::error!("update panicked: {}", panic_message(&*payload));
            }
            let mut state = shared.state.lock();
            state.refreshes_pending -= 1;
            dispatch(&shared, &mut state);
        });
    }
    /// Hold back every job that hasn't started yet, until the guard is dropped.
    #[must_use]
    pub fn suspend(&self) -> SuspendGuard {
        self.shared.state.lock().suspended += 1;
        SuspendGuard {
            shared: self.shared.clone(),
        }
    }
    /// Block until no stroke is queued and no update is pending.
    pub fn wait_for_done(&self) {
        let mut state = self.shared.state.lock();
        while !state.is_idle() {
            self.shared.idle.wait(&mut state);
        }
    }
    /// As [`Self::wait_for_done`], false if it took longer than `timeout`.
    #[must_use]
    pub fn wait_for_done_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.is_idle() {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return state.is_idle();
            }
        }
        true
    }
    /// Number of strokes started and not yet completed.
    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.shared.state.lock().strokes.len()
    }
}
impl Drop for StrokeQueue {
    fn drop(&mut self) {
        // Nobody is left to end them. Jobs already running finish on their own.
        let mut state = self.shared.state.lock();
        for stroke in &mut state.strokes {
            stroke.cancel(&self.shared.events);
        }
        state.suspended = 0;
        dispatch(&self.shared, &mut state);
    }
}

/// Keeps the queue from starting jobs while alive.
#[must_use = "the queue resumes as soon as the guard is dropped"]
pub struct SuspendGuard {
    shared: Arc<Shared>,
}
impl Drop for SuspendGuard {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.suspended = state.suspended.saturating_sub(1);
        dispatch(&self.shared, &mut state);
    }
}

/// Start whatever may start now. Called with the state locked after every change to it.
fn dispatch(shared: &Arc<Shared>, state: &mut QueueState) {
    if state.is_idle() {
        shared.idle.notify_all();
        return;
    }
    if state.suspended > 0 {
        return;
    }
    let QueueState {
        strokes,
        refreshes_pending,
        exclusive_running,
        ..
    } = state;
    let Some(stroke) = strokes.front_mut() else {
        return;
    };
    if stroke.tearing_down {
        return;
    }
    if stroke.cancelled || (stroke.ended && stroke.pending.is_empty()) {
        if stroke.running == 0 {
            stroke.tearing_down = true;
            spawn_teardown(shared, stroke);
        }
        return;
    }
    while let Some((_, job)) = stroke.pending.front() {
        if stroke.blocking {
            break;
        }
        let ordered = match job.sequentiality() {
            Sequentiality::Concurrent => true,
            Sequentiality::Sequential => stroke.running == 0,
            Sequentiality::Barrier => stroke.running == 0 && *refreshes_pending == 0,
        };
        let exclusive = job.exclusivity() == Exclusivity::Exclusive;
        if !ordered || (exclusive && *exclusive_running) {
            break;
        }
        let Some((index, job)) = stroke.pending.pop_front() else {
            break;
        };
        stroke.running += 1;
        stroke.blocking = job.sequentiality().is_blocking();
        if exclusive {
            *exclusive_running = true;
        }
        let stroke_id = stroke.id;
        let shared_for_job = shared.clone();
        shared
            .pool
            .spawn(move || run_job(&shared_for_job, stroke_id, index, &job));
    }
}

fn run_job(shared: &Arc<Shared>, stroke: StrokeID, index: usize, job: &Job) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job.execute()))
        .unwrap_or_else(|payload| Err(CommandError::Panicked(panic_message(&*payload))));
    let job_state = match result {
        Ok(()) => JobState::Done,
        Err(err) => {
            if let CommandError::Panicked(_) = err {
                log::error!("{stroke} job #{index}: {err}");
            } else {
                log::warn!("{stroke} job #{index}: {err}");
            }
            JobState::Failed(err)
        }
    };

    let mut state = shared.state.lock();
    if job.exclusivity() == Exclusivity::Exclusive {
        state.exclusive_running = false;
    }
    if let Some(target) = state.stroke_mut(stroke) {
        target.running -= 1;
        if job.sequentiality().is_blocking() {
            target.blocking = false;
        }
        let fails_stroke = matches!(job_state, JobState::Failed(_))
            && target.strategy.failure_policy() == FailurePolicy::Cancel;
        if job_state == JobState::Done {
            target.executed.push(job.executed());
        }
        if let Some(slot) = target.slots.get_mut(index) {
            slot.state = Some(job_state.clone());
        }
        shared.events.emit(ImageEvent::JobFinished {
            stroke,
            index,
            state: job_state,
        });
        if fails_stroke {
            target.cancel(&shared.events);
        }
    }
    dispatch(shared, &mut state);
}

/// Hand the front stroke's executed jobs to its strategy, then retire it.
fn spawn_teardown(shared: &Arc<Shared>, stroke: &mut StrokeState) {
    let strategy = stroke.strategy.clone();
    let executed = std::mem::take(&mut stroke.executed);
    let cancelled = stroke.cancelled;
    let id = stroke.id;
    let shared_for_teardown = shared.clone();
    shared.pool.spawn(move || {
        let shared = shared_for_teardown;
        let teardown = std::panic::AssertUnwindSafe(|| {
            if cancelled {
                strategy.cancel(executed);
            } else {
                strategy.finish(executed);
            }
        });
        if let Err(payload) = std::panic::catch_unwind(teardown) {
            log::error!(
                "strategy of stroke {id} \"{}\" panicked: {}",
                strategy.name(),
                panic_message(&*payload)
            );
        }

        let mut state = shared.state.lock();
        let Some(position) = state.strokes.iter().position(|stroke| stroke.id == id) else {
            return;
        };
        let Some(mut retired) = state.strokes.remove(position) else {
            return;
        };
        let report = retired.report();
        log::trace!(
            "stroke {id} \"{}\" {}",
            report.name,
            report.status.as_ref()
        );
        shared.events.emit(ImageEvent::StrokeFinished {
            stroke: id,
            status: report.status,
        });
        retired.completion.complete(report);
        dispatch(&shared, &mut state);
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::commands::{ProcessingCommand, UpdateCommand, UpdateRole};
    use crate::image::Image;
    use crate::state::{NodeData, NodeID};
    use crate::strategy::ReplayStrategy;
    use crate::util::Rect;
    use crate::visitor::{VisitContext, VisitError};
    use std::sync::atomic::{AtomicBool, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn queue() -> (StrokeQueue, Arc<Image>) {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let image = Image::new(Rect::from_size(4, 4)).unwrap();
        (StrokeQueue::new(pool, Arc::new(EventBus::default())), image)
    }
    fn noop(image: &Arc<Image>) -> Job {
        let root = image.tree().root();
        Job::new(
            UpdateCommand::new(image, root, false, UpdateRole::Leading),
            Sequentiality::Sequential,
            Exclusivity::Normal,
        )
    }
    #[test]
    fn closed_strokes_reject_jobs() {
        let (queue, image) = queue();
        let stroke = queue.start_stroke(Arc::new(ReplayStrategy::new("closed")));
        assert_eq!(queue.add_job(stroke.id(), noop(&image)), Ok(0));
        queue.end_stroke(stroke.id()).unwrap();
        assert_eq!(
            queue.add_job(stroke.id(), noop(&image)),
            Err(StrokeError::Closed)
        );
        assert_eq!(queue.end_stroke(stroke.id()), Err(StrokeError::Closed));

        let report = stroke.wait_timeout(TIMEOUT).unwrap();
        assert_eq!(report.status, StrokeStatus::Finished);
        assert_eq!(report.jobs.len(), 1);
        assert_eq!(
            queue.add_job(stroke.id(), noop(&image)),
            Err(StrokeError::Unknown)
        );
    }
    #[test]
    fn cancelled_strokes_reject_jobs() {
        let (queue, image) = queue();
        let guard = queue.suspend();
        let stroke = queue.start_stroke(Arc::new(ReplayStrategy::new("cancelled")));
        queue.add_job(stroke.id(), noop(&image)).unwrap();
        queue.cancel_stroke(stroke.id()).unwrap();
        queue.cancel_stroke(stroke.id()).unwrap();
        assert_eq!(
            queue.add_job(stroke.id(), noop(&image)),
            Err(StrokeError::Cancelled)
        );
        assert_eq!(queue.end_stroke(stroke.id()), Err(StrokeError::Cancelled));
        drop(guard);

        let report = stroke.wait_timeout(TIMEOUT).unwrap();
        assert_eq!(report.status, StrokeStatus::Cancelled);
        assert_eq!(report.jobs[0].state, JobState::Dropped);
    }
    #[test]
    fn strokes_run_one_at_a_time() {
        let (queue, image) = queue();
        let first = queue.start_stroke(Arc::new(ReplayStrategy::new("first")));
        let second = queue.start_stroke(Arc::new(ReplayStrategy::new("second")));
        queue.add_job(second.id(), noop(&image)).unwrap();
        queue.end_stroke(second.id()).unwrap();
        // Held back by the first, which isn't ended.
        assert!(second.wait_timeout(Duration::from_millis(50)).is_none());
        assert_eq!(queue.stroke_count(), 2);

        queue.end_stroke(first.id()).unwrap();
        assert!(second.wait_timeout(TIMEOUT).is_some());
        assert!(first.completion().try_get().is_some());
        assert!(queue.wait_for_done_timeout(TIMEOUT));
        assert_eq!(queue.stroke_count(), 0);
    }
    #[test]
    fn updates_are_tracked() {
        let (queue, _image) = queue();
        let (send, recv) = crossbeam::channel::bounded(0);
        queue.spawn_update(move || {
            // Blocks until the test lets it through.
            let _ = recv.recv();
        });
        assert!(!queue.wait_for_done_timeout(Duration::from_millis(20)));
        send.send(()).unwrap();
        assert!(queue.wait_for_done_timeout(TIMEOUT));
    }
    /// A job that raises `flag` when it runs.
    fn flag_job(image: &Arc<Image>, flag: &Arc<AtomicBool>, sequentiality: Sequentiality) -> Job {
        let flag = flag.clone();
        let visitor = move |_: NodeID, _: &mut NodeData, _: &VisitContext| -> Result<(), VisitError> {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        };
        let root = image.tree().root();
        Job::new(
            ProcessingCommand::new(image, Arc::new(visitor), root),
            sequentiality,
            Exclusivity::Normal,
        )
    }
    #[test]
    fn barrier_waits_for_updates() {
        let (queue, image) = queue();
        let (send, recv) = crossbeam::channel::bounded::<()>(0);
        queue.spawn_update(move || {
            let _ = recv.recv();
        });
        let stroke = queue.start_stroke(Arc::new(ReplayStrategy::new("barrier")));
        let concurrent = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(AtomicBool::new(false));
        queue
            .add_job(stroke.id(), flag_job(&image, &concurrent, Sequentiality::Concurrent))
            .unwrap();
        queue
            .add_job(stroke.id(), flag_job(&image, &barrier, Sequentiality::Barrier))
            .unwrap();
        queue.end_stroke(stroke.id()).unwrap();

        assert!(stroke.wait_timeout(Duration::from_millis(50)).is_none());
        assert!(concurrent.load(Ordering::SeqCst));
        assert!(!barrier.load(Ordering::SeqCst));

        send.send(()).unwrap();
        assert!(stroke.wait_timeout(TIMEOUT).unwrap().is_success());
        assert!(barrier.load(Ordering::SeqCst));
    }
    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&5_i32), "unknown panic");
    }
}
