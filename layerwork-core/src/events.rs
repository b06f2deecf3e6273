//! Notifications about what an image is doing, fanned out to any number of listeners.
//!
//! Listeners that fall behind never slow the image down, their channel just grows. Dropping the receiver
//! unsubscribes.

use crate::commands::{CommandKind, Direction};
use crate::queue::{Exclusivity, JobState, Sequentiality, StrokeID, StrokeStatus};
use crate::state::NodeID;
use crate::util::Rect;

#[derive(Clone, Debug)]
pub enum ImageEvent {
    /// A job was accepted into a stroke. `index` is its position in submission order.
    ///
    /// Only describes the job, so a listener that never drains its channel doesn't keep commands alive.
    JobQueued {
        stroke: StrokeID,
        index: usize,
        kind: CommandKind,
        node: Option<NodeID>,
        direction: Direction,
        sequentiality: Sequentiality,
        exclusivity: Exclusivity,
    },
    /// A job ran, failed, or was dropped by a cancellation.
    JobFinished {
        stroke: StrokeID,
        index: usize,
        state: JobState,
    },
    /// The stroke is fully done, including its strategy's finish or cancel work.
    StrokeFinished {
        stroke: StrokeID,
        status: StrokeStatus,
    },
    /// An area of a node was marked as needing a redraw.
    Dirty { node: NodeID, rect: Rect },
    /// The projections of a subtree were regenerated.
    Refreshed { root: NodeID, nodes: usize },
}

#[derive(Default)]
pub struct EventBus {
    subscribers: parking_lot::Mutex<Vec<crossbeam::channel::Sender<ImageEvent>>>,
}
impl EventBus {
    #[must_use]
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<ImageEvent> {
        let (send, recv) = crossbeam::channel::unbounded();
        self.subscribers.lock().push(send);
        recv
    }
    pub fn emit(&self, event: ImageEvent) {
        let mut subscribers = self.subscribers.lock();
        // Sending fails only if the receiver is gone - forget those.
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn dropped_receivers_unsubscribe() {
        let bus = EventBus::default();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        drop(gone);
        assert_eq!(bus.subscriber_count(), 2);

        let node = NodeID::new();
        bus.emit(ImageEvent::Refreshed { root: node, nodes: 3 });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(matches!(
            keep.try_recv(),
            Ok(ImageEvent::Refreshed { root, nodes: 3 }) if root == node
        ));
    }
}
