//! What happens to a stroke's work once the stroke is over.

use std::sync::{Arc, Weak};

use crate::history::Batch;
use crate::image::Image;
use crate::queue::Executed;

/// How a stroke reacts to one of its jobs failing.
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Default,
    serde::Serialize,
    serde::Deserialize,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Continue,
    /// Cancel the stroke, rolling back everything it executed.
    Cancel,
}

pub trait StrokeStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Continue
    }
    /// The stroke was ended and every job has returned. `executed` holds the jobs that succeeded,
    /// in the order they completed.
    fn finish(&self, _executed: Vec<Executed>) {}
    /// The stroke was cancelled. Nothing is running anymore, and `executed` holds what ran before it
    /// was stopped.
    fn cancel(&self, executed: Vec<Executed>) {
        roll_back(executed);
    }
}

/// Revert executed jobs, most recent first.
pub fn roll_back(executed: Vec<Executed>) {
    for step in executed.into_iter().rev() {
        if let Err(err) = step.revert() {
            log::warn!("failed to roll back: {err}");
        }
    }
}

/// Records the stroke's work into the image history as one undoable batch.
pub struct UndoCommandStrategy {
    name: String,
    policy: FailurePolicy,
    image: Weak<Image>,
}
impl UndoCommandStrategy {
    #[must_use]
    pub fn new(image: &Arc<Image>, name: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            image: Arc::downgrade(image),
        }
    }
}
impl StrokeStrategy for UndoCommandStrategy {
    fn name(&self) -> &str {
        &self.name
    }
    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }
    fn finish(&self, executed: Vec<Executed>) {
        if executed.is_empty() {
            return;
        }
        let Some(image) = self.image.upgrade() else {
            log::debug!("image gone, not recording \"{}\"", self.name);
            return;
        };
        image.history().push(Batch::new(self.name.clone(), executed));
    }
}

/// For strokes that re-run history. Records nothing, as the history already knows.
pub struct ReplayStrategy {
    name: String,
}
impl ReplayStrategy {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
impl StrokeStrategy for ReplayStrategy {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn policy_names() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Continue);
        assert_eq!(FailurePolicy::Cancel.as_ref(), "cancel");
        assert_eq!(
            FailurePolicy::from_str("continue"),
            Ok(FailurePolicy::Continue)
        );
        assert!(FailurePolicy::from_str("explode").is_err());
    }
}
