use std::sync::Arc;

use super::{CommandError, Reversible};

/// Any caller-supplied reversible edit, queued and recorded like the built-in commands.
#[derive(Clone)]
pub struct CustomCommand {
    name: String,
    inner: Arc<dyn Reversible + Send + Sync>,
}
impl std::fmt::Debug for CustomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomCommand")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
impl CustomCommand {
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Reversible + Send + Sync + 'static) -> Self {
        Self::from_arc(name, Arc::new(command))
    }
    #[must_use]
    pub fn from_arc(name: impl Into<String>, command: Arc<dyn Reversible + Send + Sync>) -> Self {
        Self {
            name: name.into(),
            inner: command,
        }
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl Reversible for CustomCommand {
    fn redo(&self) -> Result<(), CommandError> {
        self.inner.redo()
    }
    fn undo(&self) -> Result<(), CommandError> {
        self.inner.undo()
    }
}
