pub mod applicator;
pub mod commands;
pub mod events;
pub mod history;
pub mod id;
pub mod image;
pub mod queue;
pub mod settings;
pub mod state;
pub mod strategy;
pub mod util;
pub mod visitor;

pub use id::FuzzID;
