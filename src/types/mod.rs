//! Data model for jobs, lifecycle events and synchronization keys.

pub mod event;
pub mod job;
pub mod key;

pub use event::*;
pub use job::*;
pub use key::*;
