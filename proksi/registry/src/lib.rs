//! The shared, in-process table of known endpoints: insert/update/delete,
//! score-ordered selection, and a pub/sub layer for components that need to
//! react as soon as a new endpoint is admitted.

mod filter;
mod notifier;
mod registry;

pub use filter::{by_score, by_uptime, Filter};
pub use notifier::{Event, NotifyRegistry, Op};
pub use registry::{Registry, RegistryError};
