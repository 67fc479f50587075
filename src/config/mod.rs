//! Configuration for the resize watcher
//!
//! - **policy**: the validated `Policy` the daemon runs with
//! - **loader**: drop-in discovery, per-file parsing and merging

mod loader;
pub mod policy;

pub use loader::load_policy;
pub use policy::Policy;
