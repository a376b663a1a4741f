//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (ProgressSink, FileSystem)
//! but are themselves concrete structs, not traits.

mod merge;

pub use merge::MergeService;
