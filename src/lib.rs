//! treemerge: reconcile two independently edited spatial annotation projects.
//!
//! Entities are trees of positioned, tagged nodes. The engine pairs the entities of two
//! projects that share geometrically identical nodes, describes how each pair differs,
//! and sorts every remaining entity into unmatched or empty buckets.
//!
//! Layers, innermost first:
//! - [`domain`]: data model, geometric keys, node indices, pairwise comparison
//! - [`application`]: classification, the parallel matcher, reports, services
//! - [`infrastructure`]: I/O boundary traits, snapshot loading, DI container
//! - [`cli`]: argument parsing, command dispatch, terminal output

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
