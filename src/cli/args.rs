//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::cli::table::SortColumn;
use crate::domain::{EntityKind, IndexStrategy};

/// Reconcile two independently edited annotation projects: match trees by geometry and diff them
#[derive(Parser, Debug)]
#[command(name = "treemerge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Turn debugging information on (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Extra config file, merged over global and local config
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match the entities of two project snapshots and report differences
    Compare {
        /// Left project snapshot (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        left: PathBuf,

        /// Right project snapshot (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        right: PathBuf,

        /// Worker threads (0 = one per core)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Node lookup strategy: grid or linear
        #[arg(long)]
        index: Option<IndexStrategy>,

        /// Per-axis coordinate tolerance
        #[arg(long)]
        tolerance: Option<f64>,

        /// Accepted entity kinds, comma separated (replaces configured kinds)
        #[arg(long, value_delimiter = ',')]
        accept: Vec<EntityKind>,

        /// Column to sort matched rows by
        #[arg(short, long, value_enum, default_value_t = SortColumn::Id1)]
        sort: SortColumn,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Print per-node tag differences
        #[arg(long)]
        tags: bool,

        /// Print bucket counts only
        #[arg(long)]
        summary: bool,
    },

    /// Print the node trees of a project snapshot
    Show {
        /// Project snapshot (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        project: PathBuf,

        /// Only this entity id
        #[arg(short, long)]
        entity: Option<u64>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a commented config template
    Template,

    /// Show config paths
    Path,
}
