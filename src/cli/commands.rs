//! Command dispatch

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::cli::table::{self, SortColumn};
use crate::cli::tree_view::TreeView;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{EntityId, EntityKind, IndexStrategy};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Flags of `compare` that override settings.
#[derive(Debug, Default)]
struct CompareOverrides<'a> {
    threads: Option<usize>,
    index: Option<IndexStrategy>,
    tolerance: Option<f64>,
    accept: &'a [EntityKind],
    tags: bool,
}

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Compare {
            left,
            right,
            threads,
            index,
            tolerance,
            accept,
            sort,
            desc,
            tags,
            summary,
        }) => {
            let overrides = CompareOverrides {
                threads: *threads,
                index: *index,
                tolerance: *tolerance,
                accept,
                tags: *tags,
            };
            let settings = apply_overrides(load_settings(cli)?, &overrides);
            _compare(settings, left, right, *sort, *desc, *summary)
        }
        Some(Commands::Show { project, entity }) => _show(load_settings(cli)?, project, *entity),
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => _config_show(&load_settings(cli)?),
            ConfigCommands::Template => {
                output::info(&Settings::template());
                Ok(())
            }
            ConfigCommands::Path => _config_path(),
        },
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see treemerge --help".to_string(),
        )),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let cwd = std::env::current_dir().map_err(|e| InfraError::io("resolve working directory", e))?;
    let settings = Settings::load_with(Some(&cwd), cli.config.as_deref())?;
    if !settings.output.color {
        colored::control::set_override(false);
    }
    Ok(settings)
}

fn apply_overrides(mut settings: Settings, o: &CompareOverrides<'_>) -> Settings {
    if let Some(threads) = o.threads {
        settings.matching.threads = threads;
    }
    if let Some(index) = o.index {
        settings.matching.index = index;
    }
    if let Some(tolerance) = o.tolerance {
        settings.matching.tolerance = tolerance;
    }
    if !o.accept.is_empty() {
        settings.matching.accepted_kinds = o.accept.iter().map(|k| k.as_str().to_string()).collect();
    }
    settings.output.show_tags |= o.tags;
    settings
}

#[instrument(skip(settings))]
fn _compare(
    settings: Settings,
    left: &Path,
    right: &Path,
    sort: SortColumn,
    desc: bool,
    summary_only: bool,
) -> CliResult<()> {
    let show_tags = settings.output.show_tags;
    let container = ServiceContainer::new(settings);
    let p1 = container.loader.load(left)?;
    let p2 = container.loader.load(right)?;
    let service = container.merge_service()?;
    debug!(options = ?service.options(), "compare");

    let result = service.compare(&p1, &p2)?;

    for failure in &result.failures {
        output::warning(&format!("comparison of {} failed: {}", failure.entity, failure.message));
    }
    if result.pair_failures > 0 {
        output::warning(&format!("{} candidate pairs could not be compared", result.pair_failures));
    }

    if !summary_only {
        let mut rows = table::build_rows(&result, &p1, &p2);
        table::sort_rows(&mut rows, sort, desc);
        output::info(&table::render(&rows, show_tags));
        output::info("");
        output::info(&table::render_ids("Unmatched 1", &result.unmatched1, &p1));
        output::info(&table::render_ids("Unmatched 2", &result.unmatched2, &p2));
        output::info(&table::render_ids("Empty 1", &result.empty1, &p1));
        output::info(&table::render_ids("Empty 2", &result.empty2, &p2));
        output::info("");
    }
    output::action("Summary", &result.summary());
    Ok(())
}

#[instrument(skip(settings))]
fn _show(settings: Settings, project: &Path, entity: Option<u64>) -> CliResult<()> {
    let container = ServiceContainer::new(settings);
    let project = container.loader.load(project)?;

    match entity {
        Some(id) => {
            let e = project
                .find(EntityId(id))
                .ok_or_else(|| CliError::InvalidArgs(format!("no entity #{id} in '{}'", project.name)))?;
            output::info(&e.to_tree_string());
        }
        None => {
            output::header(&format!("{} ({} entities)", project.name, project.entities.len()));
            for e in &project.entities {
                output::info(&e.to_tree_string());
            }
        }
    }
    Ok(())
}

fn _config_show(settings: &Settings) -> CliResult<()> {
    output::info(&settings.to_toml()?);
    Ok(())
}

fn _config_path() -> CliResult<()> {
    let marker = |p: &Path| if p.exists() { "exists" } else { "not found" };
    match global_config_path() {
        Some(path) => output::action("Global", &format!("{} ({})", path.display(), marker(&path))),
        None => output::action("Global", &"no config directory on this platform"),
    }
    let cwd = std::env::current_dir().map_err(|e| InfraError::io("resolve working directory", e))?;
    let local = local_config_path(&cwd);
    output::action("Local", &format!("{} ({})", local.display(), marker(&local)));
    Ok(())
}
