//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::report::{render_collision, render_search_table};
use crate::application::services::ImportanceRequest;
use crate::cli::args::{Cli, Commands, ConfigCommands, ImportanceArgs, LayoutCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::FloorPolicy;
use crate::infrastructure::{InfraError, ServiceContainer};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `ringscore --help`".into(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => _config(cli, command),
        Commands::Importance(args) => _importance(&container(cli)?, args),
        Commands::Layout { command } => match command {
            LayoutCommands::Search { tree, gaps, report } => {
                if let Some(gaps) = gaps {
                    gaps.iter().try_for_each(|&gap| check_gap(gap))?;
                }
                _layout_search(&container(cli)?, tree, gaps.as_deref(), report.as_deref())
            }
            LayoutCommands::Check { tree, gap } => {
                check_gap(*gap)?;
                _layout_check(&container(cli)?, tree, *gap)
            }
        },
        Commands::Tree { tree } => _tree(&container(cli)?, tree),
    }
}

fn check_gap(gap: f64) -> CliResult<()> {
    if gap.is_finite() && gap > 0.0 {
        Ok(())
    } else {
        Err(CliError::InvalidArgs(format!("ring gap must be positive, got {gap}")))
    }
}

fn project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("resolve current directory", e).into()),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let dir = project_dir(cli)?;
    let settings = Settings::load(Some(&dir), cli.config.as_deref())?;
    debug!("settings loaded for {}", dir.display());
    Ok(settings)
}

fn container(cli: &Cli) -> CliResult<ServiceContainer> {
    Ok(ServiceContainer::new(load_settings(cli)?))
}

/// Floor from flags, falling back to the configuration.
///
/// `--no-floor` wins; `--floor-percentage` implies `--floor`.
fn floor_policy(args: &ImportanceArgs, settings: &Settings) -> Option<FloorPolicy> {
    let importance = &settings.importance;
    let enabled = if args.no_floor {
        false
    } else {
        args.floor || args.floor_percentage.is_some() || importance.floor.enabled
    };
    enabled.then(|| FloorPolicy {
        layer: importance.outcome_layer,
        percentage: args
            .floor_percentage
            .unwrap_or(importance.floor.percentage),
    })
}

#[instrument(skip_all)]
fn _importance(container: &ServiceContainer, args: &ImportanceArgs) -> CliResult<()> {
    let settings = &container.settings;
    let mut request =
        ImportanceRequest::from_settings(args.tree.clone(), args.scores.clone(), settings);
    if let Some(dir) = &args.out_dir {
        request.out_dir = dir.clone();
    }
    if let Some(path) = &args.tree_out {
        request.tree_out = path.clone();
    }
    request.floor = floor_policy(args, settings);

    let run = container.importance.run(&request)?;

    output::header("Validation checks");
    for check in &run.validation.checks {
        match (check.passed, &check.note) {
            (true, _) => output::passed(&check.name),
            (false, Some(note)) => output::failure(&format!("{} ({})", check.name, note)),
            (false, None) => output::failure(&check.name),
        }
    }
    for warning in &run.report.warnings {
        output::warning(warning);
    }

    let summary = &run.report.summary;
    output::header("Summary");
    output::detail(&format!("Total nodes: {}", summary.total_nodes));
    output::detail(&format!(
        "Nodes with importance > 0: {} ({}%)",
        summary.nodes_with_importance, summary.coverage_percentage
    ));
    output::detail(&format!("Outcomes boosted: {}", run.importance.boosted_count()));
    for path in &run.written {
        output::action("Wrote", &path.display());
    }

    if run.passed() {
        output::success("All validation checks passed");
        Ok(())
    } else {
        let failed = run.validation.failures().count();
        Err(CliError::ValidationFailed(format!(
            "{} of {} checks failed",
            failed,
            run.validation.checks.len()
        )))
    }
}

#[instrument(skip(container))]
fn _layout_search(
    container: &ServiceContainer,
    tree: &Path,
    gaps: Option<&[f64]>,
    report: Option<&Path>,
) -> CliResult<()> {
    let outcome = container.layout.search(tree, gaps)?;
    output::info(&format!("Tested {} configurations\n", outcome.ranked.len()));
    output::info(&render_search_table(&outcome));

    let best = outcome.best();
    if outcome.collision_free {
        output::header("\nSmallest collision-free configuration");
    } else {
        output::warning(&format!(
            "no collision-free configuration found, best has {} collisions",
            best.collisions
        ));
        output::header("\nBest compromise");
    }
    output::detail(&best.candidate.label());
    output::detail(&format!("Max radius: {:.0}px", best.max_radius));
    output::detail(&format!("Avg actual node size: {:.2}px", best.avg_actual_size));
    let radii: Vec<String> = best.rings.iter().map(|ring| format!("{}", ring.radius)).collect();
    output::detail(&format!("Radii: [{}]", radii.join(", ")));

    if let Some(path) = report {
        container.layout.write_report(&outcome, path)?;
        output::action("Wrote", &path.display());
    }
    Ok(())
}

#[instrument(skip(container))]
fn _layout_check(container: &ServiceContainer, tree: &Path, gap: f64) -> CliResult<()> {
    let check = container.layout.check(tree, gap)?;

    output::header(&format!("Equal spacing, {}", check.candidate.label()));
    output::detail(&format!("Collisions: {}", check.collisions.count));
    output::detail(&format!("Max radius: {}", check.max_radius));

    if check.collisions.count > 0 {
        let limit = container.settings.layout.detail_limit;
        output::detail(&format!("Collision details (first {limit}):"));
        for collision in check.collisions.details.iter().take(limit) {
            output::detail(&format!("  {}", render_collision(collision)));
        }
    } else {
        output::success("No collisions");
    }
    Ok(())
}

fn _tree(container: &ServiceContainer, tree: &Path) -> CliResult<()> {
    let rendered = container.hierarchy.render(tree)?;
    output::info(&rendered);
    Ok(())
}

fn _config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let marker = |path: &Path| if path.exists() { "exists" } else { "not found" };
            match global_config_path() {
                Some(path) => output::info(&format!("global: {} ({})", path.display(), marker(&path))),
                None => output::warning("no home directory, global config disabled"),
            }
            let local = local_config_path(&project_dir(cli)?);
            output::info(&format!("local:  {} ({})", local.display(), marker(&local)));
        }
    }
    Ok(())
}
