//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Hierarchical importance scores and collision-free radial layouts for layered trees
#[derive(Parser, Debug)]
#[command(name = "ringscore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub debug: u8,

    /// Project directory holding .ringscore.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Additional config file, applied after global and local config
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute hierarchical importance and write the enriched tree and reports
    Importance(ImportanceArgs),

    /// Search ring radii for a collision-free radial layout
    Layout {
        #[command(subcommand)]
        command: LayoutCommands,
    },

    /// Show the hierarchy as a tree
    Tree {
        /// Tree document (JSON with a `nodes` array)
        #[arg(long, value_hint = ValueHint::FilePath)]
        tree: PathBuf,
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

#[derive(clap::Args, Debug)]
pub struct ImportanceArgs {
    /// Tree document (JSON with a `nodes` array)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub tree: PathBuf,

    /// Per-leaf score records (JSON object keyed by leaf id)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub scores: PathBuf,

    /// Directory for metadata, validation report and summary
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,

    /// Where to write the enriched tree (default: overwrite --tree)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub tree_out: Option<PathBuf>,

    /// Apply the outcome floor
    #[arg(long, overrides_with = "no_floor")]
    pub floor: bool,

    /// Do not apply the outcome floor
    #[arg(long, overrides_with = "floor")]
    pub no_floor: bool,

    /// Floor as a fraction of the top outcome (implies --floor)
    #[arg(long, value_parser = parse_fraction)]
    pub floor_percentage: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum LayoutCommands {
    /// Rank ring-spacing candidates
    Search {
        /// Importance-enriched tree document
        #[arg(long, value_hint = ValueHint::FilePath)]
        tree: PathBuf,

        /// Ring gaps to sweep (default: configured gaps)
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        gaps: Option<Vec<f64>>,

        /// Write a JSON report of all candidates
        #[arg(long, value_hint = ValueHint::FilePath)]
        report: Option<PathBuf>,
    },

    /// Count collisions for one equal-spacing configuration
    Check {
        /// Importance-enriched tree document
        #[arg(long, value_hint = ValueHint::FilePath)]
        tree: PathBuf,

        /// Ring gap in pixels
        #[arg(long)]
        gap: f64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a commented template config
    Template,
    /// Show config file locations
    Path,
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not within [0, 1]"))
    }
}
