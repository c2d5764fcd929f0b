//! Local inspection tool for flat node exports.
//!
//! # Responsibility
//! - Run the tree engine over a JSON file without the Flutter runtime.
//! - Print results as pretty JSON on stdout.

use clap::{Parser, Subcommand, ValueEnum};
use docnav_core::{
    build_tree, check_invariants, default_log_level, init_logging, keep_all_documents,
    move_targets, normalize_selection, prune_empty_folders, resolve_neighbors, toggle_selection,
    FlatNode, Selection, SelectionMode, Tree,
};
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "docnav")]
#[command(about = "Inspect document trees built from flat node lists")]
struct Cli {
    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// Log level used with --log-dir
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the nested tree
    Tree {
        /// JSON file holding an array of flat nodes
        input: PathBuf,
    },

    /// Print a directory picker view
    Prune {
        input: PathBuf,

        /// Folder-only view for moving this node
        #[arg(short, long)]
        moving: Option<String>,
    },

    /// Print the (parent, prev, next) triple of one node
    Neighbors {
        input: PathBuf,

        id: String,
    },

    /// Toggle nodes in order and print the resulting selection
    Select {
        input: PathBuf,

        /// Ids to toggle, in order
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(short, long, value_enum, default_value = "cascading")]
        mode: ModeArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Independent,
    Cascading,
}

impl From<ModeArg> for SelectionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Independent => SelectionMode::Independent,
            ModeArg::Cascading => SelectionMode::Cascading,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("docnav: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let value = match &cli.command {
        Command::Tree { input } => {
            let tree = load_tree(input)?;
            check_invariants(&tree)?;
            serde_json::to_value(&tree)?
        }
        Command::Prune { input, moving } => {
            let tree = load_tree(input)?;
            let view = match moving.as_deref() {
                Some(moving) => move_targets(&tree, Some(moving)),
                None => prune_empty_folders(&tree, keep_all_documents),
            };
            serde_json::to_value(&view)?
        }
        Command::Neighbors { input, id } => {
            let tree = load_tree(input)?;
            let payload = resolve_neighbors(&tree, id)
                .ok_or_else(|| format!("tree node not found: {id}"))?;
            serde_json::to_value(&payload)?
        }
        Command::Select { input, ids, mode } => {
            let tree = load_tree(input)?;
            let mode = SelectionMode::from(*mode);
            let mut selection = Selection::new();
            for id in ids {
                if !tree.contains(id) {
                    return Err(format!("tree node not found: {id}").into());
                }
                selection = toggle_selection(&tree, &selection, id, mode);
            }
            serde_json::to_value(normalize_selection(&tree, &selection, mode))?
        }
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn load_tree(path: &Path) -> Result<Tree, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read `{}`: {err}", path.display()))?;
    let records: Vec<FlatNode> = serde_json::from_str(&raw)
        .map_err(|err| format!("invalid node list in `{}`: {err}", path.display()))?;
    let count = records.len();
    let tree = build_tree(records);
    info!(
        "event=cli_load module=cli status=ok records={} nodes={}",
        count,
        tree.node_count()
    );
    Ok(tree)
}
