use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::graph::catalog::LabelKind;
use crate::loader::IntegrityMode;

#[derive(Parser, Debug)]
#[command(
    name = "bulkgraph",
    version,
    about = "Bulk property-graph loading via direct table writes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Bootstrap(BootstrapArgs),
    Load(LoadArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BootstrapArgs {
    #[arg(long, default_value = ".cache/bulkgraph")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value = "main")]
    pub graph: String,

    #[arg(long)]
    pub label: String,

    #[arg(long, value_enum, default_value_t = LabelKindArg::Node)]
    pub kind: LabelKindArg,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    #[arg(long, default_value = ".cache/bulkgraph")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value = "main")]
    pub graph: String,

    /// JSON batch file with top-level "nodes" and "edges" arrays.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long, value_enum, default_value_t = IntegrityModeArg::Abort)]
    pub integrity: IntegrityModeArg,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/bulkgraph")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LabelKindArg {
    Node,
    Edge,
}

impl LabelKindArg {
    pub fn to_kind(self) -> LabelKind {
        match self {
            Self::Node => LabelKind::Node,
            Self::Edge => LabelKind::Edge,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum IntegrityModeArg {
    /// Fail the whole batch on duplicate ids or unresolved endpoints.
    Abort,
    /// Drop offending rows, commit the rest, report the rejected ids.
    Reject,
}

impl IntegrityModeArg {
    pub fn to_mode(self) -> IntegrityMode {
        match self {
            Self::Abort => IntegrityMode::Abort,
            Self::Reject => IntegrityMode::Reject,
        }
    }
}
