use anyhow::{Context, Result};
use tracing::info;

use crate::cli::BootstrapArgs;
use crate::graph::GraphStore;
use crate::loader::DirectLoader;
use crate::util::ensure_directory;

pub fn run(args: BootstrapArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("graph.sqlite"));
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }

    let mut store = GraphStore::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    store.ensure_graph(&args.graph)?;

    let loader = DirectLoader::default();
    let kind = args.kind.to_kind();
    let outcome = loader.bootstrap_label(&mut store, &args.graph, &args.label, kind)?;

    info!(
        graph = %args.graph,
        label = %args.label,
        kind = kind.as_str(),
        created = outcome.created,
        tag = outcome.tag,
        "label bootstrapped"
    );

    Ok(())
}
