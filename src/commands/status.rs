use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::graph::GraphStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("graph.sqlite"));

    if !db_path.exists() {
        warn!(path = %db_path.display(), "store file missing");
        return Ok(());
    }

    let store = GraphStore::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;

    let graphs = store.graph_names()?;
    if graphs.is_empty() {
        warn!(path = %db_path.display(), "no graphs in catalog");
        return Ok(());
    }

    for graph in &graphs {
        let nodes = store.count_nodes(graph)?;
        let edges = store.count_edges(graph)?;
        info!(graph = %graph, nodes, edges, "graph status");

        for status in store.label_statuses(graph)? {
            info!(
                graph = %graph,
                label = %status.label,
                kind = %status.kind,
                tag = status.tag,
                rows = status.rows,
                "label status"
            );
        }
    }

    Ok(())
}
