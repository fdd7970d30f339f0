use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::LoadArgs;
use crate::graph::GraphStore;
use crate::graph::catalog::LabelKind;
use crate::loader::{DirectLoader, EdgeEntity, LoaderConfig, NodeEntity};
use crate::model::{
    BatchFile, LabelLoadSummary, LoadCounts, LoadPaths, LoadRunManifest, NodeRecord,
};
use crate::util::{
    ensure_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

pub fn run(args: LoadArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("load-{}", utc_compact_string(started_ts));

    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("graph.sqlite"));
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("load_run_{}.json", utc_compact_string(started_ts)))
    });

    info!(
        graph = %args.graph,
        input = %args.input.display(),
        run_id = %run_id,
        "starting load"
    );

    let raw = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let batch_file: BatchFile = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let input_sha256 = sha256_file(&args.input)?;

    // A duplicate anywhere in the file is a caller error. Checked across the
    // whole file because chunked submission would otherwise turn a same-file
    // duplicate into an idempotent skip.
    check_file_duplicates(&batch_file)?;

    let mut store = GraphStore::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    store.ensure_graph(&args.graph)?;

    let loader = DirectLoader::new(LoaderConfig {
        integrity: args.integrity.to_mode(),
        ..LoaderConfig::default()
    });

    let node_groups = group_nodes(&batch_file.nodes);
    let edge_groups = group_edges(&batch_file.edges);

    let mut counts = LoadCounts {
        node_labels: node_groups.len(),
        edge_labels: edge_groups
            .keys()
            .map(|(label, _, _)| label.as_str())
            .collect::<HashSet<_>>()
            .len(),
        ..LoadCounts::default()
    };
    let mut labels = Vec::new();
    let mut warnings = Vec::new();

    for (label, rows) in &node_groups {
        loader.bootstrap_label(&mut store, &args.graph, label, LabelKind::Node)?;

        let mut summary = new_summary(label, LabelKind::Node);
        for chunk in chunks(rows, args.batch_size) {
            let report = loader.load_nodes(&mut store, &args.graph, label, chunk)?;
            info!(
                label = %label,
                staged = report.staged,
                inserted = report.inserted,
                skipped = report.skipped,
                "node batch loaded"
            );
            accumulate(&mut summary, report);
        }
        counts.nodes_staged += summary.staged;
        counts.nodes_inserted += summary.inserted;
        counts.nodes_skipped += summary.skipped;
        counts.nodes_rejected += summary.rejected.len();
        note_rejections(&mut warnings, &summary);
        labels.push(summary);
    }

    // Every node batch is committed before the first edge batch runs;
    // endpoint resolution only ever sees stored nodes.
    for ((label, start_label, end_label), rows) in &edge_groups {
        loader.bootstrap_label(&mut store, &args.graph, label, LabelKind::Edge)?;

        let mut summary = new_summary(label, LabelKind::Edge);
        for chunk in chunks(rows, args.batch_size) {
            let report =
                loader.load_edges(&mut store, &args.graph, label, chunk, start_label, end_label)?;
            info!(
                label = %label,
                start_label = %start_label,
                end_label = %end_label,
                staged = report.staged,
                inserted = report.inserted,
                skipped = report.skipped,
                "edge batch loaded"
            );
            accumulate(&mut summary, report);
        }
        counts.edges_staged += summary.staged;
        counts.edges_inserted += summary.inserted;
        counts.edges_skipped += summary.skipped;
        counts.edges_rejected += summary.rejected.len();
        note_rejections(&mut warnings, &summary);
        labels.push(summary);
    }

    let updated_at = now_utc_string();
    let manifest = LoadRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at,
        graph: args.graph.clone(),
        integrity_mode: loader.config().integrity.as_str().to_string(),
        input_sha256,
        paths: LoadPaths {
            cache_root: args.cache_root.display().to_string(),
            db_path: db_path.display().to_string(),
            input_path: args.input.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: counts.clone(),
        labels,
        warnings,
        notes: vec![
            "Node batches are committed before any edge batch is submitted.".to_string(),
            "Skipped rows are external ids already stored from an earlier run.".to_string(),
        ],
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote load run manifest");
    info!(
        nodes = counts.nodes_inserted,
        edges = counts.edges_inserted,
        skipped = counts.nodes_skipped + counts.edges_skipped,
        "load completed"
    );

    Ok(())
}

fn group_nodes(records: &[NodeRecord]) -> BTreeMap<String, Vec<NodeEntity>> {
    let mut groups: BTreeMap<String, Vec<NodeEntity>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.label.clone())
            .or_default()
            .push(NodeEntity {
                id: record.id.clone(),
                properties: record.properties.clone(),
            });
    }
    groups
}

type EdgeGroupKey = (String, String, String);

fn group_edges(records: &[crate::model::EdgeRecord]) -> BTreeMap<EdgeGroupKey, Vec<EdgeEntity>> {
    let mut groups: BTreeMap<EdgeGroupKey, Vec<EdgeEntity>> = BTreeMap::new();
    for record in records {
        groups
            .entry((
                record.label.clone(),
                record.start_label.clone(),
                record.end_label.clone(),
            ))
            .or_default()
            .push(EdgeEntity {
                id: record.id.clone(),
                start_id: record.start_id.clone(),
                end_id: record.end_id.clone(),
                properties: record.properties.clone(),
            });
    }
    groups
}

fn check_file_duplicates(batch_file: &BatchFile) -> Result<()> {
    let mut node_ids: HashMap<&str, HashSet<&str>> = HashMap::new();
    for record in &batch_file.nodes {
        if !node_ids
            .entry(record.label.as_str())
            .or_default()
            .insert(record.id.as_str())
        {
            bail!(
                "duplicate node id '{}' for label '{}' in input file",
                record.id,
                record.label
            );
        }
    }

    let mut edge_ids: HashMap<&str, HashSet<&str>> = HashMap::new();
    for record in &batch_file.edges {
        if !edge_ids
            .entry(record.label.as_str())
            .or_default()
            .insert(record.id.as_str())
        {
            bail!(
                "duplicate edge id '{}' for label '{}' in input file",
                record.id,
                record.label
            );
        }
    }

    Ok(())
}

fn chunks<T>(rows: &[T], batch_size: Option<usize>) -> std::slice::Chunks<'_, T> {
    let size = match batch_size {
        Some(size) if size > 0 => size,
        _ => rows.len().max(1),
    };
    rows.chunks(size)
}

fn new_summary(label: &str, kind: LabelKind) -> LabelLoadSummary {
    LabelLoadSummary {
        label: label.to_string(),
        kind: kind.as_str().to_string(),
        staged: 0,
        inserted: 0,
        skipped: 0,
        rejected: Vec::new(),
    }
}

fn accumulate(summary: &mut LabelLoadSummary, report: crate::loader::LoadReport) {
    summary.staged += report.staged;
    summary.inserted += report.inserted;
    summary.skipped += report.skipped;
    summary.rejected.extend(report.rejected);
}

fn note_rejections(warnings: &mut Vec<String>, summary: &LabelLoadSummary) {
    if !summary.rejected.is_empty() {
        warn!(
            label = %summary.label,
            rejected = summary.rejected.len(),
            "rows rejected by integrity filter"
        );
        warnings.push(format!(
            "label '{}': {} row(s) rejected by the integrity filter",
            summary.label,
            summary.rejected.len()
        ));
    }
}

#[cfg(test)]
mod tests;
