use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One node row from a batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// One edge row from a batch file. Endpoint references carry the label the
/// endpoint was loaded under plus its external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub label: String,
    pub start_id: String,
    pub start_label: String,
    pub end_id: String,
    pub end_label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchFile {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadPaths {
    pub cache_root: String,
    pub db_path: String,
    pub input_path: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct LoadCounts {
    pub node_labels: usize,
    pub edge_labels: usize,
    pub nodes_staged: usize,
    pub nodes_inserted: usize,
    pub nodes_skipped: usize,
    pub nodes_rejected: usize,
    pub edges_staged: usize,
    pub edges_inserted: usize,
    pub edges_skipped: usize,
    pub edges_rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelLoadSummary {
    pub label: String,
    pub kind: String,
    pub staged: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub graph: String,
    pub integrity_mode: String,
    pub input_sha256: String,
    pub paths: LoadPaths,
    pub counts: LoadCounts,
    pub labels: Vec<LabelLoadSummary>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

/// One catalog row plus its stored row count, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct LabelStatus {
    pub graph: String,
    pub label: String,
    pub kind: String,
    pub tag: i64,
    pub rows: i64,
}
