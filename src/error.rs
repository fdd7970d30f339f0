use thiserror::Error;

use crate::graph::catalog::LabelKind;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid {what} '{value}': letters, digits and underscore only, max 63 chars, must not start with a digit")]
    InvalidIdentifier { what: &'static str, value: String },

    #[error("graph '{0}' not found")]
    GraphNotFound(String),

    #[error("label '{0}' is not bootstrapped")]
    LabelNotBootstrapped(String),

    #[error("label '{label}' is bootstrapped as {actual}, expected {expected}")]
    KindMismatch {
        label: String,
        expected: LabelKind,
        actual: LabelKind,
    },

    #[error("batch of {len} rows exceeds the configured limit of {limit}")]
    BatchTooLarge { len: usize, limit: usize },

    #[error("duplicate external ids in '{label}' batch: {}", summarize_ids(.ids))]
    DuplicateExternalId { label: String, ids: Vec<String> },

    #[error("'{label}' batch references endpoints with no stored node: {}", summarize_ids(.ids))]
    OrphanedEndpoint { label: String, ids: Vec<String> },

    #[error("bootstrap failed for label '{label}'")]
    Bootstrap {
        label: String,
        #[source]
        source: Box<LoadError>,
    },

    #[error("bulk transfer error: {0}")]
    Transfer(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("property serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoadError {
    /// Stable machine-readable code, recorded in run manifests.
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            LoadError::GraphNotFound(_) => "GRAPH_NOT_FOUND",
            LoadError::LabelNotBootstrapped(_) => "LABEL_NOT_BOOTSTRAPPED",
            LoadError::KindMismatch { .. } => "LABEL_KIND_MISMATCH",
            LoadError::BatchTooLarge { .. } => "BATCH_TOO_LARGE",
            LoadError::DuplicateExternalId { .. } => "DUPLICATE_EXTERNAL_ID",
            LoadError::OrphanedEndpoint { .. } => "ORPHANED_ENDPOINT",
            LoadError::Bootstrap { .. } => "BOOTSTRAP_FAILED",
            LoadError::Transfer(_) => "TRANSFER_ERROR",
            LoadError::Store(_) => "STORE_ERROR",
            LoadError::Json(_) => "PROPERTY_ERROR",
        }
    }
}

const SUMMARIZED_IDS: usize = 5;

fn summarize_ids(ids: &[String]) -> String {
    let shown = ids
        .iter()
        .take(SUMMARIZED_IDS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > SUMMARIZED_IDS {
        format!("{shown} (and {} more)", ids.len() - SUMMARIZED_IDS)
    } else {
        shown
    }
}
