use physim_document::NodePath;

/// A schema that cannot be used for validation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid schema at {path}: {reason}")]
    Invalid { path: NodePath, reason: String },
    #[error("schema JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn invalid(path: &NodePath, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}
