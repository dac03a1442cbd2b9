/// Failures of the admin edit screens. Validation failures are not here:
/// they re-render the screen instead of escaping.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{entity}.{field} is not a one-to-one or foreign key field")]
    NotAReference { entity: String, field: String },

    #[error("{entity} has no field named '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("The field {0} cannot be referenced.")]
    DisallowedToField(String),

    #[error("{name} object with primary key {key:?} does not exist.")]
    NotFound { name: String, key: String },

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Transaction aborted: {0}")]
    TransactionAborted(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AdminError {
    /// Configuration errors surface at construction time, never per request
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AdminError::NotAReference { .. } | AdminError::UnknownField { .. } | AdminError::UnknownEntity(_)
        )
    }
}
