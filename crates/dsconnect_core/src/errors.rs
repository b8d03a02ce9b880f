use arrow::error::ArrowError;

/// Failure to turn a module/handler reference into a usable handler.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("The module '{module}' could not be found")]
    Module { module: String },

    #[error("The handler '{handler}' could not be found in the module '{module}'")]
    Handler { handler: String, module: String },

    #[error("The handler '{handler}' in the module '{module}' does not provide the {role} capability")]
    Capability {
        handler: String,
        module: String,
        role: &'static str,
    },
}

impl ResolutionError {
    /// Which resolution stage failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Module { .. } => "module",
            Self::Handler { .. } => "handler",
            Self::Capability { .. } => "capability",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("The address '{address}' is malformed: {reason}")]
    MalformedAddress { address: String, reason: String },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(
        "The event name '{0}' already exists in the event catalog and does not need to be added"
    )]
    DuplicateKey(String),

    #[error("The {kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    #[error("The source format {0} is not currently supported")]
    UnsupportedFormat(String),

    #[error("The file format {0} is not currently supported for write")]
    UnsupportedWriteFormat(String),

    #[error("The schema must be {expected}, {given} given")]
    SchemeMismatch {
        expected: &'static str,
        given: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Registration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    External(#[from] Box<dyn std::error::Error + Sync + Send>),
}

impl ConnectorError {
    pub fn malformed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        ConnectorError::MalformedAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn event_not_found(name: impl Into<String>) -> Self {
        ConnectorError::NotFound {
            kind: "event",
            name: name.into(),
        }
    }
}

pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;
