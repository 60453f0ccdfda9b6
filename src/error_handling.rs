//! Standardized error types for the SQL agent
//!
//! Collaborator failures travel as [`AgentError`]. Validation problems never
//! do: they are data inside a verdict and drive the retry loop instead.
//! Timeouts are imposed by the orchestrator and reported as turn failures.

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("SQL generation error: {message}")]
    Generation {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Query execution error: {message}")]
    Execution {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Schema error: {message}")]
    Schema { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AgentError {
    pub fn generation<S: Into<String>>(message: S) -> Self {
        Self::Generation {
            message: message.into(),
            source: None,
        }
    }

    pub fn generation_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::Generation {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn execution<S: Into<String>>(message: S) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    pub fn execution_with_source<S: Into<String>>(message: S, source: anyhow::Error) -> Self {
        Self::Execution {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn schema<S: Into<String>>(message: S) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Stable code for logs and machine consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Generation { .. } => "GENERATION_ERROR",
            Self::Execution { .. } => "EXECUTION_ERROR",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_messages() {
        let err = AgentError::execution("backend unavailable");
        assert_eq!(err.error_code(), "EXECUTION_ERROR");
        assert_eq!(err.to_string(), "Query execution error: backend unavailable");

        let err = AgentError::schema("dictionary table missing");
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
        assert!(err.to_string().contains("dictionary table missing"));
    }

    #[test]
    fn test_anyhow_conversion_keeps_source() {
        let err: AgentError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AgentError::Internal { source: Some(_), .. }));
    }
}
