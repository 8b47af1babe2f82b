//! Handler and pipeline error types.

use netsync_env::EnvError;
use thiserror::Error;

/// Why a single handler could not (fully) apply a record.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to update {scope} environment: {source}")]
    Store {
        scope: String,
        #[source]
        source: EnvError,
    },
}

impl HandlerError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// One or more handlers reported errors; successful siblings were
    /// still applied.
    #[error("handler errors: {}", format_errors(.0))]
    Handlers(Vec<(&'static str, HandlerError)>),
}

impl PipelineError {
    pub fn errors(&self) -> &[(&'static str, HandlerError)] {
        match self {
            PipelineError::Handlers(errors) => errors,
        }
    }
}

fn format_errors(errors: &[(&'static str, HandlerError)]) -> String {
    errors
        .iter()
        .map(|(handler, e)| format!("{handler}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}
