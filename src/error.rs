use crate::{dispatch::ValidationError, execution::ExecutionError, secrets::EnvParseError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    EnvParse(#[from] EnvParseError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl Error {
    /// Short machine-readable kind, used by the JSON printer.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::EnvParse(_) => "env-parse",
            Error::Execution(_) => "execution",
        }
    }
}
