use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use thiserror::Error;

/// Failure kinds raised while unpacking an uploaded archive.
#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("storage client error during {operation}: {message}")]
    StorageClient {
        operation: &'static str,
        message: String,
    },

    #[error("parameter validation failed: {0}")]
    ParameterValidation(String),

    #[error("unknown value {value:?} for parameter {param}, expected one of {choices:?}")]
    UnknownParameter {
        param: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("uncategorized error: {0}")]
    Uncategorized(String),
}

impl UnpackError {
    /// Maps an SDK failure onto an error kind. Requests the SDK refused to
    /// build count as bad parameters, everything else is a client fault.
    pub fn from_sdk<E, R>(operation: &'static str, err: SdkError<E, R>) -> Self
    where
        E: std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match err {
            SdkError::ConstructionFailure(_) => {
                Self::ParameterValidation(format!("{operation}: {}", DisplayErrorContext(&err)))
            }
            _ => Self::StorageClient {
                operation,
                message: DisplayErrorContext(&err).to_string(),
            },
        }
    }

    /// Writes one log line for this error, shaped by its kind.
    pub fn log(&self) {
        match self {
            Self::StorageClient { operation, message } => {
                lambda_runtime::tracing::error!(operation, "Client error occurred: {}", message)
            }
            Self::ParameterValidation(message) => {
                lambda_runtime::tracing::error!("ParamValidation error occurred: {}", message)
            }
            Self::UnknownParameter {
                param,
                value,
                choices,
            } => lambda_runtime::tracing::error!(
                param = %param,
                value = %value,
                choices = ?choices,
                "UnknownParameter error occurred"
            ),
            Self::InvalidArchive(message) => {
                lambda_runtime::tracing::error!("InvalidArchive error occurred: {}", message)
            }
            Self::Uncategorized(message) => {
                lambda_runtime::tracing::error!("Exception occurred: {}", message)
            }
        }
    }
}

impl From<zip::result::ZipError> for UnpackError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::InvalidArchive(err.to_string())
    }
}
