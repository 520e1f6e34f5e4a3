use plotters::drawing::DrawingAreaErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure a user action can run into.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("cannot read {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid submission: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("unsupported plot type: {0}")]
    UnsupportedPlotType(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to render: {0}")]
    Render(String),
}

impl AppError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }
}

impl From<tera::Error> for AppError {
    fn from(e: tera::Error) -> Self {
        // Tera keeps the useful part (template name, line, missing variable) in the source chain
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        AppError::Render(message)
    }
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for AppError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        AppError::Render(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
