use std::path::PathBuf;

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Persist error at {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Aggregation,
    Render,
    Persist,
}

impl ReportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Aggregation(_) | Self::Polars(_) => ErrorCategory::Aggregation,
            Self::Render(_) => ErrorCategory::Render,
            Self::Persist { .. } | Self::Io(_) => ErrorCategory::Persist,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

impl<E> From<DrawingAreaErrorKind<E>> for ReportError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        ReportError::Render(err.to_string())
    }
}

impl From<image::ImageError> for ReportError {
    fn from(err: image::ImageError) -> Self {
        ReportError::Render(format!("PNG encoding failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(
            ReportError::Configuration("x".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ReportError::Aggregation("x".into()).category(),
            ErrorCategory::Aggregation
        );
        assert_eq!(ReportError::Render("x".into()).category(), ErrorCategory::Render);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(ReportError::from(io).category(), ErrorCategory::Persist);
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(ReportError::Configuration("empty districts".into()).is_fatal());
        assert!(!ReportError::Render("bad encoding".into()).is_fatal());
    }

    #[test]
    fn persist_error_mentions_path() {
        let err = ReportError::Persist {
            path: PathBuf::from("graphs/01_avg_yield_line.png"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("graphs/01_avg_yield_line.png"));
        assert!(msg.contains("disk full"));
    }
}
