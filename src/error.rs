/// Error taxonomy for batch selection, progress tracking and batch runs
///
/// Nothing here is fatal to the application: every variant is shown to the
/// user (status line or error dialog) and the batch window stays usable.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    /// Malformed input: wrong selector input shape, zero progress total, ...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A supplied path does not exist. Selectors recover from this by
    /// falling back to the interactive chooser.
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// A run was requested before a required field was selected
    #[error("no {0} selected")]
    MissingField(&'static str),

    /// Progress reported after the batch window was closed
    #[error("batch window is closed")]
    WindowClosed,

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failure inside the batch worker
    #[error("batch processing failed: {0}")]
    Upstream(String),
}

pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let e = BatchError::MissingField("batch folder");
        assert_eq!(e.to_string(), "no batch folder selected");

        let e = BatchError::Parse {
            path: PathBuf::from("cal.ref"),
            line: 3,
            message: "expected 3 columns".into(),
        };
        assert_eq!(e.to_string(), "cal.ref:3: expected 3 columns");
    }

    #[test]
    fn test_io_errors_convert() {
        fn open() -> BatchResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(BatchError::Io(_))));
    }
}
