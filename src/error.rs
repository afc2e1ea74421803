use thiserror::Error;

/// Errors that abort an analysis run.
///
/// Estimators report invalid input as plain `String`s; those are wrapped
/// into [`AnalysisError::Model`] when they cross into the pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to fetch dataset: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected at least {expected} fields, found {found}")]
    Schema {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: cannot parse {column} value {token:?}")]
    Parse {
        line: usize,
        column: &'static str,
        token: String,
    },

    #[error("line {line}: unknown origin code {code}")]
    UnknownOrigin { line: usize, code: String },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("model error: {0}")]
    Model(String),
}

impl From<String> for AnalysisError {
    fn from(message: String) -> Self {
        AnalysisError::Model(message)
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_errors_become_model_errors() {
        let err: AnalysisError = "Matrix is singular".to_string().into();
        assert!(matches!(err, AnalysisError::Model(_)));
        assert_eq!(err.to_string(), "model error: Matrix is singular");
    }

    #[test]
    fn test_schema_error_message() {
        let err = AnalysisError::Schema { line: 3, expected: 9, found: 7 };
        assert_eq!(err.to_string(), "line 3: expected at least 9 fields, found 7");
    }
}
