use std::path::Path;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KitmigError {
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File '{path}' is not valid UTF-8")]
    NonUtf8 { path: String },

    #[error("'{path}' is neither a file nor a directory")]
    InvalidPath { path: String },

    #[error("'{path}' does not look like a test file")]
    NotATestFile { path: String },

    #[error("No package.json found above '{path}'")]
    ProjectRootMissing { path: String },

    #[error("Tree-sitter language initialization failed: {message}")]
    LanguageSetup { message: String },

    #[error("Failed to parse '{path}': {message}")]
    ParseFailure { path: String, message: String },

    #[error("Invalid edit batch: {message}")]
    InvalidEdit { message: String },

    #[error("Failed to serialize response JSON: {source}")]
    ResponseSerialization {
        #[source]
        source: serde_json::Error,
    },
}

impl KitmigError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let (r#type, suggestion) = match self {
            Self::Io { .. } | Self::NonUtf8 { .. } => ("io_error", None),
            Self::InvalidPath { .. } => (
                "invalid_path",
                Some("Pass a test file or a directory containing test files".to_string()),
            ),
            Self::NotATestFile { .. } => (
                "not_a_test_file",
                Some(
                    "Single-file runs accept only *.test.*, *.spec.* or *.vitest.* files"
                        .to_string(),
                ),
            ),
            Self::ProjectRootMissing { .. } => (
                "project_root_missing",
                Some("Run inside an npm project or pass --skip-format".to_string()),
            ),
            Self::LanguageSetup { .. } | Self::ParseFailure { .. } => ("parse_failure", None),
            Self::InvalidEdit { .. } => ("invalid_edit", None),
            Self::ResponseSerialization { .. } => ("serialization_error", None),
        };

        ErrorResponse {
            error: ErrorBody {
                r#type: r#type.to_string(),
                message: self.to_string(),
                suggestion,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub r#type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::KitmigError;

    fn assert_error_type(
        error: KitmigError,
        expected_type: &str,
        expected_suggestion_substring: Option<&str>,
    ) {
        let response = error.to_error_response();
        assert_eq!(response.error.r#type, expected_type);

        match (
            response.error.suggestion.as_deref(),
            expected_suggestion_substring,
        ) {
            (Some(actual), Some(expected_substring)) => {
                assert!(
                    actual.contains(expected_substring),
                    "suggestion should contain '{expected_substring}', got '{actual}'"
                );
            }
            (None, None) => {}
            (actual, expected) => {
                panic!("suggestion mismatch; actual={actual:?}, expected_contains={expected:?}")
            }
        }
    }

    #[test]
    fn io_errors_map_to_io_error_without_suggestion() {
        let io_error = std::io::Error::other("boom");
        assert_error_type(
            KitmigError::Io {
                path: "fixture.test.ts".to_string(),
                source: io_error,
            },
            "io_error",
            None,
        );
        assert_error_type(
            KitmigError::NonUtf8 {
                path: "fixture.test.ts".to_string(),
            },
            "io_error",
            None,
        );
    }

    #[test]
    fn path_errors_carry_recovery_suggestions() {
        assert_error_type(
            KitmigError::InvalidPath {
                path: "missing".to_string(),
            },
            "invalid_path",
            Some("test file or a directory"),
        );
        assert_error_type(
            KitmigError::NotATestFile {
                path: "index.ts".to_string(),
            },
            "not_a_test_file",
            Some("*.vitest.*"),
        );
        assert_error_type(
            KitmigError::ProjectRootMissing {
                path: "/tmp/x.test.ts".to_string(),
            },
            "project_root_missing",
            Some("--skip-format"),
        );
    }

    #[test]
    fn parse_related_errors_share_the_parse_failure_type() {
        assert_error_type(
            KitmigError::ParseFailure {
                path: "fixture.test.ts".to_string(),
                message: "syntax error".to_string(),
            },
            "parse_failure",
            None,
        );
        assert_error_type(
            KitmigError::LanguageSetup {
                message: "init error".to_string(),
            },
            "parse_failure",
            None,
        );
    }
}
