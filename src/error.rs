use std::io;
use thiserror::Error;

use crate::slack::ApiError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("SLACK_TOKEN environment variable not set")]
    MissingToken,

    #[error("Slack API error: {0}")]
    SlackApi(#[from] ApiError),

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("failed to read file at {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file at {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON serialization error: {0}")]
    JsonSerialize(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::time::Duration;

    #[test]
    fn test_missing_token_display() {
        let err = AppError::MissingToken;
        assert_eq!(err.to_string(), "SLACK_TOKEN environment variable not set");
    }

    #[test]
    fn test_api_error_display() {
        let err = AppError::SlackApi(ApiError::NotInChannel);
        assert_eq!(err.to_string(), "Slack API error: not_in_channel");
    }

    #[test]
    fn test_api_error_from_conversion() {
        let err: AppError = ApiError::RateLimited {
            retry_after: Duration::from_secs(30),
        }
        .into();
        assert!(matches!(err, AppError::SlackApi(ApiError::RateLimited { .. })));
    }

    #[test]
    fn test_read_file_display() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = AppError::ReadFile {
            path: "/path/to/settings.toml".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("/path/to/settings.toml"));
        assert!(err.to_string().contains("failed to read file"));
    }

    #[test]
    fn test_write_file_display() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let err = AppError::WriteFile {
            path: "/path/to/output.json".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("/path/to/output.json"));
        assert!(err.to_string().contains("failed to write file"));
    }

    #[test]
    fn test_write_file_source() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let err = AppError::WriteFile {
            path: "/path/to/output.json".to_string(),
            source: io_err,
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn test_json_serialize_display() {
        let err = AppError::JsonSerialize("invalid utf-8".to_string());
        assert_eq!(err.to_string(), "JSON serialization error: invalid utf-8");
    }

    #[test]
    fn test_toml_parse_display() {
        let err = AppError::TomlParse("invalid toml".to_string());
        assert_eq!(err.to_string(), "TOML parse error: invalid toml");
    }

    #[test]
    fn test_error_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AppError>();
    }

    #[test]
    fn test_error_is_sync() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<AppError>();
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err(AppError::MissingToken);
        assert!(result.is_err());
    }
}
