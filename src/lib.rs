use chrono::Utc;

pub mod cli;
pub mod commands;
mod error;
pub mod export;
pub mod settings;
pub mod slack;

pub use cli::{Cli, Commands};
pub use error::{AppError, Result};

pub fn load_token() -> Result<String> {
    std::env::var("SLACK_TOKEN").map_err(|_| AppError::MissingToken)
}

/// One timestamp per run, shared by every channel file that run writes.
pub fn run_stamp_now() -> String {
    Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_stamp_format() {
        let stamp = run_stamp_now();
        assert_eq!(stamp.len(), 16);
        assert!(stamp.ends_with('Z'));
        assert_eq!(stamp.as_bytes()[8], b'T');
        assert!(stamp[..8].chars().all(|c| c.is_ascii_digit()));
    }
}
