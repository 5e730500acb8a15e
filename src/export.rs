use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::slack::{ApiError, ApiResult, Channel, Page, SlackApi};
use crate::{AppError, Result};

/// Clock-wait abstraction so tests can record delays instead of sleeping.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed delays inserted between successive API calls to stay under the
/// platform rate limit. Tunable via settings.toml.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub page_delay: Duration,
    pub thread_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(500),
            thread_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given failure count (starting at 1): doubles
    /// each attempt, capped at `max_backoff`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(31);
        let factor = 1u32.checked_shl(exp).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub page_limit: u32,
    pub pacing: Pacing,
    pub retry: RetryPolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_limit: 200,
            pacing: Pacing::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// One channel's export snapshot as written to disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelExport {
    pub channel_id: String,
    pub channel_name: String,
    pub is_private: bool,
    pub fetched_at: String,
    pub message_count: usize,
    pub messages: Vec<Value>,
}

#[derive(Debug)]
pub enum DumpOutcome {
    Written {
        path: PathBuf,
        message_count: usize,
    },
    /// The token cannot read this channel; nothing was written.
    Skipped { reason: ApiError },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_messages: usize,
}

/// Walks the paged Slack endpoints sequentially and writes one JSON snapshot
/// per channel. Holds no global state; construct one per run.
pub struct Exporter<A, S = ThreadSleeper> {
    api: A,
    config: ExportConfig,
    sleeper: S,
}

impl<A: SlackApi> Exporter<A> {
    pub fn new(api: A, config: ExportConfig) -> Self {
        Self::with_sleeper(api, config, ThreadSleeper)
    }
}

impl<A: SlackApi, S: Sleeper> Exporter<A, S> {
    pub fn with_sleeper(api: A, config: ExportConfig, sleeper: S) -> Self {
        Self {
            api,
            config,
            sleeper,
        }
    }

    /// Retry wrapper for one paged call. A 429 sleeps the server-provided
    /// retry-after, then an exponential backoff delay, and re-attempts; any
    /// other error propagates immediately without consuming attempts.
    fn call_with_retry<T>(&self, mut call: impl FnMut() -> ApiResult<T>) -> ApiResult<T> {
        let mut failures = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(ApiError::RateLimited { retry_after }) => {
                    failures += 1;
                    if failures >= self.config.retry.max_attempts {
                        return Err(ApiError::RateLimited { retry_after });
                    }
                    self.sleeper.sleep(retry_after);
                    self.sleeper.sleep(self.config.retry.backoff(failures));
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Accumulates every page of a cursor-paged endpoint, starting with no
    /// cursor and stopping when a page carries none, with a pacing delay
    /// between pages.
    fn fetch_all_pages<T>(
        &self,
        mut fetch: impl FnMut(Option<&str>) -> ApiResult<Page<T>>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.call_with_retry(|| fetch(cursor.as_deref()))?;
            items.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
            self.sleeper.sleep(self.config.pacing.page_delay);
        }
        Ok(items)
    }

    pub fn list_all_channels(&self) -> Result<Vec<Channel>> {
        self.fetch_all_pages(|cursor| self.api.list_channels(self.config.page_limit, cursor))
    }

    pub fn fetch_channel_history(&self, channel_id: &str) -> Result<Vec<Value>> {
        self.fetch_all_pages(|cursor| {
            self.api
                .channel_history(channel_id, self.config.page_limit, cursor)
        })
    }

    /// Returns the root message followed by all replies, as the API sends it.
    pub fn fetch_thread_replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Value>> {
        self.fetch_all_pages(|cursor| {
            self.api
                .thread_replies(channel_id, thread_ts, self.config.page_limit, cursor)
        })
    }

    /// Attaches the full thread to every thread root as a `replies` array.
    /// Messages that merely belong to a thread are left alone.
    pub fn enrich_with_threads(&self, channel_id: &str, messages: &mut [Value]) -> Result<()> {
        for message in messages.iter_mut() {
            let Some(thread_ts) = thread_root_ts(message) else {
                continue;
            };
            let replies = self.fetch_thread_replies(channel_id, &thread_ts)?;
            if let Some(obj) = message.as_object_mut() {
                obj.insert("replies".to_string(), Value::Array(replies));
            }
            self.sleeper.sleep(self.config.pacing.thread_delay);
        }
        Ok(())
    }

    /// Fetches, enriches and writes one channel's snapshot to
    /// `<export_root>/<channel_name>/<run_stamp>.json` as a single
    /// whole-document write. Channels the token cannot read are skipped.
    pub fn dump_channel(
        &self,
        channel: &Channel,
        export_root: &Path,
        run_stamp: &str,
    ) -> Result<DumpOutcome> {
        let fetched_at = Utc::now().to_rfc3339();

        let mut messages = match self.fetch_channel_history(&channel.id) {
            Ok(messages) => messages,
            Err(AppError::SlackApi(err)) if err.is_channel_access() => {
                return Ok(DumpOutcome::Skipped { reason: err });
            }
            Err(err) => return Err(err),
        };
        self.enrich_with_threads(&channel.id, &mut messages)?;

        let export = ChannelExport {
            channel_id: channel.id.clone(),
            channel_name: channel.name.clone(),
            is_private: channel.is_private,
            fetched_at,
            message_count: messages.len(),
            messages,
        };

        let channel_dir = export_root.join(&channel.name);
        fs::create_dir_all(&channel_dir).map_err(|e| AppError::WriteFile {
            path: channel_dir.display().to_string(),
            source: e,
        })?;
        let path = channel_dir.join(format!("{run_stamp}.json"));

        let body = serde_json::to_vec_pretty(&export)
            .map_err(|e| AppError::JsonSerialize(e.to_string()))?;
        fs::write(&path, body).map_err(|e| AppError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(DumpOutcome::Written {
            path,
            message_count: export.message_count,
        })
    }

    /// Runs the full export: lists channels, then dumps each one in turn. A
    /// channel whose API calls fail is reported and counted, and the loop
    /// continues; filesystem errors abort the run.
    pub fn dump_all(
        &self,
        export_root: &Path,
        run_stamp: &str,
        selected_channel_ids: Option<&HashSet<String>>,
        progress_callback: Option<&dyn Fn(usize, usize, &str)>,
    ) -> Result<RunSummary> {
        let channels = self.list_all_channels()?;
        let total = channels.len();

        let mut summary = RunSummary::default();
        for (idx, channel) in channels.iter().enumerate() {
            if let Some(selected) = selected_channel_ids
                && !selected.contains(&channel.id)
            {
                continue;
            }

            if let Some(cb) = progress_callback {
                cb(idx + 1, total, &channel.name);
            }

            match self.dump_channel(channel, export_root, run_stamp) {
                Ok(DumpOutcome::Written { message_count, .. }) => {
                    summary.written += 1;
                    summary.total_messages += message_count;
                }
                Ok(DumpOutcome::Skipped { reason }) => {
                    eprintln!("Skipping #{}: {}", channel.name, reason);
                    summary.skipped += 1;
                }
                Err(err @ AppError::SlackApi(_)) => {
                    eprintln!("Error dumping #{}: {}", channel.name, err);
                    summary.failed += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(summary)
    }
}

/// The thread root timestamp when the message starts a thread: `thread_ts`
/// present and equal to its own `ts`.
fn thread_root_ts(message: &Value) -> Option<String> {
    let ts = message.get("ts").and_then(Value::as_str)?;
    let thread_ts = message.get("thread_ts").and_then(Value::as_str)?;
    (ts == thread_ts).then(|| thread_ts.to_string())
}
