//! Logging system for generation sequences.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest image reference written verbatim; data URLs are elided past this.
const IMAGE_REF_PREVIEW_CHARS: usize = 96;

/// Logger for generation sequences.
///
/// This logger creates markdown-formatted log files tracking each sequence:
/// its start, every attempt, scheduled retries and the terminal outcome.
/// Every entry is mirrored to the console through `tracing`.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO").
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => std::env::temp_dir().join("avagen").join(format!(
                "avagen_{}_{}.md",
                Utc::now().timestamp_millis(),
                std::process::id()
            )),
        };

        let log_level = log_level.unwrap_or("INFO").to_uppercase();

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level,
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    /// Initialize the log file with header.
    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# Avatar Generation Log\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    /// Append content to log file.
    fn append_to_log(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    fn is_debug(&self) -> bool {
        matches!(self.log_level.as_str(), "DEBUG" | "TRACE")
    }

    /// Log the start of a new sequence.
    ///
    /// # Arguments
    /// * `sequence_id` - Identifier of the sequence.
    /// * `input` - Prompt text being submitted.
    /// * `max_retries` - Retry budget granted to the sequence.
    pub fn log_sequence_start(&self, sequence_id: &str, input: &str, max_retries: u32) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Sequence Started - {}\n\n**Sequence:** {}\n**Prompt:** {}\n**Retry budget:** {}\n\n",
            now.to_rfc3339(),
            sequence_id,
            input,
            max_retries
        );

        self.append_to_log(&content)?;
        tracing::info!(sequence = sequence_id, max_retries, "generation sequence started");
        Ok(())
    }

    /// Log a single network attempt.
    ///
    /// Only written to the file at DEBUG level; always emitted as a `tracing` debug event.
    pub fn log_attempt(
        &self,
        sequence_id: &str,
        attempt: u32,
        is_retry: bool,
        remaining_retries: u32,
    ) -> Result<()> {
        tracing::debug!(
            sequence = sequence_id,
            attempt,
            is_retry,
            remaining_retries,
            "submitting generation request"
        );

        if !self.is_debug() {
            return Ok(());
        }

        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Attempt {} - {}\n\n**Retry:** {}\n**Remaining retries:** {}\n\n",
            attempt,
            now.to_rfc3339(),
            is_retry,
            remaining_retries
        );
        self.append_to_log(&content)
    }

    /// Log a retry scheduled after a "model loading" response.
    pub fn log_retry_scheduled(
        &self,
        sequence_id: &str,
        delay: Duration,
        remaining_retries: u32,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Model Loading - {}\n\nTrying again in {:.1} seconds ({} retries left).\n\n",
            now.to_rfc3339(),
            delay.as_secs_f64(),
            remaining_retries
        );

        self.append_to_log(&content)?;
        tracing::info!(
            sequence = sequence_id,
            delay_secs = delay.as_secs_f64(),
            remaining_retries,
            "model still loading, retry scheduled"
        );
        Ok(())
    }

    /// Log a successful generation.
    pub fn log_success(
        &self,
        sequence_id: &str,
        prompt: &str,
        image_ref: &str,
        attempts: u32,
    ) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Image Generated - {}\n\n**Prompt:** {}\n**Image:** {}\n**Attempts:** {}\n\n---\n\n",
            now.to_rfc3339(),
            prompt,
            preview_image_ref(image_ref),
            attempts
        );

        self.append_to_log(&content)?;
        tracing::info!(sequence = sequence_id, attempts, "image generated");
        Ok(())
    }

    /// Log a non-retryable failure.
    pub fn log_failure(&self, sequence_id: &str, message: &str, attempts: u32) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Error - {}\n\n**Error:** {}\n**Attempts:** {}\n\n---\n\n",
            now.to_rfc3339(),
            message,
            attempts
        );

        self.append_to_log(&content)?;
        tracing::error!(sequence = sequence_id, attempts, "Error: {}", message);
        Ok(())
    }

    /// Log the retry budget running out while the model is still loading.
    ///
    /// `message` is the notice surfaced to the user.
    pub fn log_budget_exhausted(&self, sequence_id: &str, message: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Retry Budget Exhausted - {}\n\n{}\n\n---\n\n",
            now.to_rfc3339(),
            message
        );

        self.append_to_log(&content)?;
        tracing::warn!(sequence = sequence_id, "{}", message);
        Ok(())
    }

    /// Log a sequence cancelled while waiting for its retry.
    pub fn log_cancelled(&self, sequence_id: &str, attempts: u32) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Sequence Cancelled - {}\n\n**Attempts:** {}\n\n---\n\n",
            now.to_rfc3339(),
            attempts
        );

        self.append_to_log(&content)?;
        tracing::info!(sequence = sequence_id, attempts, "pending retry cancelled");
        Ok(())
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn preview_image_ref(image_ref: &str) -> String {
    if image_ref.chars().count() <= IMAGE_REF_PREVIEW_CHARS {
        return image_ref.to_string();
    }
    let head: String = image_ref.chars().take(IMAGE_REF_PREVIEW_CHARS).collect();
    format!("{}... ({} bytes)", head, image_ref.len())
}
