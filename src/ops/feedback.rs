//! Feedback from an external text analyzer.
//!
//! The analyzer only ever sees a day's contents after they have been saved;
//! it never takes part in reconciliation.

use std::process::Stdio;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::cache::TwoTierCache;
use crate::io::store::{StoreError, WorkItemStore};
use crate::model::views::WeeklyAggregate;
use crate::ops::day_sync::day_records;
use crate::ops::views::Views;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub date: NaiveDate,
    pub contents: Vec<String>,
    /// Aggregate of the week before `date`, when it has any items
    pub prior: Option<WeeklyAggregate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub summary: String,
    #[serde(default)]
    pub points: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// Error type for analyzer calls
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("nothing to analyze for {0}")]
    Empty(NaiveDate),
    #[error("no feedback command configured (set [feedback] command in config.toml)")]
    NotConfigured,
    #[error("failed to run analyzer: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("analyzer exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("analyzer returned malformed feedback: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, request: &FeedbackRequest) -> Result<Feedback, AnalyzerError>;
}

/// Runs a shell command, writing the request as JSON to its stdin and
/// reading a `Feedback` JSON object from its stdout
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    command: String,
}

impl CommandAnalyzer {
    pub fn new(command: impl Into<String>) -> Self {
        CommandAnalyzer {
            command: command.into(),
        }
    }
}

#[async_trait]
impl TextAnalyzer for CommandAnalyzer {
    async fn analyze(&self, request: &FeedbackRequest) -> Result<Feedback, AnalyzerError> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(AnalyzerError::Spawn)?;

        // stdin is fed while stdout and stderr are drained
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else { return };
            // a command that ignores its input may close the pipe early
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(error = %e, "analyzer did not read full request");
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(AnalyzerError::Spawn)?;

        if !output.status.success() {
            return Err(AnalyzerError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Collect the saved contents of `date` plus the prior week's aggregate
pub async fn build_request<S: WorkItemStore + ?Sized>(
    store: &S,
    cache: &TwoTierCache,
    owner_id: &str,
    date: NaiveDate,
) -> Result<FeedbackRequest, AnalyzerError> {
    let records = day_records(store, cache, owner_id, date).await?;
    let contents: Vec<String> = records.into_iter().map(|r| r.content).collect();

    let prior = match date.checked_sub_days(Days::new(7)) {
        Some(prior_day) => {
            let week = Views::new(store, cache, owner_id).weekly(prior_day).await?;
            (week.total > 0).then_some(week)
        }
        None => None,
    };

    Ok(FeedbackRequest {
        date,
        contents,
        prior,
    })
}

/// Build a request for `date` and hand it to `analyzer`
pub async fn request_feedback<S, A>(
    store: &S,
    cache: &TwoTierCache,
    analyzer: &A,
    owner_id: &str,
    date: NaiveDate,
) -> Result<Feedback, AnalyzerError>
where
    S: WorkItemStore + ?Sized,
    A: TextAnalyzer + ?Sized,
{
    let request = build_request(store, cache, owner_id, date).await?;
    if request.contents.is_empty() {
        return Err(AnalyzerError::Empty(date));
    }
    tracing::debug!(%date, items = request.contents.len(), "requesting feedback");
    analyzer.analyze(&request).await
}
