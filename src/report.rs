//! Session score reporting: who played, what they scored, where the report goes.

use crate::game::{Outcome, SessionSummary};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Game type tag carried by every report. Names the genre rather than a commercial title.
const GAME_TYPE: &str = "match3";
/// Entry cost of one session, charged on submission.
const TOKEN_COST: i64 = -1;
const LEVEL: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Guest,
    User(String),
}

impl Identity {
    pub fn from_user_id(id: Option<String>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => Self::User(id.trim().to_string()),
            _ => Self::Guest,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Guest => "guest",
            Self::User(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub user_id: String,
    pub user_score: u64,
    pub points_change: u64,
    pub token_change: i64,
    pub game_type: &'static str,
    pub level: u32,
    pub result: Outcome,
    pub remark: String,
}

impl ScoreReport {
    pub fn new(user_id: &str, summary: &SessionSummary) -> Self {
        let verdict = match summary.outcome {
            Outcome::Win => "won",
            Outcome::Lose => "lost",
        };
        Self {
            user_id: user_id.to_string(),
            user_score: summary.final_score,
            points_change: summary.final_score,
            token_change: TOKEN_COST,
            game_type: GAME_TYPE,
            level: LEVEL,
            result: summary.outcome,
            remark: format!(
                "{verdict} with {} points in {} moves",
                summary.final_score, summary.moves_used
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for finished-session reports.
pub trait ScoreSink {
    fn submit(&mut self, report: &ScoreReport) -> Result<(), ReportError>;
}

/// Appends one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScoreSink for JsonLinesSink {
    fn submit(&mut self, report: &ScoreReport) -> Result<(), ReportError> {
        let mut line = serde_json::to_string(report)?;
        line.push('\n');
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Outcome of handing a summary to the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Sent,
    /// Guest sessions are never reported.
    SkippedGuest,
    /// Signed in but no sink configured.
    NoSink,
    Failed,
}

pub struct Reporter {
    identity: Identity,
    sink: Option<Box<dyn ScoreSink>>,
}

impl Reporter {
    pub fn new(identity: Identity, sink: Option<Box<dyn ScoreSink>>) -> Self {
        Self { identity, sink }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Report a finished session. Failures are logged, never fatal.
    pub fn submit(&mut self, summary: &SessionSummary) -> Submission {
        let Identity::User(user_id) = &self.identity else {
            info!(score = summary.final_score, "guest session, report skipped");
            return Submission::SkippedGuest;
        };
        let Some(sink) = self.sink.as_mut() else {
            return Submission::NoSink;
        };
        let report = ScoreReport::new(user_id, summary);
        match sink.submit(&report) {
            Ok(()) => {
                info!(user = %user_id, score = report.user_score, result = ?report.result, "score reported");
                Submission::Sent
            }
            Err(e) => {
                warn!(error = %e, "score report failed");
                Submission::Failed
            }
        }
    }
}
