//! Classroom game API client
//!
//! Thin JSON-over-HTTP client for the game endpoints served next to the
//! executor, plus change detection for status polling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cl_core::DisplayIdentity;

/// Game API errors
#[derive(Error, Debug)]
pub enum GameError {
    /// Request failed or returned a non-success status
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server refused the join
    #[error("Join rejected: {0}")]
    Rejected(String),
}

/// A challenge posed to the class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Snapshot of the current game
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStatus {
    pub active: bool,
    #[serde(default)]
    pub current_question: Option<Question>,
    #[serde(default)]
    pub question_index: usize,
    #[serde(default)]
    pub total_questions: usize,
    /// Seconds remaining on the question timer, if one is running
    #[serde(default)]
    pub timer: Option<u64>,
}

impl GameStatus {
    /// Status reported when the server cannot be reached
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub nickname: String,
    pub score: i64,
    pub submissions: u32,
}

#[derive(Serialize)]
struct JoinRequest<'a> {
    nickname: &'a str,
}

#[derive(Deserialize)]
struct JoinResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    question: Option<Question>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the game endpoints
#[derive(Debug, Clone)]
pub struct GameClient {
    http: reqwest::Client,
    base: String,
}

impl GameClient {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Fetch the current game status
    pub async fn status(&self) -> Result<GameStatus, GameError> {
        let status = self
            .http
            .get(self.url("/api/game/status"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }

    /// Join the active game under `identity`
    ///
    /// Returns the current question, if the game has one.
    pub async fn join(&self, identity: &DisplayIdentity) -> Result<Option<Question>, GameError> {
        let response: JoinResponse = self
            .http
            .post(self.url("/api/game/join"))
            .json(&JoinRequest {
                nickname: identity.nickname(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "Failed to join game".to_string());
            tracing::debug!(nickname = identity.nickname(), %reason, "Join rejected");
            return Err(GameError::Rejected(reason));
        }

        tracing::info!(nickname = identity.nickname(), "Joined game");
        Ok(response.question)
    }

    /// Fetch the leaderboard, highest score first
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, GameError> {
        let entries = self
            .http
            .get(self.url("/api/leaderboard"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(entries)
    }
}

/// Suppresses status polls that carry no news
///
/// Only a change in `active` or `current_question` counts; a failed poll
/// reads as an inactive game.
#[derive(Debug, Default)]
pub struct GameStatusWatcher {
    last: Option<GameStatus>,
}

impl GameStatusWatcher {
    /// Create a watcher that reports the first status it sees
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a poll result; returns the status when it differs from the last one reported
    pub fn observe(&mut self, result: Result<GameStatus, GameError>) -> Option<&GameStatus> {
        let status = result.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Game status unavailable");
            GameStatus::inactive()
        });

        let changed = match &self.last {
            None => true,
            Some(last) => {
                last.active != status.active || last.current_question != status.current_question
            }
        };
        if !changed {
            return None;
        }

        self.last = Some(status);
        self.last.as_ref()
    }

    /// Last status reported
    pub fn last(&self) -> Option<&GameStatus> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(title: &str) -> GameStatus {
        GameStatus {
            active: true,
            current_question: Some(Question {
                title: title.to_string(),
                description: "Print a greeting".to_string(),
                hint: None,
            }),
            question_index: 0,
            total_questions: 3,
            timer: Some(120),
        }
    }

    #[test]
    fn test_status_parses_server_shape() {
        let json = r#"{
            "active": true,
            "current_question": {"title": "Hello", "description": "Say hi", "hint": "printf", "tests": []},
            "question_index": 1,
            "total_questions": 4,
            "timer": null
        }"#;
        let status: GameStatus = serde_json::from_str(json).unwrap();
        assert!(status.active);
        assert_eq!(status.question_index, 1);
        assert_eq!(
            status.current_question.unwrap().hint.as_deref(),
            Some("printf")
        );
        assert!(status.timer.is_none());
    }

    #[test]
    fn test_watcher_reports_first_status() {
        let mut watcher = GameStatusWatcher::new();
        assert!(watcher.observe(Ok(GameStatus::inactive())).is_some());
    }

    #[test]
    fn test_watcher_ignores_timer_only_changes() {
        let mut watcher = GameStatusWatcher::new();
        assert!(watcher.observe(Ok(active("Hello"))).is_some());

        let mut ticked = active("Hello");
        ticked.timer = Some(90);
        assert!(watcher.observe(Ok(ticked)).is_none());
    }

    #[test]
    fn test_watcher_reports_question_change() {
        let mut watcher = GameStatusWatcher::new();
        watcher.observe(Ok(active("Hello")));

        let next = watcher.observe(Ok(active("Loops"))).unwrap();
        assert_eq!(next.current_question.as_ref().unwrap().title, "Loops");
    }

    #[test]
    fn test_watcher_treats_failure_as_inactive() {
        let mut watcher = GameStatusWatcher::new();
        watcher.observe(Ok(active("Hello")));

        let failed = watcher.observe(Err(GameError::Rejected("offline".to_string())));
        assert_eq!(failed, Some(&GameStatus::inactive()));

        // Repeated failures are not news
        assert!(watcher
            .observe(Err(GameError::Rejected("offline".to_string())))
            .is_none());
    }
}
