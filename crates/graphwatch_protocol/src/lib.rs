/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};

/// A remote-service account. `id` is the stable key; `handle` can change between captures.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, handle: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Follow,
    Unfollow,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    NotFound,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Handle when known, otherwise the id.
    pub target: String,
    pub target_id: Option<String>,
    pub kind: ActionKind,
    pub outcome: ActionOutcome,
    pub detail: String,
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        self.outcome == ActionOutcome::Success
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipMode {
    Follower,
    Following,
}

impl RelationshipMode {
    pub fn from_str(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "follower" | "followers" => Some(Self::Follower),
            "following" | "followings" => Some(Self::Following),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CrossCheckResult {
    pub account: String,
    /// `None` when the account could not be checked.
    pub follows: Option<bool>,
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub pending: u64,
    pub processed: u64,
    pub invalid_links: u64,
    pub failed: u64,
    pub auth_failures: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub started_at_ms: Option<i64>,
    pub finished_at_ms: Option<i64>,
    pub report: Option<HarvestReport>,
    pub error: Option<String>,
}

impl JobStatus {
    pub fn not_started() -> Self {
        Self {
            state: JobState::NotStarted,
            started_at_ms: None,
            finished_at_ms: None,
            report: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_mode_accepts_form_values() {
        assert_eq!(RelationshipMode::from_str("follower"), Some(RelationshipMode::Follower));
        assert_eq!(RelationshipMode::from_str(" Following "), Some(RelationshipMode::Following));
        assert_eq!(RelationshipMode::from_str("both"), None);
    }

    #[test]
    fn action_result_uses_snake_case_tags() {
        let r = ActionResult {
            target: "bob".to_string(),
            target_id: Some("42".to_string()),
            kind: ActionKind::Unfollow,
            outcome: ActionOutcome::NotFound,
            detail: "gone".to_string(),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["kind"], "unfollow");
        assert_eq!(v["outcome"], "not_found");
    }

    #[test]
    fn identity_display_name_defaults_to_empty() {
        let id: Identity = serde_json::from_str(r#"{"id":"1","handle":"a"}"#).unwrap();
        assert_eq!(id.display_name, "");
    }
}
