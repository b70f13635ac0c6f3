//! Decide what a CI event should do with size records.
//!
//! Policy:
//! - tag refs are never tracked
//! - `push` to the default branch records a new baseline
//! - `push` to any other branch, and `pull_request`, compare against history
//! - every other event is skipped
//!
//! A `push` whose default branch is unknown is compared rather than recorded,
//! so an unresolved default branch can never overwrite a baseline.

use std::fmt;

/// What a run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Skip,
    Record,
    Compare,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Skip => "skip",
            Trigger::Record => "record",
            Trigger::Compare => "compare",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The CI event metadata the classifier looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Platform event name, e.g. `push` or `pull_request`.
    pub event_name: String,
    /// `branch` or `tag`; may be empty when the platform omits it.
    pub ref_type: String,
    /// Fully qualified ref, e.g. `refs/heads/main`.
    pub git_ref: String,
    /// The repository's default branch, if it was resolved.
    pub default_branch: Option<String>,
}

impl TriggerEvent {
    pub fn new(
        event_name: impl Into<String>,
        ref_type: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            ref_type: ref_type.into(),
            git_ref: git_ref.into(),
            default_branch: None,
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    pub fn is_tag(&self) -> bool {
        self.ref_type == "tag" || self.git_ref.starts_with("refs/tags/")
    }

    /// Whether classification depends on knowing the default branch.
    pub fn needs_default_branch(&self) -> bool {
        self.event_name == "push" && !self.is_tag()
    }

    /// The pushed branch name with any `refs/heads/` prefix removed.
    pub fn branch(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.git_ref)
    }
}

/// Classify an event. Pure and total.
pub fn classify(event: &TriggerEvent) -> Trigger {
    if event.is_tag() {
        return Trigger::Skip;
    }

    match event.event_name.as_str() {
        "pull_request" => Trigger::Compare,
        "push" => match event.default_branch.as_deref() {
            Some(default) if event.branch() == default => Trigger::Record,
            _ => Trigger::Compare,
        },
        _ => Trigger::Skip,
    }
}
