/// Stages a crawl task passes through inside a worker
///
/// Success path: `Claimed -> Fetching -> Parsing -> ChildEnqueue -> Resolved`.
/// Failure path: `Claimed -> Fetching -> Failed`. A claimed task refused by
/// the loop heuristic or the domain policy ends in `Rejected` without a fetch.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStage {
    // ===== Active Stages =====
    /// The worker holds the claim on the URL
    Claimed,

    /// Waiting on the fetcher (rate limit, request, retries)
    Fetching,

    /// The content parser is running on the fetched body
    Parsing,

    /// Discovered links are being filtered and queued
    ChildEnqueue,

    // ===== Terminal Stages =====
    /// A PageResult was produced from a successful fetch
    Resolved,

    /// A PageResult was produced from a failed fetch
    Failed,

    /// Dropped before fetching; no PageResult exists
    Rejected,
}

impl TaskStage {
    /// Returns true if this is a terminal stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Failed | Self::Rejected)
    }

    /// Whether the transition `self -> next` is part of the task lifecycle
    pub fn can_transition_to(&self, next: TaskStage) -> bool {
        use TaskStage::*;
        matches!(
            (self, next),
            (Claimed, Fetching)
                | (Claimed, Rejected)
                | (Fetching, Parsing)
                | (Fetching, ChildEnqueue)
                | (Fetching, Resolved)
                | (Fetching, Failed)
                | (Parsing, ChildEnqueue)
                | (Parsing, Resolved)
                | (ChildEnqueue, Resolved)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claimed => "claimed",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::ChildEnqueue => "child_enqueue",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one task's current stage and enforces legal transitions
#[derive(Debug)]
pub struct TaskProgress {
    stage: TaskStage,
}

impl TaskProgress {
    pub fn claimed() -> Self {
        Self {
            stage: TaskStage::Claimed,
        }
    }

    pub fn stage(&self) -> TaskStage {
        self.stage
    }

    /// Moves to `next`; illegal transitions are logged and ignored
    pub fn advance(&mut self, next: TaskStage) -> bool {
        if self.stage.can_transition_to(next) {
            tracing::trace!("task stage {} -> {}", self.stage, next);
            self.stage = next;
            true
        } else {
            tracing::warn!("Ignoring invalid task transition {} -> {}", self.stage, next);
            false
        }
    }
}
