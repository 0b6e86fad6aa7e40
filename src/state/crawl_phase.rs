use std::fmt;

/// Lifecycle of a single crawl run
///
/// Runs move strictly forward: `Idle -> Seeding -> Running -> Draining -> Done`.
/// `Running` may skip straight to `Done` when the frontier reaches quiescence
/// before any deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing has happened yet; the plugin registry is being checked
    Idle,
    /// Plugin expectations are being offered to the frontier
    Seeding,
    /// Workers are fetching and expanding documents
    Running,
    /// A deadline or cancellation fired; in-flight fetches are finishing
    Draining,
    /// Terminal; the run summary has been produced
    Done,
}

impl CrawlPhase {
    /// Returns true if `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Seeding)
                | (Self::Seeding, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Running, Self::Done)
                | (Self::Draining, Self::Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
