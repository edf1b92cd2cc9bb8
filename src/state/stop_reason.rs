//! Stop reasons for paginated walks
//!
//! None of these is an error: every walk that ends with a `StopReason`
//! returns whatever it gathered. Fetch failures are reported separately.

use std::fmt;

/// Why a discovery or collection walk stopped paginating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    // ===== Natural Ends =====
    /// The endpoint returned an empty page or no continuation cursor
    Exhausted,

    /// Discovery reached an item older than the age cutoff
    CutoffReached,

    /// Discovery collected the requested number of threads
    TargetReached,

    // ===== Safety Valves =====
    /// The collection cursor stopped advancing for `stall_limit` pages
    Stalled,

    /// The per-thread page ceiling was reached
    PageLimit,

    // ===== External =====
    /// A stop signal was observed at a page boundary
    Cancelled,
}

impl StopReason {
    /// Returns true if the walk ended early but its result is still usable
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Stalled | Self::PageLimit)
    }

    /// Returns true if the result must not be treated as finished work
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::CutoffReached => "cutoff_reached",
            Self::TargetReached => "target_reached",
            Self::Stalled => "stalled",
            Self::PageLimit => "page_limit",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
