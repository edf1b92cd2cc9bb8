//! Title filtering for discovered threads
//!
//! Discovery only keeps threads whose title satisfies a [`TitlePredicate`].
//! The predicate is injected into the walker so it can be swapped or tested
//! on its own; [`PatternFilter`] is the configured, regex-backed one.

mod title;

pub use title::{PatternFilter, TitlePredicate};
