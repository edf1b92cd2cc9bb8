//! Walk state shared by the discovery and collection walkers
//!
//! - `StopReason`: why a paginated walk ended

mod stop_reason;

pub use stop_reason::StopReason;
