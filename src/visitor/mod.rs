//! Per-visitor logic that runs after the shared, cacheable HTML is served.
//!
//! The browser script reports what was rendered to the visit beacon; the
//! beacon answers with these decisions and refreshes the history cookie.

pub mod alternate;
pub mod decision;
pub mod history;

pub use alternate::{choose_hidden, related_is_duplicate, Block};
pub use decision::{decide, VisitDecision, VisitReport};
pub use history::{visible_items, VisitorHistory, COOKIE_NAME};
