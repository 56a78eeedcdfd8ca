//! Routing subsystem: the dev proxy rule set.
//!
//! # Data Flow
//! ```text
//! Incoming request URI (path, query)
//!     → router.rs (first rule in declaration order)
//!     → matcher.rs (literal path prefix test)
//!     → rewrite.rs (first matching regex rewrite)
//!     → rule.rs (join target path, build upstream URI)
//!     → Return: Forward plan or None (not intercepted)
//!
//! Rule Compilation (at startup):
//!     ProxyTable
//!     → Parse targets, compile regexes, check headers
//!     → Freeze as immutable RuleSet
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same rule
//! - First match wins (declaration order)
//! - Query strings never take part in matching or rewriting

pub mod matcher;
pub mod rewrite;
pub mod router;
pub mod rule;

pub use router::{Forward, RuleSet};
pub use rule::{ProxyRule, RuleError};
