//! Template store, expansion engines and the static check library.
//!
//! The [`store::TemplateStore`] holds a frozen library of signatures, base
//! templates and templates. Two engines work on top of it:
//! - [`expansion`]: rewrites instances recursively down to base-template
//!   instances, with per-branch fault isolation, cycle detection and an
//!   optional depth limit
//! - [`query`] + [`checks`]: a tuple-binding query engine hosting the fixed
//!   catalogue of static checks run before expansion

pub mod checks;
pub mod expansion;
pub mod query;
pub mod store;

pub use checks::{all_checks, fails_on_error_checks, fails_on_missing_information_checks, Check};
pub use expansion::{CheckingExpander, Expander, NonCheckingExpander};
pub use query::{Query, QueryEngine, Tuple, Value};
pub use store::{TemplateObject, TemplateStore};
