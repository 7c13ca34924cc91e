//! Search domain module
//!
//! Scoped, paginated lookup over indexed messages.
//!
//! # Architecture
//!
//! - **Query**: `ParsedQuery` splits a query line into selector, text tokens and page
//! - **Normalizer**: `ScriptNormalizer` expands each token into its Han-script variants
//! - **Service**: `SearchService` resolves the requester's scope and runs the predicate
//!
//! # Example
//!
//! ```ignore
//! use chatsift_core::domain::search::{SearchOutcome, SearchService};
//!
//! let service = SearchService::new(registry, store);
//! match service.search(requester_id, "@alice 学习 2").await? {
//!     SearchOutcome::NoMembership => { /* unauthorized sentinel */ }
//!     SearchOutcome::Page(page) => println!("{} hits", page.total),
//! }
//! ```

pub mod normalizer;
pub mod query;
pub mod service;

pub use normalizer::{ScriptConverter, ScriptNormalizer, ZhConverter};
pub use query::{ParsedQuery, Selector, SELECTOR_MARKER};
pub use service::{ResultPage, SearchOutcome, SearchService};
