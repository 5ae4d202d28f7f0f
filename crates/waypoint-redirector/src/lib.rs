//! Pre-routing redirect resolution.
//!
//! [`Dispatcher`] normalizes the request path, asks the [`Matcher`] for a
//! rule (exact first, then regex in creation order) and either returns a
//! [`Redirect`] or hands the normalized path back to the host.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypoint_cache::MokaRuleCache;
//! use waypoint_redirector::{Dispatch, Dispatcher, Redirector};
//! use waypoint_storage::InMemoryStore;
//!
//! # async fn example() {
//! let store = Arc::new(InMemoryStore::new());
//! let cache = Arc::new(MokaRuleCache::new(Arc::clone(&store)));
//! let dispatcher = Dispatcher::new(cache, store);
//!
//! match dispatcher.dispatch("/old?utm=1").await {
//!     Dispatch::Redirect(redirect) => println!("{} {}", redirect.status, redirect.location),
//!     Dispatch::Continue(path) => println!("serve {path}"),
//! }
//! # }
//! ```

pub mod dispatcher;
pub mod matcher;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{Dispatch, Dispatcher, HitMode, Redirect, Redirector};
pub use matcher::{Matcher, RuleMatch};
