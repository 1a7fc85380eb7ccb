//! Token acquisition and caching.
//!
//! - [`AuthCache`]: serves stored tokens and refreshes them through a provider
//! - [`TokenProvider`]: performs a live login
//! - [`providers`]: login backends (external command, OAuth password grant, fixed token)

mod cache;
mod credential;
mod provider;
pub mod providers;

pub use cache::{AuthCache, DEFAULT_REFRESH_MARGIN};
pub use credential::{CredentialRecord, TokenResult};
pub use provider::TokenProvider;
pub use providers::{CommandProvider, PasswordGrantProvider, StaticProvider, parse_redirect};
