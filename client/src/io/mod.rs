//! # IO Module
//!
//! The adapter layer between the domain services and the backend REST API.
//!
//! ## Key Responsibilities
//!
//! - **Gateway Boundary**: The [`Gateway`] trait is the only way the domain
//!   layer reaches the backend
//! - **HTTP Transport**: [`HttpGateway`] attaches the bearer credential,
//!   decodes error bodies and retries transient query failures
//! - **Query Caching**: [`QueryCache`] keeps query results until their stale
//!   time passes or a mutation invalidates their scope
//!
//! ## Supported Operations
//!
//! - **/auth**: login, register, logout, current user
//! - **/accounts**, **/transactions**, **/categories**: reads and mutations
//! - **/plaid**: link token, public token exchange, sync, disconnect, status

pub mod gateway;
pub mod http_gateway;
pub mod query_cache;

#[cfg(test)]
pub mod test_utils;

pub use gateway::{Gateway, UnauthorizedHook};
pub use http_gateway::{HttpGateway, RetryPolicy};
pub use query_cache::{scopes, QueryCache, QueryKey};
