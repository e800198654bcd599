//! # Finance Tracker Client
//!
//! Client core of the personal finance tracker. It talks to the tracker's
//! REST backend and keeps the state a front end renders: the session, the
//! dashboard figures, UI signals with their notification queue, and the
//! bank-link flow.
//!
//! ## Layers
//!
//! - **domain**: session, UI signals, dashboard aggregation, link flow and
//!   the entity services
//! - **io**: the backend gateway and the query cache in front of it
//! - **storage**: persisted credential and theme preference
//! - **config**: YAML configuration with environment overrides
//! - **app**: [`FinanceClient`], the context object wiring everything together

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod io;
pub mod storage;

pub use app::FinanceClient;
pub use config::ClientConfig;
pub use error::{GatewayError, GatewayResult};
