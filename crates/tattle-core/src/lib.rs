//! tattle-core library.
//!
//! Headless feedback form: field rules ([`validate`]), the form state machine
//! ([`form`]), persistence backends ([`store`]), and a [`session`] that runs
//! submissions off the caller's thread.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at backend seams, `anyhow::Result` for
//!   config loading.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod error;
pub mod form;
pub mod session;
pub mod store;
pub mod validate;

pub use form::{
    FeedbackSnapshot, FormState, RejectReason, SubmitAttempt, SubmitStatus, SuccessPolicy, Ticket,
};
pub use session::{FeedbackSession, SubmitEvent};
pub use store::{FeedbackStore, Receipt, StoreError};
pub use validate::{Field, FieldRules, StandardRules};
