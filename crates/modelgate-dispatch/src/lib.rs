//! The dispatch core: resolve the model, enforce quota, check access,
//! stamp pricing, select the backend, invoke it.
//!
//! # Architecture
//!
//! - [`resolver::ModelResolver`] — boundary to the model-resolution
//!   collaborator, plus the store-backed implementation
//! - [`access`] — group-then-personal grant evaluation
//! - [`fee`] — monthly quota guard with billing-period rollover
//! - [`dispatcher::Dispatcher`] — orchestrates the pipeline and exposes
//!   the `chat`/`complete` entry points

pub mod access;
pub mod dispatcher;
pub mod fee;
pub mod resolver;

pub use access::{check_model_access, GrantSource};
pub use dispatcher::{CallContext, DispatchPolicy, Dispatcher, Prepared};
pub use fee::{check_fee, BillingLedger};
pub use resolver::{ModelResolver, StoreResolver};
