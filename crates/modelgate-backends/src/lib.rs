//! Backend adapters for Modelgate.
//!
//! # Architecture
//!
//! - [`traits::ModelBackend`] — capability trait every adapter implements;
//!   all per-call state (resolved model, caller key, session correlator)
//!   rides in a [`traits::BackendCall`] parameter, so registry singletons
//!   stay safe under concurrent requests
//! - [`registry::BackendRegistry`] — immutable name → adapter map built
//!   once at startup, with exhaustive binding validation
//! - [`chat_http::ChatCompletionsBackend`] — OpenAI-compatible chat HTTP
//!   adapter
//! - [`painter::PainterBackend`] — image generation adapter
//! - [`reader::ReaderBackend`] — web page fetch/extract adapter

pub mod chat_http;
pub mod painter;
pub mod reader;
pub mod registry;
pub mod traits;

pub use chat_http::ChatCompletionsBackend;
pub use painter::PainterBackend;
pub use reader::ReaderBackend;
pub use registry::{BackendRegistry, BackendRegistryBuilder};
pub use traits::{BackendCall, ModelBackend};
