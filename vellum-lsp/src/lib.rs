//! Language Server Protocol frontend for Vellum.
//!
//! The server layer is deliberately thin: it decodes URIs and positions,
//! holds the single mutex around the core [`vellum_analysis::Workspace`],
//! and converts the core's plain replies to wire types. All document
//! intelligence lives in `vellum-analysis`.
//!
//! Built on tower-lsp: the `LanguageServer` trait takes `&self`, so the
//! mutable core sits behind a `Mutex` (the standard pattern for this
//! framework). Requests serialize through that lock, matching the core's
//! single-owner design.

pub mod features;
pub mod server;

pub use server::VellumLanguageServer;
