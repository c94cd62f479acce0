//! # invite-forge – Template-driven invitation generation pipeline
//!
//! This crate turns event details into shareable invitation artifacts. The
//! pipeline stages are:
//!
//! 1. **Resolve** – look up the design in the template catalog ([`template`])
//! 2. **Fonts** – make required families available, deduplicated ([`fonts`])
//! 3. **Substitute** – merge customization fields into markup ([`substitute`])
//! 4. **Render** – format adapters for document / raster-image /
//!    printable-document output ([`render`], [`surface`])
//! 5. **Persist & publish** – key-value store seam and subdomain
//!    deployment ([`store`], [`publish`])
//!
//! [`pipeline::Pipeline::generate`] runs stages 1–4 for one request.

pub mod dom;
pub mod error;
pub mod fonts;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod store;
pub mod substitute;
pub mod surface;
pub mod template;

// Re-exports for convenience
pub use error::{Error, Result};
pub use pipeline::{Invitation, OutputFormat, Pipeline, PipelineConfig};
pub use substitute::Customization;
pub use template::TemplateRegistry;
