//! Generation pipeline – the orchestrator behind every preview and save.
//!
//! `generate` runs a strict sequence: resolve template → ensure fonts →
//! substitute → format adapter → assemble `Invitation`. It persists nothing;
//! previewing an invitation is side-effect free, and any failure surfaces as
//! a typed error rather than a partial record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fonts::FontCoordinator;
use crate::render::{self, RenderedArtifact};
use crate::substitute::{substitute, Customization, Placeholder};
use crate::surface::Theme;
use crate::template::TemplateRegistry;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a required font cannot be made available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontPolicy {
    /// Log a warning and render with heuristic metrics.
    #[default]
    Fallback,
    /// Fail the whole generation request.
    Abort,
}

/// Knobs for one pipeline instance. Shared by all requests.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Origin used to derive RSVP links, e.g. `https://inviteu.digital`.
    pub origin: String,
    pub surface_width: u32,
    pub surface_height: u32,
    pub thumbnail_size: u32,
    /// Printable page size in points (A4).
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    /// Delay between painting and capture on the raster/printable paths.
    pub settle: Duration,
    pub font_fetch_timeout: Duration,
    pub font_policy: FontPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            origin: "https://inviteu.digital".to_string(),
            surface_width: 800,
            surface_height: 600,
            thumbnail_size: 200,
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            settle: Duration::from_millis(500),
            font_fetch_timeout: Duration::from_secs(10),
            font_policy: FontPolicy::Fallback,
        }
    }
}

impl PipelineConfig {
    /// Defaults minus the real-time delays, for fast deterministic tests.
    pub fn for_tests() -> Self {
        Self {
            settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Output formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Document,
    RasterImage,
    PrintableDocument,
}

impl OutputFormat {
    pub fn from_arg(s: &str) -> Option<Self> {
        match s {
            "document" => Some(OutputFormat::Document),
            "raster-image" => Some(OutputFormat::RasterImage),
            "printable-document" => Some(OutputFormat::PrintableDocument),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Document => "html",
            OutputFormat::RasterImage => "png",
            OutputFormat::PrintableDocument => "pdf",
        }
    }
}

// ---------------------------------------------------------------------------
// Invitation record
// ---------------------------------------------------------------------------

/// A fully generated invitation, ready to preview, save, or publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    pub template_id: String,
    /// Snapshot of the inputs that produced this artifact.
    pub customization: Customization,
    pub format: OutputFormat,
    /// Artifact bytes, stored as base64 in serialized form.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    /// Base64 data-URI handle for the content.
    pub uri: String,
    /// Square thumbnail PNG (raster format only).
    #[serde(with = "base64_bytes_opt", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Vec<u8>>,
    pub generated_at: DateTime<Utc>,
    /// Opaque owner id attached at save time by the caller.
    pub owner: Option<String>,
}

impl Invitation {
    /// Download-style filename: `invitacion_<slug-of-title-or-evento>.<ext>`.
    pub fn filename(&self) -> String {
        let title = self
            .customization
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("evento");
        format!(
            "invitacion_{}.{}",
            slug::slugify(title),
            self.format.extension()
        )
    }
}

/// `inv_<unix-millis>_<9 random lowercase alphanumerics>`.
pub fn new_invitation_id() -> String {
    format!(
        "inv_{}_{}",
        Utc::now().timestamp_millis(),
        random_suffix(9)
    )
}

pub(crate) fn random_suffix(len: usize) -> String {
    Alphanumeric
        .sample_string(&mut rand::rng(), len)
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    registry: TemplateRegistry,
    fonts: Arc<FontCoordinator>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(registry: TemplateRegistry, fonts: Arc<FontCoordinator>, config: PipelineConfig) -> Self {
        Self {
            registry,
            fonts,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Generate one invitation. No persistence happens here.
    pub async fn generate(
        &self,
        customization: &Customization,
        format: OutputFormat,
    ) -> Result<Invitation> {
        let template = self.registry.get(&customization.template_id)?;
        log::info!(
            "generating '{}' as {:?} for template '{}'",
            customization.title.as_deref().unwrap_or("(untitled)"),
            format,
            template.id
        );

        if let Err(e) = self.fonts.ensure_fonts(&template.required_fonts).await {
            match self.config.font_policy {
                FontPolicy::Fallback => {
                    log::warn!("continuing with fallback metrics: {e}");
                }
                FontPolicy::Abort => return Err(e),
            }
        }

        let substituted = substitute(template, customization, &self.config.origin);
        let title = Placeholder::EventTitle.resolve(customization, &self.config.origin);
        let theme = Theme::from_hex(
            &Placeholder::PrimaryColor.resolve(customization, &self.config.origin),
            &Placeholder::SecondaryColor.resolve(customization, &self.config.origin),
        );

        let store = self.fonts.store();
        let artifact: RenderedArtifact = match format {
            OutputFormat::Document => render::render_document(&substituted, &title),
            OutputFormat::RasterImage => {
                render::render_raster(
                    &substituted,
                    &theme,
                    &template.required_fonts,
                    &store,
                    &self.config,
                )
                .await?
            }
            OutputFormat::PrintableDocument => {
                render::render_printable(
                    &substituted,
                    &theme,
                    &template.required_fonts,
                    &store,
                    &self.config,
                    &title,
                )
                .await?
            }
        };

        Ok(Invitation {
            id: new_invitation_id(),
            template_id: template.id.clone(),
            customization: customization.clone(),
            format,
            content: artifact.content,
            uri: artifact.uri,
            thumbnail: artifact.thumbnail,
            generated_at: Utc::now(),
            owner: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for binary payloads
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&BASE64_STD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        BASE64_STD.decode(s).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&BASE64_STD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt = Option::<String>::deserialize(d)?;
        opt.map(|s| BASE64_STD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
