//! Format adapters – turn a substituted template into a concrete artifact.
//!
//! Three adapters share one contract: consume the substituted markup and
//! stylesheet, produce content bytes plus a base64 data-URI handle. The
//! document adapter is synchronous string assembly; the raster and printable
//! adapters render an off-screen surface (with one settle-delay suspension
//! before capture) and differ only in surface size and final packaging.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::fonts::FontStore;
use crate::pipeline::PipelineConfig;
use crate::substitute::Substituted;
use crate::surface::{self, Theme};

/// Output of one adapter invocation.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub content: Vec<u8>,
    pub mime: &'static str,
    /// Base64 data-URI handle for the content.
    pub uri: String,
    /// Square thumbnail PNG; produced by the raster adapter only.
    pub thumbnail: Option<Vec<u8>>,
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64_STD.encode(bytes))
}

// ---------------------------------------------------------------------------
// Document adapter
// ---------------------------------------------------------------------------

/// Assemble a self-contained HTML document with the stylesheet inlined.
/// No layout engine involved; browsers do their own rendering.
pub fn render_document(substituted: &Substituted, title: &str) -> RenderedArtifact {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
{stylesheet}
</style>
</head>
<body>
{markup}
</body>
</html>
"#,
        title = title,
        stylesheet = substituted.stylesheet.trim(),
        markup = substituted.markup.trim(),
    );
    let content = html.into_bytes();
    let uri = data_uri("text/html", &content);
    RenderedArtifact {
        content,
        mime: "text/html",
        uri,
        thumbnail: None,
    }
}

// ---------------------------------------------------------------------------
// Raster adapter
// ---------------------------------------------------------------------------

/// Paint the invitation onto the configured surface, wait out the settle
/// delay, capture as PNG, and derive the square thumbnail.
///
/// The font store is locked only while painting, never across the settle
/// await, so in-flight font loads are not blocked by a slow capture.
pub async fn render_raster(
    substituted: &Substituted,
    theme: &Theme,
    required_fonts: &[String],
    fonts: &RwLock<FontStore>,
    config: &PipelineConfig,
) -> Result<RenderedArtifact> {
    let img = {
        let store = fonts.read().await;
        surface::render_surface(
            &substituted.markup,
            theme,
            required_fonts,
            &store,
            config.surface_width,
            config.surface_height,
        )?
    };

    // Give asynchronously arriving resources a beat before capture.
    if !config.settle.is_zero() {
        tokio::time::sleep(config.settle).await;
    }

    let content = surface::encode_png(&img)?;
    let thumb = surface::derive_thumbnail(&img, config.thumbnail_size);
    let thumbnail = surface::encode_png(&thumb)?;

    let uri = data_uri("image/png", &content);
    Ok(RenderedArtifact {
        content,
        mime: "image/png",
        uri,
        thumbnail: Some(thumbnail),
    })
}

// ---------------------------------------------------------------------------
// Printable adapter
// ---------------------------------------------------------------------------

const PT_TO_MM: f32 = 0.352778;

/// Render the invitation at page size and embed the captured bitmap into a
/// single-page PDF. Multi-page flow is out of scope; everything lands on one
/// A4 page.
pub async fn render_printable(
    substituted: &Substituted,
    theme: &Theme,
    required_fonts: &[String],
    fonts: &RwLock<FontStore>,
    config: &PipelineConfig,
    title: &str,
) -> Result<RenderedArtifact> {
    // At dpi=72, 1 px = 1 pt, so a surface at page-point dimensions maps
    // one-to-one onto the page.
    let page_w_pt = config.page_width_pt;
    let page_h_pt = config.page_height_pt;
    let img = {
        let store = fonts.read().await;
        surface::render_surface(
            &substituted.markup,
            theme,
            required_fonts,
            &store,
            page_w_pt.round() as u32,
            page_h_pt.round() as u32,
        )?
    };

    if !config.settle.is_zero() {
        tokio::time::sleep(config.settle).await;
    }

    let png = surface::encode_png(&img)?;

    let mut doc = PdfDocument::new(title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let raw = RawImage::decode_from_bytes(&png, &mut warnings)
        .map_err(|e| Error::render(format!("pdf image encode failed: {e}")))?;
    let xobj_id = doc.add_image(&raw);

    let ops = vec![Op::UseXobject {
        id: xobj_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            dpi: Some(72.0),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            rotate: None,
        },
    }];

    let page = PdfPage::new(Mm(page_w_pt * PT_TO_MM), Mm(page_h_pt * PT_TO_MM), ops);
    doc.with_pages(vec![page]);
    let content = doc.save(&PdfSaveOptions::default(), &mut Vec::new());

    let uri = data_uri("application/pdf", &content);
    Ok(RenderedArtifact {
        content,
        mime: "application/pdf",
        uri,
        thumbnail: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use crate::substitute::Substituted;
    use std::sync::Arc;
    use std::time::Duration;

    fn substituted() -> Substituted {
        Substituted {
            markup: r#"<div class="invitation-container">
<h1 class="event-title">Cumple de Marta</h1>
<p class="detail-text">sábado, 12 de julio de 2025</p>
</div>"#
                .to_string(),
            stylesheet: ".event-title { color: #ec4899; }".to_string(),
        }
    }

    #[test]
    fn document_is_self_contained_html() {
        let art = render_document(&substituted(), "Cumple de Marta");
        let html = String::from_utf8(art.content.clone()).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<style>"));
        assert!(html.contains("Cumple de Marta"));
        assert!(art.uri.starts_with("data:text/html;base64,"));
        assert!(art.thumbnail.is_none());
    }

    #[tokio::test]
    async fn raster_captures_png_and_thumbnail() {
        let fonts = RwLock::new(FontStore::new());
        let theme = Theme::from_hex("#ec4899", "#a855f7");
        let config = PipelineConfig::for_tests();
        let art = render_raster(&substituted(), &theme, &[], &fonts, &config)
            .await
            .unwrap();

        // PNG magic
        assert_eq!(&art.content[0..4], &[0x89, b'P', b'N', b'G']);
        assert!(art.uri.starts_with("data:image/png;base64,"));
        let thumb = art.thumbnail.unwrap();
        assert_eq!(&thumb[0..4], &[0x89, b'P', b'N', b'G']);
        let decoded = ::image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 200));
    }

    #[tokio::test]
    async fn printable_is_single_page_pdf() {
        let fonts = RwLock::new(FontStore::new());
        let theme = Theme::from_hex("#ec4899", "#a855f7");
        let config = PipelineConfig::for_tests();
        let art = render_printable(&substituted(), &theme, &[], &fonts, &config, "Invitación")
            .await
            .unwrap();

        assert_eq!(&art.content[0..5], b"%PDF-");
        assert!(art.uri.starts_with("data:application/pdf;base64,"));
    }

    #[tokio::test]
    async fn settle_delay_does_not_hold_the_font_lock() {
        let fonts = Arc::new(RwLock::new(FontStore::new()));
        let theme = Theme::from_hex("#ec4899", "#a855f7");
        let config = PipelineConfig {
            settle: Duration::from_millis(200),
            ..PipelineConfig::for_tests()
        };

        let task_fonts = Arc::clone(&fonts);
        let task = tokio::spawn(async move {
            let sub = substituted();
            render_raster(&sub, &theme, &[], &task_fonts, &config).await
        });

        // While the render sits in its settle delay, a writer (e.g. an
        // in-flight font load) must still be able to take the lock.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let writer = tokio::time::timeout(Duration::from_millis(100), fonts.write()).await;
        assert!(writer.is_ok(), "font store stayed locked through the settle delay");
        drop(writer);

        task.await.unwrap().unwrap();
    }
}
