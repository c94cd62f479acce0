//! Off-screen rendering surface.
//!
//! Substituted markup is parsed into a DOM tree, its block-level text is laid
//! out with Taffy as a vertical flex stack, and the result is painted into an
//! RGBA pixel buffer: themed gradient background, accent band, and text drawn
//! from glyph outlines when real font bytes are loaded (schematic text bars
//! otherwise). Each invocation allocates its own surface; nothing here is
//! shared between renders.

use std::io::Cursor;

use image::{imageops, ImageFormat, Rgba, RgbaImage};
use taffy::prelude::*;
use ttf_parser::OutlineBuilder;

use crate::dom::{flatten_blocks, parse_markup, FlatBlock, Tag};
use crate::error::{Error, Result};
use crate::fonts::{wrap_text, FontStore};

// ---------------------------------------------------------------------------
// Theme colors
// ---------------------------------------------------------------------------

/// Resolved theme colors for one render.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub primary: Rgba<u8>,
    pub secondary: Rgba<u8>,
}

impl Theme {
    /// Build a theme from `#rrggbb` strings, falling back to the default
    /// pink/purple pair on malformed input.
    pub fn from_hex(primary: &str, secondary: &str) -> Self {
        Self {
            primary: parse_hex_color(primary).unwrap_or(Rgba([0xec, 0x48, 0x99, 0xff])),
            secondary: parse_hex_color(secondary).unwrap_or(Rgba([0xa8, 0x55, 0xf7, 0xff])),
        }
    }
}

/// Parse a `#rgb` or `#rrggbb` CSS hex color.
pub fn parse_hex_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().strip_prefix('#')?;
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 16 + v;
            }
            Some(Rgba([out[0], out[1], out[2], 0xff]))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Rgba([r, g, b, 0xff]))
        }
        _ => None,
    }
}

fn lerp_color(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgba([mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), 0xff])
}

fn lighten(c: Rgba<u8>, t: f32) -> Rgba<u8> {
    lerp_color(c, Rgba([0xff, 0xff, 0xff, 0xff]), t)
}

// ---------------------------------------------------------------------------
// Text blocks – styled content extracted from the DOM
// ---------------------------------------------------------------------------

/// Role a block plays in the invitation, decided by its class list. The role
/// fixes the type scale so every builtin design lays out consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockRole {
    Title,
    Names,
    Detail,
    Message,
    Button,
    Plain,
}

impl BlockRole {
    fn from_classes(classes: &[&str], tag: &Tag) -> Self {
        for class in classes {
            match *class {
                "event-title" | "party-title" | "sacred-title" | "sweet-title" => {
                    return BlockRole::Title
                }
                "names" | "birthday-name" | "child-name" | "parents-names" => {
                    return BlockRole::Names
                }
                "detail-text" => return BlockRole::Detail,
                "message" | "blessing-text" | "expecting-text" | "celebration-text"
                | "blessing-footer" | "baby-footer" => return BlockRole::Message,
                "rsvp-button" => return BlockRole::Button,
                _ => {}
            }
        }
        if tag.is_heading() {
            BlockRole::Title
        } else {
            BlockRole::Plain
        }
    }

    fn font_size(self) -> f32 {
        match self {
            BlockRole::Title => 40.0,
            BlockRole::Names => 48.0,
            BlockRole::Detail => 19.0,
            BlockRole::Message => 18.0,
            BlockRole::Button => 18.0,
            BlockRole::Plain => 16.0,
        }
    }

    fn bold(self) -> bool {
        matches!(self, BlockRole::Title | BlockRole::Names | BlockRole::Button)
    }

    /// Display font for titles and names, body font otherwise.
    fn uses_display_font(self) -> bool {
        matches!(self, BlockRole::Title | BlockRole::Names)
    }

    fn margin_bottom(self) -> f32 {
        match self {
            BlockRole::Title => 24.0,
            BlockRole::Names => 28.0,
            BlockRole::Detail => 10.0,
            BlockRole::Message => 20.0,
            BlockRole::Button => 16.0,
            BlockRole::Plain => 12.0,
        }
    }
}

#[derive(Debug, Clone)]
struct TextBlock {
    role: BlockRole,
    lines: Vec<String>,
    font_size: f32,
    bold: bool,
    family: String,
}

impl TextBlock {
    /// Assign a role and type scale to a flattened leaf, word-wrapped to the
    /// content width.
    fn from_flat(
        flat: &FlatBlock,
        display_family: &str,
        body_family: &str,
        max_width: f32,
        fonts: &FontStore,
    ) -> Self {
        let classes: Vec<&str> = flat.classes.iter().map(String::as_str).collect();
        let role = BlockRole::from_classes(&classes, &flat.tag);
        let family = if role.uses_display_font() {
            display_family
        } else {
            body_family
        };
        let font_size = role.font_size();
        let bold = role.bold();
        let lines = wrap_text(&flat.text, font_size, bold, family, max_width, fonts);
        TextBlock {
            role,
            lines,
            font_size,
            bold,
            family: family.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout – vertical flex stack via Taffy
// ---------------------------------------------------------------------------

const SURFACE_PADDING: f32 = 40.0;
const LINE_HEIGHT_FACTOR: f32 = 1.3;

struct PlacedBlock {
    block: TextBlock,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

fn layout_blocks(
    blocks: Vec<TextBlock>,
    surface_w: f32,
    fonts: &FontStore,
) -> Result<Vec<PlacedBlock>> {
    let content_width = surface_w - 2.0 * SURFACE_PADDING;
    let mut taffy: TaffyTree<()> = TaffyTree::new();
    let mut leaves = Vec::with_capacity(blocks.len());

    for block in &blocks {
        let line_h = fonts.line_height_px(block.font_size, LINE_HEIGHT_FACTOR);
        let width = block
            .lines
            .iter()
            .map(|l| fonts.measure_text_width(l, block.font_size, block.bold, &block.family))
            .fold(0.0f32, f32::max)
            .min(content_width);
        let mut height = block.lines.len() as f32 * line_h;
        if block.role == BlockRole::Button {
            // Button chrome around the label.
            height += 24.0;
        }
        let leaf = taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Length(width),
                    height: Dimension::Length(height),
                },
                margin: Rect {
                    top: LengthPercentageAuto::Length(0.0),
                    right: LengthPercentageAuto::Length(0.0),
                    bottom: LengthPercentageAuto::Length(block.role.margin_bottom()),
                    left: LengthPercentageAuto::Length(0.0),
                },
                ..Default::default()
            })
            .map_err(|e| Error::render(e.to_string()))?;
        leaves.push(leaf);
    }

    let root = taffy
        .new_with_children(
            Style {
                display: Display::Flex,
                flex_direction: FlexDirection::Column,
                align_items: Some(AlignItems::Center),
                size: Size {
                    width: Dimension::Length(content_width),
                    height: Dimension::Auto,
                },
                ..Default::default()
            },
            &leaves,
        )
        .map_err(|e| Error::render(e.to_string()))?;

    taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(|e| Error::render(e.to_string()))?;

    let mut placed = Vec::with_capacity(blocks.len());
    for (block, leaf) in blocks.into_iter().zip(leaves) {
        let layout = taffy.layout(leaf).map_err(|e| Error::render(e.to_string()))?;
        placed.push(PlacedBlock {
            block,
            x: SURFACE_PADDING + layout.location.x,
            y: SURFACE_PADDING + layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
        });
    }
    Ok(placed)
}

// ---------------------------------------------------------------------------
// Painting
// ---------------------------------------------------------------------------

fn fill_rect(img: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
    let x0 = x.max(0.0) as u32;
    let y0 = y.max(0.0) as u32;
    let x1 = ((x + w).max(0.0) as u32).min(img.width());
    let y1 = ((y + h).max(0.0) as u32).min(img.height());
    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px, py, color);
        }
    }
}

fn paint_background(img: &mut RgbaImage, theme: &Theme) {
    let top = lighten(theme.primary, 0.9);
    let bottom = lighten(theme.secondary, 0.9);
    let h = img.height().max(1);
    for y in 0..img.height() {
        let t = y as f32 / h as f32;
        let color = lerp_color(top, bottom, t);
        for x in 0..img.width() {
            img.put_pixel(x, y, color);
        }
    }
}

/// Horizontal primary→secondary gradient filling the given rect.
fn paint_gradient_rect(img: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, theme: &Theme) {
    let x0 = x.max(0.0) as u32;
    let y0 = y.max(0.0) as u32;
    let x1 = ((x + w).max(0.0) as u32).min(img.width());
    let y1 = ((y + h).max(0.0) as u32).min(img.height());
    let span = (x1.saturating_sub(x0)).max(1);
    for px in x0..x1 {
        let t = (px - x0) as f32 / span as f32;
        let color = lerp_color(theme.primary, theme.secondary, t);
        for py in y0..y1 {
            img.put_pixel(px, py, color);
        }
    }
}

fn block_color(role: BlockRole, theme: &Theme) -> Rgba<u8> {
    match role {
        BlockRole::Title => theme.primary,
        BlockRole::Names => Rgba([0x33, 0x33, 0x33, 0xff]),
        BlockRole::Detail => Rgba([0x55, 0x55, 0x55, 0xff]),
        BlockRole::Message => theme.secondary,
        BlockRole::Button => Rgba([0xff, 0xff, 0xff, 0xff]),
        BlockRole::Plain => Rgba([0x33, 0x33, 0x33, 0xff]),
    }
}

fn paint_block(img: &mut RgbaImage, placed: &PlacedBlock, theme: &Theme, fonts: &FontStore) {
    let block = &placed.block;
    let line_h = fonts.line_height_px(block.font_size, LINE_HEIGHT_FACTOR);
    let color = block_color(block.role, theme);

    let mut text_top = placed.y;
    if block.role == BlockRole::Button {
        // Button chrome: gradient pill with horizontal breathing room.
        paint_gradient_rect(
            img,
            placed.x - 30.0,
            placed.y,
            placed.width + 60.0,
            placed.height,
            theme,
        );
        text_top += 12.0;
    }

    for (i, line) in block.lines.iter().enumerate() {
        let line_w = fonts.measure_text_width(line, block.font_size, block.bold, &block.family);
        let x = placed.x + (placed.width - line_w) / 2.0;
        let baseline = text_top + i as f32 * line_h + fonts.ascender_px(block.font_size, &block.family);

        if fonts.has_face(&block.family) {
            draw_text_outlines(img, line, x, baseline, block.font_size, &block.family, color, fonts);
        } else {
            // Schematic bar standing in for the glyph run.
            let bar_h = block.font_size * 0.55;
            let bar_y = text_top + i as f32 * line_h + (line_h - bar_h) / 2.0;
            fill_rect(img, x, bar_y, line_w, bar_h, color);
        }
    }
}

// ---------------------------------------------------------------------------
// Glyph outline rasterization
// ---------------------------------------------------------------------------

/// Flattens ttf-parser outline callbacks into closed polyline contours in
/// pixel space (y-down).
struct OutlineSink {
    contours: Vec<Vec<(f32, f32)>>,
    current: Vec<(f32, f32)>,
    scale: f32,
    origin_x: f32,
    baseline_y: f32,
}

impl OutlineSink {
    fn new(scale: f32, origin_x: f32, baseline_y: f32) -> Self {
        Self {
            contours: Vec::new(),
            current: Vec::new(),
            scale,
            origin_x,
            baseline_y,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.origin_x + x * self.scale,
            self.baseline_y - y * self.scale,
        )
    }
}

impl ttf_parser::OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        if !self.current.is_empty() {
            self.contours.push(std::mem::take(&mut self.current));
        }
        self.current.push(self.map(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.current.push(self.map(x, y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        // Flatten the quadratic with a fixed subdivision; glyphs at UI sizes
        // do not need adaptive tolerance.
        let (px, py) = *self.current.last().unwrap_or(&self.map(x1, y1));
        let (cx, cy) = self.map(x1, y1);
        let (ex, ey) = self.map(x, y);
        const STEPS: usize = 8;
        for i in 1..=STEPS {
            let t = i as f32 / STEPS as f32;
            let mt = 1.0 - t;
            let bx = mt * mt * px + 2.0 * mt * t * cx + t * t * ex;
            let by = mt * mt * py + 2.0 * mt * t * cy + t * t * ey;
            self.current.push((bx, by));
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (px, py) = *self.current.last().unwrap_or(&self.map(x1, y1));
        let (c1x, c1y) = self.map(x1, y1);
        let (c2x, c2y) = self.map(x2, y2);
        let (ex, ey) = self.map(x, y);
        const STEPS: usize = 12;
        for i in 1..=STEPS {
            let t = i as f32 / STEPS as f32;
            let mt = 1.0 - t;
            let bx = mt * mt * mt * px
                + 3.0 * mt * mt * t * c1x
                + 3.0 * mt * t * t * c2x
                + t * t * t * ex;
            let by = mt * mt * mt * py
                + 3.0 * mt * mt * t * c1y
                + 3.0 * mt * t * t * c2y
                + t * t * t * ey;
            self.current.push((bx, by));
        }
    }

    fn close(&mut self) {
        if !self.current.is_empty() {
            self.contours.push(std::mem::take(&mut self.current));
        }
    }
}

/// Even-odd scanline fill of closed contours.
fn fill_contours(img: &mut RgbaImage, contours: &[Vec<(f32, f32)>], color: Rgba<u8>) {
    let mut min_y = f32::MAX;
    let mut max_y = f32::MIN;
    for contour in contours {
        for &(_, y) in contour {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if min_y > max_y {
        return;
    }
    let y0 = min_y.floor().max(0.0) as u32;
    let y1 = (max_y.ceil() as u32).min(img.height().saturating_sub(1));

    for py in y0..=y1 {
        let scan_y = py as f32 + 0.5;
        let mut crossings: Vec<f32> = Vec::new();
        for contour in contours {
            let n = contour.len();
            for i in 0..n {
                let (x0, ya) = contour[i];
                let (x1c, yb) = contour[(i + 1) % n];
                if (ya <= scan_y && yb > scan_y) || (yb <= scan_y && ya > scan_y) {
                    let t = (scan_y - ya) / (yb - ya);
                    crossings.push(x0 + t * (x1c - x0));
                }
            }
        }
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for pair in crossings.chunks(2) {
            if pair.len() < 2 {
                break;
            }
            let sx = pair[0].round().max(0.0) as u32;
            let ex = (pair[1].round() as u32).min(img.width());
            for px in sx..ex {
                img.put_pixel(px, py, color);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_text_outlines(
    img: &mut RgbaImage,
    text: &str,
    x: f32,
    baseline_y: f32,
    font_size: f32,
    family: &str,
    color: Rgba<u8>,
    fonts: &FontStore,
) {
    let Some(bytes) = fonts.face_bytes(family) else {
        return;
    };
    let Ok(face) = ttf_parser::Face::parse(bytes, 0) else {
        return;
    };
    let scale = font_size / face.units_per_em() as f32;
    let mut pen_x = x;

    for ch in text.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            pen_x += font_size * 0.5;
            continue;
        };
        let mut sink = OutlineSink::new(scale, pen_x, baseline_y);
        if face.outline_glyph(gid, &mut sink).is_some() {
            sink.close();
            fill_contours(img, &sink.contours, color);
        }
        pen_x += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render substituted markup into an RGBA surface of the given size.
///
/// `required_fonts` is the template's font list in preference order; the
/// first entry is the display family (titles, names), the second the body
/// family.
pub fn render_surface(
    markup: &str,
    theme: &Theme,
    required_fonts: &[String],
    fonts: &FontStore,
    width: u32,
    height: u32,
) -> Result<RgbaImage> {
    let display_family = required_fonts.first().map(String::as_str).unwrap_or("");
    let body_family = required_fonts.get(1).map(String::as_str).unwrap_or(display_family);

    let content_width = width as f32 - 2.0 * SURFACE_PADDING;
    let blocks: Vec<TextBlock> = flatten_blocks(&parse_markup(markup))
        .iter()
        .map(|flat| TextBlock::from_flat(flat, display_family, body_family, content_width, fonts))
        .collect();
    if blocks.is_empty() {
        return Err(Error::render("markup produced no text blocks"));
    }

    let placed = layout_blocks(blocks, width as f32, fonts)?;

    let mut img = RgbaImage::new(width, height);
    paint_background(&mut img, theme);
    paint_gradient_rect(&mut img, 0.0, 0.0, width as f32, 6.0, theme);
    for block in &placed {
        paint_block(&mut img, block, theme, fonts);
    }
    Ok(img)
}

/// Encode a surface as PNG at full quality.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| Error::render(format!("png encode failed: {e}")))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Thumbnail derivation
// ---------------------------------------------------------------------------

/// Geometry of a centered-crop thumbnail: cover-scale then crop the middle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbGeometry {
    pub scale: f32,
    pub scaled_w: u32,
    pub scaled_h: u32,
    pub crop_x: u32,
    pub crop_y: u32,
}

/// `scale = max(S/W, S/H)`; crop offsets are `(scaled − S)/2`, clamped
/// non-negative.
pub fn thumbnail_geometry(width: u32, height: u32, size: u32) -> ThumbGeometry {
    let scale = (size as f32 / width as f32).max(size as f32 / height as f32);
    let scaled_w = (width as f32 * scale).round() as u32;
    let scaled_h = (height as f32 * scale).round() as u32;
    ThumbGeometry {
        scale,
        scaled_w,
        scaled_h,
        crop_x: scaled_w.saturating_sub(size) / 2,
        crop_y: scaled_h.saturating_sub(size) / 2,
    }
}

/// Derive the square thumbnail from a full surface.
pub fn derive_thumbnail(img: &RgbaImage, size: u32) -> RgbaImage {
    let geom = thumbnail_geometry(img.width(), img.height(), size);
    let scaled = imageops::resize(
        img,
        geom.scaled_w.max(1),
        geom.scaled_h.max(1),
        imageops::FilterType::Triangle,
    );
    imageops::crop_imm(&scaled, geom.crop_x, geom.crop_y, size, size).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#ec4899"), Some(Rgba([0xec, 0x48, 0x99, 0xff])));
        assert_eq!(parse_hex_color("#fff"), Some(Rgba([0xff, 0xff, 0xff, 0xff])));
        assert_eq!(parse_hex_color("purple"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn landscape_thumbnail_geometry() {
        // 1600×900 → scale = max(200/1600, 200/900) = 200/900
        let g = thumbnail_geometry(1600, 900, 200);
        assert!((g.scale - 200.0 / 900.0).abs() < 1e-6);
        assert_eq!(g.scaled_h, 200);
        assert_eq!(g.crop_y, 0);
        assert_eq!(g.crop_x, (g.scaled_w - 200) / 2);
    }

    #[test]
    fn portrait_thumbnail_geometry() {
        let g = thumbnail_geometry(600, 800, 200);
        assert!((g.scale - 200.0 / 600.0).abs() < 1e-6);
        assert_eq!(g.scaled_w, 200);
        assert_eq!(g.crop_x, 0);
        assert!(g.crop_y > 0);
    }

    #[test]
    fn square_source_needs_no_crop() {
        let g = thumbnail_geometry(500, 500, 200);
        assert_eq!((g.scaled_w, g.scaled_h), (200, 200));
        assert_eq!((g.crop_x, g.crop_y), (0, 0));
    }

    #[test]
    fn thumbnail_is_exactly_square() {
        let img = RgbaImage::new(800, 600);
        let thumb = derive_thumbnail(&img, 200);
        assert_eq!((thumb.width(), thumb.height()), (200, 200));
    }

    #[test]
    fn surface_paints_markup() {
        let fonts = FontStore::new();
        let theme = Theme::from_hex("#ec4899", "#a855f7");
        let markup = r#"
<div class="invitation-container">
    <h1 class="event-title">Boda</h1>
    <h2 class="names">Ana y Luis</h2>
    <p class="detail-text">viernes, 20 de junio de 2025</p>
</div>"#;
        let img = render_surface(
            markup,
            &theme,
            &["Playfair Display".to_string(), "Source Sans Pro".to_string()],
            &fonts,
            800,
            600,
        )
        .unwrap();
        assert_eq!((img.width(), img.height()), (800, 600));
        // The title bar paints primary-colored pixels somewhere near the top.
        let primary = Rgba([0xec, 0x48, 0x99, 0xff]);
        let painted = (0..200)
            .flat_map(|y| (0..800).map(move |x| (x, y)))
            .any(|(x, y)| *img.get_pixel(x, y) == primary);
        assert!(painted, "expected schematic title bar in primary color");
    }

    #[test]
    fn contour_fill_paints_closed_outlines() {
        let mut img = RgbaImage::new(20, 20);
        // Square in font space (y-up), mapped against a baseline at y = 15.
        let mut sink = OutlineSink::new(1.0, 0.0, 15.0);
        sink.move_to(2.0, 2.0);
        sink.line_to(12.0, 2.0);
        sink.line_to(12.0, 12.0);
        sink.line_to(2.0, 12.0);
        sink.close();

        let ink = Rgba([0x20, 0x20, 0x20, 0xff]);
        fill_contours(&mut img, &sink.contours, ink);
        // Interior is filled, outside stays untouched.
        assert_eq!(*img.get_pixel(7, 8), ink);
        assert_ne!(*img.get_pixel(16, 8), ink);
    }

    #[test]
    fn empty_markup_is_a_render_error() {
        let fonts = FontStore::new();
        let theme = Theme::from_hex("#ec4899", "#a855f7");
        assert!(render_surface("<div></div>", &theme, &[], &fonts, 800, 600).is_err());
    }
}
