//! Font preparation and text measurement.
//!
//! Two halves live here. The [`FontCoordinator`] guards the one piece of
//! cross-request shared state in the crate: which families have already been
//! fetched. It guarantees at most one fetch per family per process lifetime,
//! with concurrent callers sharing the in-flight load and failures cached so
//! they are not retried. The [`FontStore`] holds parsed faces and answers
//! width/line-height queries for layout, falling back to heuristic metrics
//! when a family never produced real bytes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell, RwLock};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Source of font bytes, e.g. a directory of TTF files or a remote CDN.
#[async_trait]
pub trait FontProvider: Send + Sync {
    /// Cheap availability probe. Families reported available are never
    /// fetched.
    async fn is_available(&self, family: &str) -> bool;

    /// Fetch the raw TTF/OTF bytes for a family.
    async fn fetch(&self, family: &str) -> std::result::Result<Vec<u8>, String>;
}

/// Loads fonts from `<dir>/<Family Name>.ttf`.
pub struct DirectoryFontProvider {
    dir: PathBuf,
}

impl DirectoryFontProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, family: &str) -> PathBuf {
        self.dir.join(format!("{family}.ttf"))
    }
}

#[async_trait]
impl FontProvider for DirectoryFontProvider {
    async fn is_available(&self, _family: &str) -> bool {
        // Files on disk are never pre-registered; everything goes through
        // fetch so the bytes end up in the store.
        false
    }

    async fn fetch(&self, family: &str) -> std::result::Result<Vec<u8>, String> {
        tokio::fs::read(self.path_for(family))
            .await
            .map_err(|e| format!("{}: {e}", self.path_for(family).display()))
    }
}

/// Provider for environments where the host already supplies every family
/// (e.g. a browser-like shell with its own font stack). Nothing is fetched;
/// measurement uses heuristic metrics.
pub struct HostFontProvider;

#[async_trait]
impl FontProvider for HostFontProvider {
    async fn is_available(&self, _family: &str) -> bool {
        true
    }

    async fn fetch(&self, family: &str) -> std::result::Result<Vec<u8>, String> {
        Err(format!("'{family}' is host-provided, nothing to fetch"))
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

type LoadCell = Arc<OnceCell<std::result::Result<(), String>>>;

/// Deduplicating font loader.
///
/// Each family maps to a `OnceCell` holding the outcome of its single load
/// attempt. The map itself is only locked long enough to clone the cell, so
/// slow fetches for different families proceed in parallel while callers
/// asking for the same family all await the same cell.
pub struct FontCoordinator {
    provider: Arc<dyn FontProvider>,
    store: Arc<RwLock<FontStore>>,
    loads: Mutex<HashMap<String, LoadCell>>,
    fetch_timeout: Duration,
}

impl FontCoordinator {
    pub fn new(provider: Arc<dyn FontProvider>, fetch_timeout: Duration) -> Self {
        Self {
            provider,
            store: Arc::new(RwLock::new(FontStore::new())),
            loads: Mutex::new(HashMap::new()),
            fetch_timeout,
        }
    }

    /// Shared handle to the metrics store fed by completed loads.
    pub fn store(&self) -> Arc<RwLock<FontStore>> {
        Arc::clone(&self.store)
    }

    /// Ensure every listed family has had its one load attempt. Returns the
    /// first failure; the caller decides whether that aborts the render.
    pub async fn ensure_fonts(&self, families: &[String]) -> Result<()> {
        let mut first_failure: Option<Error> = None;
        for family in families {
            if let Err(e) = self.ensure_font(family).await {
                log::warn!("font '{family}' unavailable: {e}");
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn ensure_font(&self, family: &str) -> Result<()> {
        if self.provider.is_available(family).await {
            return Ok(());
        }

        let cell = {
            let mut loads = self.loads.lock().await;
            Arc::clone(loads.entry(family.to_string()).or_default())
        };

        let outcome = cell
            .get_or_init(|| self.load_once(family.to_string()))
            .await;

        outcome.clone().map_err(|reason| Error::FontLoad {
            family: family.to_string(),
            reason,
        })
    }

    async fn load_once(&self, family: String) -> std::result::Result<(), String> {
        log::debug!("fetching font '{family}'");
        let fetched = tokio::time::timeout(self.fetch_timeout, self.provider.fetch(&family))
            .await
            .map_err(|_| format!("timed out after {:?}", self.fetch_timeout))?;
        let bytes = fetched?;
        if bytes.is_empty() {
            // Providers may report success without bytes; measurement then
            // uses heuristic metrics for the family.
            return Ok(());
        }
        self.store
            .write()
            .await
            .register(&family, bytes)
            .map_err(|e| format!("parse failed: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Metrics store
// ---------------------------------------------------------------------------

/// A registered font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Parsed faces keyed by family, with heuristic fallback metrics for
/// families that never loaded.
pub struct FontStore {
    fonts: HashMap<String, FontData>,
}

impl FontStore {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
        }
    }

    /// Parse and register a face under its family name.
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) -> std::result::Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0).map_err(|e| e.to_string())?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        self.fonts.insert(family.to_string(), data);
        Ok(())
    }

    pub fn has_face(&self, family: &str) -> bool {
        self.fonts.contains_key(family)
    }

    /// Measure the width of a string at a given size (in px). With real
    /// bytes we sum glyph advances; otherwise an average character width
    /// heuristic (0.5 × size, 0.55 when bold) stands in.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool, family: &str) -> f32 {
        let Some(data) = self.fonts.get(family) else {
            return heuristic_width(text, font_size, bold);
        };

        if let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) {
            let scale = font_size / data.units_per_em;
            let mut width = 0.0f32;
            for ch in text.chars() {
                match face.glyph_index(ch) {
                    Some(gid) => {
                        width += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
                    }
                    None => width += font_size * 0.5,
                }
            }
            width
        } else {
            heuristic_width(text, font_size, bold)
        }
    }

    /// Line height in px.
    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Ascender in px, falling back to Helvetica-like proportions.
    pub fn ascender_px(&self, font_size: f32, family: &str) -> f32 {
        match self.fonts.get(family) {
            Some(data) => data.ascender * (font_size / data.units_per_em),
            None => font_size * 0.75,
        }
    }

    pub fn face_bytes(&self, family: &str) -> Option<&[u8]> {
        self.fonts.get(family).map(|d| d.bytes.as_slice())
    }
}

impl Default for FontStore {
    fn default() -> Self {
        Self::new()
    }
}

fn heuristic_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let avg = if bold { 0.55 } else { 0.5 };
    text.chars().count() as f32 * font_size * avg
}

/// Word-wrap text to fit within `max_width` pixels. Returns a vec of lines.
///
/// A word is committed to the current line when the line is still empty
/// (overlong single words are never split) or when the line plus the word
/// still fits; otherwise the line is flushed and the word opens the next
/// one. Existing newlines always flush.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    family: &str,
    max_width: f32,
    fonts: &FontStore,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            let fits =
                fonts.measure_text_width(&candidate, font_size, bold, family) <= max_width;
            if fits || line.is_empty() {
                line = candidate;
            } else {
                lines.push(std::mem::replace(&mut line, word.to_string()));
            }
        }
        lines.push(line);
    }
    lines
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// Provider that counts fetches and can be told to fail, used to exercise
/// the dedup and failure-caching behaviour.
pub struct CountingProvider {
    pub fetches: std::sync::atomic::AtomicUsize,
    pub fail: bool,
    pub delay: Duration,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self {
            fetches: std::sync::atomic::AtomicUsize::new(0),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for CountingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FontProvider for CountingProvider {
    async fn is_available(&self, _family: &str) -> bool {
        false
    }

    async fn fetch(&self, family: &str) -> std::result::Result<Vec<u8>, String> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            Err(format!("no such family '{family}'"))
        } else {
            // Empty bytes fail face parsing, so report success without
            // registering; measurement falls back to heuristics.
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(provider: Arc<CountingProvider>) -> FontCoordinator {
        FontCoordinator::new(provider, Duration::from_secs(5))
    }

    #[test]
    fn heuristic_text_width() {
        let store = FontStore::new();
        let w = store.measure_text_width("Hello", 16.0, false, "Nunito");
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
    }

    #[test]
    fn bold_heuristic_is_wider() {
        let store = FontStore::new();
        let regular = store.measure_text_width("Hola", 20.0, false, "Lato");
        let bold = store.measure_text_width("Hola", 20.0, true, "Lato");
        assert!(bold > regular);
    }

    #[test]
    fn word_wrap_basic() {
        let store = FontStore::new();
        let lines = wrap_text("Hello world foo bar", 16.0, false, "Lato", 60.0, &store);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
    }

    #[test]
    fn wrap_keeps_overlong_words_whole_and_flushes_newlines() {
        let store = FontStore::new();
        let lines = wrap_text(
            "supercalifragilistico\ncorto",
            16.0,
            false,
            "Lato",
            40.0,
            &store,
        );
        assert_eq!(lines, vec!["supercalifragilistico", "corto"]);
    }

    #[tokio::test]
    async fn failed_load_is_cached_not_retried() {
        let provider = Arc::new(CountingProvider::failing());
        let coord = coordinator(Arc::clone(&provider));
        let families = vec!["Quicksand".to_string()];

        assert!(coord.ensure_fonts(&families).await.is_err());
        assert!(coord.ensure_fonts(&families).await.is_err());
        // The failure is cached; the provider is only hit once.
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let provider = Arc::new(CountingProvider {
            delay: Duration::from_millis(20),
            ..CountingProvider::new()
        });
        let coord = Arc::new(coordinator(Arc::clone(&provider)));
        let families = vec!["Open Sans".to_string()];

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coord = Arc::clone(&coord);
            let families = families.clone();
            handles.push(tokio::spawn(async move {
                coord.ensure_fonts(&families).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(provider.fetch_count(), 1);
    }
}
