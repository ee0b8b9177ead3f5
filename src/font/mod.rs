//! # Text Measurement
//!
//! Pixel widths of text runs for a given font description.
//!
//! Measurement goes through a [`MeasurementService`]: a handle around a
//! lazily constructed, reusable measuring surface (a [`MeasureBackend`]).
//! The surface is built on first use from a factory, shared by every later
//! call, and dropped by [`MeasurementService::clear`]. Hosts inject the
//! service into the engine, which keeps it swappable in tests.
//!
//! Two backends ship with the crate:
//! - [`FontMetricsBackend`]: real advance widths from registered font faces.
//! - [`HeuristicBackend`]: the estimator used when no face is available,
//!   counting wide (CJK / full-width) characters as two units.

pub mod metrics;

pub use metrics::{FontKey, FontMetrics, FontRegistry};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use unicode_width::UnicodeWidthChar;

use crate::error::LayoutError;
use crate::model::{FontStyle, Settings};

/// Width of one narrow character unit, as a fraction of the font size.
const HEURISTIC_UNIT: f64 = 0.6;

/// The font description a run is measured with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec<'a> {
    pub size: f64,
    pub family: &'a str,
    pub weight: u32,
    pub style: FontStyle,
}

impl<'a> FontSpec<'a> {
    pub fn new(size: f64, family: &'a str) -> Self {
        Self {
            size,
            family,
            weight: 400,
            style: FontStyle::Normal,
        }
    }

    pub fn bold(self) -> Self {
        Self {
            weight: self.weight.max(700),
            ..self
        }
    }

    pub fn italic(self) -> Self {
        Self {
            style: FontStyle::Italic,
            ..self
        }
    }
}

/// A measuring surface. Implementations must be deterministic: the same
/// text and font always yield the same width.
pub trait MeasureBackend: Send + Sync {
    fn measure(&self, text: &str, font: &FontSpec<'_>) -> f64;
}

/// Estimator for hosts without font data.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicBackend;

impl HeuristicBackend {
    /// Character units: 2 for wide characters, 0 for zero-width and
    /// non-whitespace control characters, 1 otherwise (tabs included).
    pub fn units(text: &str) -> usize {
        text.chars()
            .map(|ch| {
                if ch.is_control() {
                    usize::from(ch.is_whitespace())
                } else {
                    ch.width().unwrap_or(0)
                }
            })
            .sum()
    }
}

impl MeasureBackend for HeuristicBackend {
    fn measure(&self, text: &str, font: &FontSpec<'_>) -> f64 {
        Self::units(text) as f64 * font.size * HEURISTIC_UNIT
    }
}

/// Measures with registered font faces, falling back to the heuristic for
/// families that have none.
#[derive(Debug, Clone)]
pub struct FontMetricsBackend {
    registry: Arc<FontRegistry>,
}

impl FontMetricsBackend {
    pub fn new(registry: Arc<FontRegistry>) -> Self {
        Self { registry }
    }
}

impl MeasureBackend for FontMetricsBackend {
    fn measure(&self, text: &str, font: &FontSpec<'_>) -> f64 {
        match self
            .registry
            .resolve(font.family, font.weight, font.style.is_italic())
        {
            Some(metrics) => metrics.measure(text, font.size),
            None => HeuristicBackend.measure(text, font),
        }
    }
}

type BackendFactory = Box<dyn Fn() -> Arc<dyn MeasureBackend> + Send + Sync>;

/// Shared handle to the measuring surface.
pub struct MeasurementService {
    factory: BackendFactory,
    surface: Mutex<Option<Arc<dyn MeasureBackend>>>,
    constructions: AtomicUsize,
}

impl fmt::Debug for MeasurementService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementService")
            .field("initialized", &self.is_initialized())
            .field("constructions", &self.constructions())
            .finish()
    }
}

impl Default for MeasurementService {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl MeasurementService {
    /// A service whose surface is built by `factory` on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn MeasureBackend> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            surface: Mutex::new(None),
            constructions: AtomicUsize::new(0),
        }
    }

    pub fn heuristic() -> Self {
        Self::new(|| -> Arc<dyn MeasureBackend> { Arc::new(HeuristicBackend) })
    }

    pub fn with_registry(registry: FontRegistry) -> Self {
        let registry = Arc::new(registry);
        Self::new(move || -> Arc<dyn MeasureBackend> {
            Arc::new(FontMetricsBackend::new(Arc::clone(&registry)))
        })
    }

    /// Metrics backend over the settings' fonts, or the heuristic when the
    /// settings carry none.
    pub fn from_settings(settings: &Settings) -> Result<Self, LayoutError> {
        if settings.fonts.is_empty() {
            tracing::debug!("no fonts supplied, measuring with the heuristic estimator");
            return Ok(Self::heuristic());
        }
        let registry = FontRegistry::from_entries(&settings.fonts)?;
        Ok(Self::with_registry(registry))
    }

    /// Width of `text` in pixels.
    pub fn measure(&self, text: &str, font: &FontSpec<'_>) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        self.surface().measure(text, font)
    }

    /// Force construction of the surface.
    pub fn init(&self) {
        self.surface();
    }

    /// Drop the surface; the next measurement builds a fresh one.
    pub fn clear(&self) {
        self.lock().take();
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    /// How many times a surface has been constructed.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }

    fn surface(&self) -> Arc<dyn MeasureBackend> {
        let mut slot = self.lock();
        if let Some(surface) = slot.as_ref() {
            return Arc::clone(surface);
        }
        let surface = (self.factory)();
        self.constructions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("measuring surface constructed");
        *slot = Some(Arc::clone(&surface));
        surface
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn MeasureBackend>>> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
