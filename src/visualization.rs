//! Chart backends and the dispatcher that routes jobs to them.
//!
//! A backend turns a resolved view into a [`Figure`], optionally presents it
//! and serializes it to PNG. The static backend rasterizes while building;
//! the interactive backend keeps a declarative figure document and only
//! rasterizes when it is serialized.

pub mod build;
pub mod figure;
pub mod raster;
pub mod stats;

use std::path::Path;

use tracing::{debug, trace};

use crate::aggregation::{self, View};
use crate::catalog::{BackendKind, ChartJob};
use crate::config::{Rgb, Style};
use crate::error::{ReportError, Result};
use crate::model::Panel;

use self::build::{build_spec, BuildContext};
use self::figure::{supports, FigureSpec};
use self::raster::{crop_to_content, encode_png, rasterize, RasterImage, Theme};

/// Interactive figures use a fixed 7 × 5 in canvas.
pub const INTERACTIVE_SIZE_IN: (f64, f64) = (7.0, 5.0);
const INTERACTIVE_ACCENT: Rgb = Rgb(99, 110, 250);

/// Input to [`Backend::build_figure`].
pub struct FigureRequest<'a> {
    pub job: &'a ChartJob,
    pub view: &'a View,
    /// Title with `{year}` already substituted.
    pub title: String,
}

#[derive(Debug)]
pub enum FigureContent {
    Raster(RasterImage),
    Declarative(FigureSpec),
}

/// A backend-owned figure. Dropping it releases its resources; the sink
/// drops every figure once persisted, on success and failure alike.
#[derive(Debug)]
pub struct Figure {
    id: String,
    backend: BackendKind,
    content: FigureContent,
}

impl Figure {
    pub fn new(id: impl Into<String>, backend: BackendKind, content: FigureContent) -> Self {
        Self {
            id: id.into(),
            backend,
            content,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn content(&self) -> &FigureContent {
        &self.content
    }
}

impl Drop for Figure {
    fn drop(&mut self) {
        trace!(figure = %self.id, "released figure");
    }
}

/// A chart-producing capability.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn build_figure(&self, request: &FigureRequest<'_>) -> Result<Figure>;

    /// Show the figure to a user. Headless runs skip this.
    fn present(&self, figure: &Figure) -> Result<()>;

    /// Write the figure as PNG to `path`.
    fn serialize(&self, figure: &Figure, path: &Path) -> Result<()>;
}

fn check_support(kind: BackendKind, job: &ChartJob) -> Result<()> {
    if supports(kind, job.kind) {
        Ok(())
    } else {
        Err(ReportError::Render(format!(
            "{kind:?} backend cannot draw {:?} charts (job `{}`)",
            job.kind, job.id
        )))
    }
}

/// Crop, encode and write a rasterized figure.
fn write_png(image: &RasterImage, background: Rgb, dpi: u32, path: &Path) -> Result<()> {
    let cropped = crop_to_content(image, background, (dpi / 10).max(1));
    let bytes = encode_png(&cropped)?;
    std::fs::write(path, &bytes).map_err(|source| ReportError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        width = cropped.width,
        height = cropped.height,
        bytes = bytes.len(),
        "wrote figure"
    );
    Ok(())
}

// ── Static backend ──────────────────────────────────────────────────────────

/// Raster figures sized per job, drawn immediately.
pub struct StaticBackend {
    style: Style,
    dpi: u32,
}

impl StaticBackend {
    pub fn new(style: Style, dpi: u32) -> Self {
        Self { style, dpi }
    }

    fn theme(&self) -> Theme {
        Theme::new(&self.style, BackendKind::Static, self.dpi)
    }
}

impl Backend for StaticBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Static
    }

    fn build_figure(&self, request: &FigureRequest<'_>) -> Result<Figure> {
        check_support(BackendKind::Static, request.job)?;
        let spec = build_spec(&BuildContext {
            job: request.job,
            view: request.view,
            title: request.title.clone(),
            style: &self.style,
            size_in: request.job.encoding.size_in,
            accent: self.style.pick(0),
        })?;
        let image = rasterize(&spec, &self.theme(), self.dpi)?;
        Ok(Figure::new(
            request.job.id,
            BackendKind::Static,
            FigureContent::Raster(image),
        ))
    }

    fn present(&self, figure: &Figure) -> Result<()> {
        debug!(figure = figure.id(), "no display attached; skipping presentation");
        Ok(())
    }

    fn serialize(&self, figure: &Figure, path: &Path) -> Result<()> {
        match figure.content() {
            FigureContent::Raster(image) => {
                write_png(image, self.style.page_background, self.dpi, path)
            }
            FigureContent::Declarative(spec) => {
                let image = rasterize(spec, &self.theme(), self.dpi)?;
                write_png(&image, self.style.page_background, self.dpi, path)
            }
        }
    }
}

// ── Interactive backend ─────────────────────────────────────────────────────

/// Declarative figure documents with 3D and hierarchical encodings,
/// rasterized at serialization time.
pub struct InteractiveBackend {
    style: Style,
    dpi: u32,
}

impl InteractiveBackend {
    pub fn new(style: Style, dpi: u32) -> Self {
        Self { style, dpi }
    }
}

impl Backend for InteractiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Interactive
    }

    fn build_figure(&self, request: &FigureRequest<'_>) -> Result<Figure> {
        check_support(BackendKind::Interactive, request.job)?;
        let spec = build_spec(&BuildContext {
            job: request.job,
            view: request.view,
            title: request.title.clone(),
            style: &self.style,
            size_in: INTERACTIVE_SIZE_IN,
            accent: INTERACTIVE_ACCENT,
        })?;
        Ok(Figure::new(
            request.job.id,
            BackendKind::Interactive,
            FigureContent::Declarative(spec),
        ))
    }

    fn present(&self, figure: &Figure) -> Result<()> {
        if let FigureContent::Declarative(spec) = figure.content() {
            let document = serde_json::to_string(spec)
                .map_err(|e| ReportError::Render(format!("figure document: {e}")))?;
            debug!(
                figure = figure.id(),
                traces = spec.trace_count(),
                bytes = document.len(),
                "figure document ready; no display attached"
            );
        }
        Ok(())
    }

    fn serialize(&self, figure: &Figure, path: &Path) -> Result<()> {
        let theme = Theme::new(&self.style, BackendKind::Interactive, self.dpi);
        match figure.content() {
            FigureContent::Declarative(spec) => {
                let image = rasterize(spec, &theme, self.dpi)?;
                write_png(&image, self.style.page_background, self.dpi, path)
            }
            FigureContent::Raster(image) => {
                write_png(image, self.style.page_background, self.dpi, path)
            }
        }
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────────

/// Routes each job to the backend it names.
pub struct Dispatcher {
    backends: Vec<Box<dyn Backend>>,
}

impl Dispatcher {
    /// Both built-in backends sharing one style.
    pub fn new(style: &Style, dpi: u32) -> Self {
        Self::with_backends(vec![
            Box::new(StaticBackend::new(style.clone(), dpi)),
            Box::new(InteractiveBackend::new(style.clone(), dpi)),
        ])
    }

    pub fn with_backends(backends: Vec<Box<dyn Backend>>) -> Self {
        Self { backends }
    }

    pub fn backend(&self, kind: BackendKind) -> Result<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .map(|b| b.as_ref())
            .ok_or_else(|| ReportError::Render(format!("no {kind:?} backend registered")))
    }

    /// Resolve the job's view and build its figure.
    pub fn render(&self, job: &ChartJob, panel: &Panel) -> Result<Figure> {
        let backend = self.backend(job.backend)?;
        let years = job.view.years.years(panel)?;
        let view = aggregation::resolve(panel, &job.view)?;
        debug!(job = job.id, rows = view.height(), "resolved view");
        backend.build_figure(&FigureRequest {
            job,
            view: &view,
            title: job.encoding.title_for(years.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_catalog, ChartKind};
    use crate::config::ReportConfig;
    use crate::synth::synthesize;

    fn job(prefix: &str) -> ChartJob {
        *default_catalog().iter().find(|j| j.id.starts_with(prefix)).unwrap()
    }

    fn small_panel() -> Panel {
        synthesize(&ReportConfig {
            districts: vec!["A".into(), "B".into()],
            years: [2021, 2023],
            ..ReportConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn interactive_figures_stay_declarative() {
        let dispatcher = Dispatcher::new(&Style::default(), 72);
        let figure = dispatcher.render(&job("36_"), &small_panel()).unwrap();
        assert_eq!(figure.backend(), BackendKind::Interactive);
        let FigureContent::Declarative(spec) = figure.content() else {
            panic!("expected a declarative figure");
        };
        assert_eq!(spec.kind, ChartKind::Sunburst);
        assert_eq!(spec.size_in, INTERACTIVE_SIZE_IN);
        assert_eq!(spec.title, "Production Sunburst");
    }

    #[test]
    fn title_carries_the_filtered_year() {
        let dispatcher = Dispatcher::new(&Style::default(), 72);
        let mut job = job("06_");
        job.backend = BackendKind::Interactive;
        let figure = dispatcher.render(&job, &small_panel()).unwrap();
        let FigureContent::Declarative(spec) = figure.content() else {
            panic!("expected a declarative figure");
        };
        assert_eq!(spec.title, "Production Share by District (2023)");
    }

    #[test]
    fn unsupported_kind_is_a_render_error() {
        let dispatcher = Dispatcher::new(&Style::default(), 72);
        let mut job = job("33_");
        job.backend = BackendKind::Static;
        let err = dispatcher.render(&job, &small_panel()).unwrap_err();
        assert!(matches!(err, ReportError::Render(_)));
    }

    #[test]
    fn missing_backend_is_a_render_error() {
        let dispatcher = Dispatcher::with_backends(Vec::new());
        let err = dispatcher.render(&job("01_"), &small_panel()).unwrap_err();
        assert!(matches!(err, ReportError::Render(_)));
    }

    #[test]
    fn view_errors_surface_before_drawing() {
        let dispatcher = Dispatcher::new(&Style::default(), 72);
        // the fixed 2020-2022 filter misses this panel entirely
        let panel = synthesize(&ReportConfig {
            districts: vec!["A".into()],
            years: [2010, 2012],
            ..ReportConfig::default()
        })
        .unwrap();
        let err = dispatcher.render(&job("12_"), &panel).unwrap_err();
        assert!(matches!(err, ReportError::Aggregation(_)));
    }

    #[test]
    fn presenting_a_declarative_figure_is_headless_safe() {
        let backend = InteractiveBackend::new(Style::default(), 72);
        let dispatcher = Dispatcher::new(&Style::default(), 72);
        let figure = dispatcher.render(&job("26_"), &small_panel()).unwrap();
        backend.present(&figure).unwrap();
    }
}
