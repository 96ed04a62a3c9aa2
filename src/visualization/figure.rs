//! Declarative figure description shared by both backends.
//!
//! The interactive backend keeps a `FigureSpec` as its figure and only
//! rasterizes it when persisting; the static backend rasterizes it
//! immediately. The layout mirrors a plotly figure document: a title, a grid
//! of subplots and typed traces per subplot.

use serde::Serialize;

use crate::catalog::{BackendKind, ChartKind};
use crate::config::Rgb;
use crate::visualization::stats::Quartiles;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureSpec {
    pub title: String,
    pub kind: ChartKind,
    pub layout: Layout,
    pub subplots: Vec<Subplot>,
    /// Figure size in inches.
    pub size_in: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layout {
    /// Row-major grid; subplot `i` lands in row `i / columns`.
    Grid { columns: usize },
    /// Main panel with marginal panels above and to the right. Subplots are
    /// `[main, top, right]`.
    Joint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subplot {
    pub title: Option<String>,
    pub frame: Frame,
    pub x_label: String,
    pub y_label: String,
    /// Fixed ranges; derived from the traces when unset.
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub traces: Vec<Trace>,
    pub color_scale: Option<ColorScale>,
    pub rotate_x_labels: bool,
    /// Label only whole-number x ticks, without decimals (years).
    pub integer_x: bool,
}

impl Subplot {
    pub fn cartesian(x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: None,
            frame: Frame::Cartesian { categories: None },
            x_label: x_label.into(),
            y_label: y_label.into(),
            x_range: None,
            y_range: None,
            traces: Vec::new(),
            color_scale: None,
            rotate_x_labels: false,
            integer_x: false,
        }
    }

    pub fn categorical(
        categories: Vec<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
    ) -> Self {
        Self {
            frame: Frame::Cartesian {
                categories: Some(categories),
            },
            ..Self::cartesian(x_label, y_label)
        }
    }

    pub fn with_frame(frame: Frame) -> Self {
        Self {
            frame,
            ..Self::cartesian("", "")
        }
    }

    pub fn push(mut self, trace: Trace) -> Self {
        self.traces.push(trace);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// x/y axes; categorical x places category `i` at `x = i`.
    Cartesian { categories: Option<Vec<String>> },
    /// Angular slices (pie, sunburst).
    Radial,
    /// Labelled square matrix (heatmap).
    Matrix { labels: Vec<String> },
    /// 3D axes.
    Cube { z_label: String },
    /// Nothing drawn; keeps a grid slot empty.
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMap {
    Viridis,
    Plasma,
    /// Diverging blue-white-red, centred on 0.
    CoolWarm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorScale {
    pub map: ColorMap,
    pub label: String,
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    pub fn over(map: ColorMap, label: impl Into<String>, values: &[f64]) -> Self {
        let (min, max) = crate::visualization::stats::finite_bounds(values.iter().copied())
            .unwrap_or((0.0, 1.0));
        Self {
            map,
            label: label.into(),
            min,
            max,
        }
    }

    /// Position of `v` on the scale in `[0, 1]`.
    pub fn normalize(&self, v: f64) -> f64 {
        if self.max > self.min {
            ((v - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else {
            0.5
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub x: f64,
    pub width: f64,
    pub base: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    /// Palette index; children inherit their parent's.
    pub color_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trace {
    Line {
        name: Option<String>,
        points: Vec<(f64, f64)>,
        color: Rgb,
        markers: bool,
        /// Fill down to y = 0 (area chart).
        fill: bool,
    },
    /// Shaded `(x, lo, hi)` band.
    Band {
        points: Vec<(f64, f64, f64)>,
        color: Rgb,
    },
    HLine {
        y: f64,
        label: String,
        color: Rgb,
    },
    Bars {
        name: Option<String>,
        bars: Vec<Bar>,
        color: Rgb,
        value_labels: bool,
    },
    /// Bars drawn sideways: `x` is the bin position along y.
    HBars {
        bars: Vec<Bar>,
        color: Rgb,
    },
    Points {
        name: Option<String>,
        points: Vec<(f64, f64)>,
        /// Per-point colour-scale values; uses the subplot scale.
        values: Option<Vec<f64>>,
        color: Rgb,
        radius_pt: f64,
    },
    /// `(x, mean, err)` with caps.
    ErrorBars {
        points: Vec<(f64, f64, f64)>,
        color: Rgb,
    },
    Boxes {
        boxes: Vec<(f64, Quartiles)>,
        color: Rgb,
    },
    /// Per-category density outlines `(x, [(y, half_width)])`.
    Violins {
        violins: Vec<(f64, Vec<(f64, f64)>)>,
        color: Rgb,
    },
    /// Concentric rings; ring 0 is innermost. Each ring's slices span the full
    /// circle in order, so child slices must follow their parents' order.
    Rings {
        rings: Vec<Vec<Slice>>,
        percent_labels: bool,
    },
    Cells {
        values: Vec<Vec<f64>>,
        annotate: bool,
    },
    Points3d {
        points: Vec<(f64, f64, f64)>,
        values: Vec<f64>,
    },
}

impl Trace {
    /// Data-space x and y values the trace occupies, for axis ranges.
    pub fn extent(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            Trace::Line { points, fill, .. } => {
                let xs = points.iter().map(|p| p.0).collect();
                let mut ys: Vec<f64> = points.iter().map(|p| p.1).collect();
                if *fill {
                    ys.push(0.0);
                }
                (xs, ys)
            }
            Trace::Band { points, .. } => (
                points.iter().map(|p| p.0).collect(),
                points.iter().flat_map(|p| [p.1, p.2]).collect(),
            ),
            Trace::HLine { y, .. } => (Vec::new(), vec![*y]),
            Trace::Bars { bars, .. } => (
                bars.iter()
                    .flat_map(|b| [b.x - b.width / 2.0, b.x + b.width / 2.0])
                    .collect(),
                bars.iter().flat_map(|b| [b.base, b.base + b.height]).collect(),
            ),
            Trace::HBars { bars, .. } => (
                bars.iter().flat_map(|b| [b.base, b.base + b.height]).collect(),
                bars.iter()
                    .flat_map(|b| [b.x - b.width / 2.0, b.x + b.width / 2.0])
                    .collect(),
            ),
            Trace::Points { points, .. } => (
                points.iter().map(|p| p.0).collect(),
                points.iter().map(|p| p.1).collect(),
            ),
            Trace::ErrorBars { points, .. } => (
                points.iter().map(|p| p.0).collect(),
                points.iter().flat_map(|p| [p.1 - p.2, p.1 + p.2]).collect(),
            ),
            Trace::Boxes { boxes, .. } => (
                boxes.iter().map(|b| b.0).collect(),
                boxes
                    .iter()
                    .flat_map(|(_, q)| {
                        let mut v = vec![q.lower_whisker, q.upper_whisker];
                        v.extend(q.outliers.iter().copied());
                        v
                    })
                    .collect(),
            ),
            Trace::Violins { violins, .. } => (
                violins.iter().map(|v| v.0).collect(),
                violins
                    .iter()
                    .flat_map(|(_, outline)| outline.iter().map(|p| p.0))
                    .collect(),
            ),
            Trace::Rings { .. } | Trace::Cells { .. } | Trace::Points3d { .. } => {
                (Vec::new(), Vec::new())
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Trace::Line { name, .. } | Trace::Bars { name, .. } | Trace::Points { name, .. } => {
                name.as_deref()
            }
            Trace::HLine { label, .. } => Some(label.as_str()),
            _ => None,
        }
    }
}

impl FigureSpec {
    pub fn trace_count(&self) -> usize {
        self.subplots.iter().map(|s| s.traces.len()).sum()
    }

    /// Pixel size at `dpi`.
    pub fn pixels(&self, dpi: u32) -> (u32, u32) {
        let w = (self.size_in.0 * f64::from(dpi)).round().max(1.0) as u32;
        let h = (self.size_in.1 * f64::from(dpi)).round().max(1.0) as u32;
        (w, h)
    }
}

/// Which chart kinds a backend family can draw.
pub fn supports(backend: BackendKind, kind: ChartKind) -> bool {
    match backend {
        BackendKind::Static => !matches!(kind, ChartKind::Scatter3d | ChartKind::Sunburst),
        BackendKind::Interactive => matches!(
            kind,
            ChartKind::Line
                | ChartKind::Area
                | ChartKind::Bar
                | ChartKind::GroupedBar
                | ChartKind::StackedBar
                | ChartKind::Scatter
                | ChartKind::Histogram
                | ChartKind::Box
                | ChartKind::Violin
                | ChartKind::Pie
                | ChartKind::Heatmap
                | ChartKind::PairGrid
                | ChartKind::Scatter3d
                | ChartKind::Sunburst
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_line_extent_includes_zero() {
        let t = Trace::Line {
            name: None,
            points: vec![(1.0, 5.0), (2.0, 7.0)],
            color: Rgb(0, 0, 0),
            markers: false,
            fill: true,
        };
        let (xs, ys) = t.extent();
        assert_eq!(xs, vec![1.0, 2.0]);
        assert!(ys.contains(&0.0));
    }

    #[test]
    fn color_scale_normalizes_and_handles_constant_input() {
        let s = ColorScale::over(ColorMap::Viridis, "Year", &[2010.0, 2020.0]);
        assert_eq!(s.normalize(2015.0), 0.5);
        assert_eq!(s.normalize(1900.0), 0.0);
        let flat = ColorScale::over(ColorMap::Viridis, "Year", &[3.0, 3.0]);
        assert_eq!(flat.normalize(3.0), 0.5);
    }

    #[test]
    fn capability_profiles_differ() {
        assert!(supports(BackendKind::Static, ChartKind::FacetLine));
        assert!(!supports(BackendKind::Interactive, ChartKind::FacetLine));
        assert!(supports(BackendKind::Interactive, ChartKind::Sunburst));
        assert!(!supports(BackendKind::Static, ChartKind::Scatter3d));
    }

    #[test]
    fn pixel_size_follows_dpi() {
        let spec = FigureSpec {
            title: String::new(),
            kind: ChartKind::Line,
            layout: Layout::Grid { columns: 1 },
            subplots: Vec::new(),
            size_in: (10.0, 6.0),
        };
        assert_eq!(spec.pixels(300), (3000, 1800));
        assert_eq!(spec.pixels(100), (1000, 600));
    }
}
