//! Rasterizes a [`FigureSpec`] into an RGB buffer with plotters, then crops
//! and encodes it as PNG.

use std::f64::consts::{FRAC_PI_2, TAU};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;

use crate::catalog::BackendKind;
use crate::config::{Rgb, Style};
use crate::error::Result;
use crate::visualization::figure::{
    Bar, ColorMap, ColorScale, FigureSpec, Frame, Layout, Slice, Subplot, Trace,
};
use crate::visualization::stats;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Chart2d<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Tightly packed 8-bit RGB pixels, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RasterImage({}x{})", self.width, self.height)
    }
}

/// Pixel-space styling derived from [`Style`] at a given dpi.
#[derive(Debug, Clone)]
pub struct Theme {
    font: String,
    px_per_pt: f64,
    title_px: f64,
    label_px: f64,
    tick_px: f64,
    pub page: Rgb,
    plot: Rgb,
    grid: Rgb,
    palette: Vec<Rgb>,
}

impl Theme {
    pub fn new(style: &Style, backend: BackendKind, dpi: u32) -> Self {
        let px_per_pt = f64::from(dpi) / 72.0;
        Self {
            font: style.font_family.clone(),
            px_per_pt,
            title_px: style.title_pt * px_per_pt,
            label_px: style.label_pt * px_per_pt,
            tick_px: style.tick_pt * px_per_pt,
            page: style.page_background,
            plot: match backend {
                BackendKind::Static => style.static_background,
                BackendKind::Interactive => style.interactive_background,
            },
            grid: style.grid,
            palette: style.palette.clone(),
        }
    }

    fn px(&self, pt: f64) -> f64 {
        pt * self.px_per_pt
    }

    fn font(&self, px: f64) -> FontDesc<'_> {
        (self.font.as_str(), px).into_font()
    }

    fn line(&self) -> u32 {
        self.px(1.2).round().max(1.0) as u32
    }

    fn margin(&self) -> u32 {
        self.px(8.0).round() as u32
    }

    /// Room for tick labels of `chars` characters plus the axis title.
    fn label_area(&self, chars: usize) -> u32 {
        (self.tick_px * (0.62 * chars as f64 + 1.0) + self.label_px * 1.8).round() as u32
    }

    fn pick(&self, i: usize) -> RGBColor {
        match self.palette.len() {
            0 => BLUE,
            n => rgb(self.palette[i % n]),
        }
    }
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

fn lighten(c: RGBColor, amount: f64) -> RGBColor {
    let mix = |v: u8| (f64::from(v) + (255.0 - f64::from(v)) * amount).round() as u8;
    RGBColor(mix(c.0), mix(c.1), mix(c.2))
}

const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];
const PLASMA: [(u8, u8, u8); 5] = [
    (13, 8, 135),
    (126, 3, 168),
    (204, 71, 120),
    (248, 149, 64),
    (240, 249, 33),
];
const COOLWARM: [(u8, u8, u8); 5] = [
    (59, 76, 192),
    (141, 176, 254),
    (221, 221, 221),
    (244, 154, 123),
    (180, 4, 38),
];

/// Colour at `t` in `[0, 1]`, linearly interpolated between map stops.
pub fn color_at(map: ColorMap, t: f64) -> RGBColor {
    let stops = match map {
        ColorMap::Viridis => &VIRIDIS,
        ColorMap::Plasma => &PLASMA,
        ColorMap::CoolWarm => &COOLWARM,
    };
    if !t.is_finite() {
        return RGBColor(190, 190, 190);
    }
    let pos = t.clamp(0.0, 1.0) * (stops.len() - 1) as f64;
    let i = (pos.floor() as usize).min(stops.len() - 2);
    let f = pos - i as f64;
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * f).round() as u8;
    let (a, b) = (stops[i], stops[i + 1]);
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Label of the category at integer tick `v`; blank between categories.
fn category_label(categories: &[String], v: f64) -> String {
    let r = v.round();
    if (v - r).abs() > 1e-6 || r < 0.0 {
        return String::new();
    }
    categories.get(r as usize).cloned().unwrap_or_default()
}

/// Whole-number tick label; blank for fractional ticks.
fn integer_label(v: f64) -> String {
    let r = v.round();
    if (v - r).abs() > 1e-6 {
        String::new()
    } else {
        format!("{r:.0}")
    }
}

fn padded(bounds: Option<(f64, f64)>) -> (f64, f64) {
    match bounds {
        Some((lo, hi)) if hi > lo => {
            let pad = (hi - lo) * 0.05;
            (lo - pad, hi + pad)
        }
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (0.0, 1.0),
    }
}

// ── Entry points ────────────────────────────────────────────────────────────

pub fn rasterize(spec: &FigureSpec, theme: &Theme, dpi: u32) -> Result<RasterImage> {
    let (width, height) = spec.pixels(dpi);
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&rgb(theme.page))?;
        let body = if spec.title.is_empty() {
            root.clone()
        } else {
            root.titled(&spec.title, theme.font(theme.title_px).color(&BLACK))?
        };
        match spec.layout {
            Layout::Grid { columns } => {
                let columns = columns.max(1);
                let rows = spec.subplots.len().div_ceil(columns).max(1);
                let cells = body.split_evenly((rows, columns));
                for (cell, subplot) in cells.iter().zip(&spec.subplots) {
                    draw_subplot(cell, subplot, theme)?;
                }
            }
            Layout::Joint => {
                let (w, h) = body.dim_in_pixel();
                let (top, bottom) = body.split_vertically((f64::from(h) * 0.2) as i32);
                let (main, right) = bottom.split_horizontally((f64::from(w) * 0.8) as i32);
                let (top, _corner) = top.split_horizontally((f64::from(w) * 0.8) as i32);
                let areas = [&main, &top, &right];
                for (area, subplot) in areas.into_iter().zip(&spec.subplots) {
                    draw_subplot(area, subplot, theme)?;
                }
            }
        }
        root.present()?;
    }
    Ok(RasterImage {
        width,
        height,
        pixels,
    })
}

/// Trim uniform `background` margins, keeping `pad` pixels around the content.
pub fn crop_to_content(image: &RasterImage, background: Rgb, pad: u32) -> RasterImage {
    let bg = [background.0, background.1, background.2];
    let (w, h) = (image.width, image.height);
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in 0..h {
        for x in 0..w {
            if image.pixel(x, y) != bg {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
    }
    let Some((x0, y0, x1, y1)) = bounds else {
        return image.clone();
    };
    let x0 = x0.saturating_sub(pad);
    let y0 = y0.saturating_sub(pad);
    let x1 = (x1 + pad + 1).min(w);
    let y1 = (y1 + pad + 1).min(h);

    let stride = w as usize * 3;
    let mut pixels = Vec::with_capacity((x1 - x0) as usize * (y1 - y0) as usize * 3);
    for y in y0..y1 {
        let start = y as usize * stride + x0 as usize * 3;
        let end = y as usize * stride + x1 as usize * 3;
        pixels.extend_from_slice(&image.pixels[start..end]);
    }
    RasterImage {
        width: x1 - x0,
        height: y1 - y0,
        pixels,
    }
}

pub fn encode_png(image: &RasterImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        &image.pixels,
        image.width,
        image.height,
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}

// ── Subplots ────────────────────────────────────────────────────────────────

fn draw_subplot(area: &Area<'_>, subplot: &Subplot, theme: &Theme) -> Result<()> {
    let (plot, bar) = match (&subplot.color_scale, &subplot.frame) {
        (Some(scale), Frame::Cartesian { .. } | Frame::Matrix { .. } | Frame::Cube { .. }) => {
            let (w, _) = area.dim_in_pixel();
            let (plot, bar) = area.split_horizontally((f64::from(w) * 0.86) as i32);
            (plot, Some((bar, scale)))
        }
        _ => (area.clone(), None),
    };
    match &subplot.frame {
        Frame::Cartesian { categories } => draw_cartesian(&plot, subplot, categories.as_deref(), theme)?,
        Frame::Radial => draw_radial(&plot, subplot, theme)?,
        Frame::Matrix { labels } => draw_matrix(&plot, subplot, labels, theme)?,
        Frame::Cube { z_label } => draw_cube(&plot, subplot, z_label, theme)?,
        Frame::Blank => {}
    }
    if let Some((bar, scale)) = bar {
        draw_colorbar(&bar, scale, theme)?;
    }
    Ok(())
}

fn draw_cartesian(
    area: &Area<'_>,
    subplot: &Subplot,
    categories: Option<&[String]>,
    theme: &Theme,
) -> Result<()> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = subplot.traces.iter().fold(
        (Vec::new(), Vec::new()),
        |(mut xs, mut ys), t| {
            let (tx, ty) = t.extent();
            xs.extend(tx);
            ys.extend(ty);
            (xs, ys)
        },
    );
    let (x0, x1) = subplot.x_range.unwrap_or_else(|| match categories {
        Some(c) => (-0.5, c.len().max(1) as f64 - 0.5),
        None => padded(stats::finite_bounds(xs)),
    });
    let (y0, y1) = subplot
        .y_range
        .unwrap_or_else(|| padded(stats::finite_bounds(ys)));

    let longest = categories
        .map(|c| c.iter().map(|s| s.chars().count()).max().unwrap_or(1))
        .unwrap_or(4);
    let rotate = subplot.rotate_x_labels && categories.is_some();
    let x_area = if rotate {
        theme.label_area(longest)
    } else {
        theme.label_area(1)
    };

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(theme.margin())
        .x_label_area_size(x_area)
        .y_label_area_size(theme.label_area(7));
    if let Some(title) = &subplot.title {
        builder.caption(title, theme.font(theme.label_px));
    }
    let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1)?;
    chart.plotting_area().fill(&rgb(theme.plot))?;

    let names = categories.map(<[String]>::to_vec).unwrap_or_default();
    let format_category = |v: &f64| category_label(&names, *v);
    let format_integer = |v: &f64| integer_label(*v);
    let tick_font = theme.font(theme.tick_px);
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(subplot.x_label.as_str())
        .y_desc(subplot.y_label.as_str())
        .label_style(tick_font.clone())
        .axis_desc_style(theme.font(theme.label_px))
        .bold_line_style(rgb(theme.grid).stroke_width(theme.line()))
        .light_line_style(TRANSPARENT);
    if categories.is_some() {
        mesh.x_labels(names.len() + 1)
            .x_label_formatter(&format_category);
    } else if subplot.integer_x {
        mesh.x_label_formatter(&format_integer);
    }
    if rotate {
        mesh.x_label_style(tick_font.transform(FontTransform::Rotate90));
    }
    mesh.draw()?;

    let mut legend = false;
    for trace in &subplot.traces {
        legend |= draw_trace(&mut chart, trace, subplot, theme, (x0, x1))?;
    }
    if legend {
        // samples span two keys, so text starts one key after them
        chart
            .configure_series_labels()
            .legend_area_size(legend_key(theme) * 3)
            .label_font(theme.font(theme.tick_px))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Half-height of a legend sample, in pixels.
fn legend_key(theme: &Theme) -> i32 {
    ((theme.tick_px * 0.5) as i32).max(1)
}

/// Draws one trace; returns whether it registered a legend entry.
fn draw_trace(
    chart: &mut Chart2d<'_, '_>,
    trace: &Trace,
    subplot: &Subplot,
    theme: &Theme,
    (x0, x1): (f64, f64),
) -> Result<bool> {
    let line = theme.line();
    let key = legend_key(theme);
    match trace {
        Trace::Line {
            name,
            points,
            color,
            markers,
            fill,
        } => {
            let c = rgb(*color);
            let style = c.stroke_width(line * 2);
            let anno = if *fill {
                chart.draw_series(
                    AreaSeries::new(points.iter().copied(), 0.0, c.mix(0.3).filled())
                        .border_style(style),
                )?
            } else {
                chart.draw_series(LineSeries::new(points.iter().copied(), style))?
            };
            let labelled = name.is_some();
            if let Some(name) = name {
                anno.label(name.as_str()).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 2 * key, y)], c.stroke_width(line * 2))
                });
            }
            if *markers {
                let r = theme.px(3.0) as i32;
                chart.draw_series(points.iter().map(|p| Circle::new(*p, r, c.filled())))?;
            }
            Ok(labelled)
        }
        Trace::Band { points, color } => {
            let mut outline: Vec<(f64, f64)> = points.iter().map(|p| (p.0, p.1)).collect();
            outline.extend(points.iter().rev().map(|p| (p.0, p.2)));
            chart.draw_series(std::iter::once(Polygon::new(
                outline,
                rgb(*color).mix(0.2).filled(),
            )))?;
            Ok(false)
        }
        Trace::HLine { y, label, color } => {
            let c = rgb(*color);
            let dashes = 40;
            let step = (x1 - x0) / (2 * dashes) as f64;
            let anno = chart.draw_series((0..dashes).map(|i| {
                let a = x0 + step * (2 * i) as f64;
                PathElement::new(vec![(a, *y), (a + step, *y)], c.stroke_width(line * 2))
            }))?;
            anno.label(label.as_str()).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 2 * key, y)], c.stroke_width(line * 2))
            });
            Ok(true)
        }
        Trace::Bars {
            name,
            bars,
            color,
            value_labels,
        } => {
            let c = rgb(*color);
            let edge = rgb(theme.page);
            let rect = |b: &Bar| {
                [
                    (b.x - b.width / 2.0, b.base),
                    (b.x + b.width / 2.0, b.base + b.height),
                ]
            };
            let anno = chart.draw_series(
                bars.iter()
                    .map(|b| Rectangle::new(rect(b), c.mix(0.85).filled())),
            )?;
            if let Some(name) = name {
                anno.label(name.as_str()).legend(move |(x, y)| {
                    Rectangle::new([(x, y - key), (x + 2 * key, y + key)], c.filled())
                });
            }
            chart.draw_series(
                bars.iter()
                    .map(|b| Rectangle::new(rect(b), edge.stroke_width(line))),
            )?;
            if *value_labels {
                let style = theme
                    .font(theme.tick_px * 0.8)
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Bottom));
                chart.draw_series(bars.iter().map(|b| {
                    Text::new(
                        format!("{:.0}", b.height),
                        (b.x, b.base + b.height),
                        style.clone(),
                    )
                }))?;
            }
            Ok(name.is_some())
        }
        Trace::HBars { bars, color } => {
            let c = rgb(*color);
            chart.draw_series(bars.iter().map(|b| {
                Rectangle::new(
                    [
                        (b.base, b.x - b.width / 2.0),
                        (b.base + b.height, b.x + b.width / 2.0),
                    ],
                    c.mix(0.85).filled(),
                )
            }))?;
            Ok(false)
        }
        Trace::Points {
            name,
            points,
            values,
            color,
            radius_pt,
        } => {
            let fixed = rgb(*color);
            let r = theme.px(*radius_pt).round().max(1.0) as i32;
            let fill = |i: usize| match (values, &subplot.color_scale) {
                (Some(v), Some(scale)) => color_at(scale.map, scale.normalize(v[i])),
                _ => fixed,
            };
            let anno = chart.draw_series(
                points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Circle::new(*p, r, fill(i).mix(0.75).filled())),
            )?;
            if let Some(name) = name {
                anno.label(name.as_str())
                    .legend(move |(x, y)| Circle::new((x + key, y), key, fixed.filled()));
            }
            Ok(name.is_some())
        }
        Trace::ErrorBars { points, color } => {
            let c = rgb(*color).stroke_width(line * 2);
            let cap = (x1 - x0) * 0.012;
            for (x, m, e) in points {
                chart.draw_series([
                    PathElement::new(vec![(*x, m - e), (*x, m + e)], c),
                    PathElement::new(vec![(x - cap, m - e), (x + cap, m - e)], c),
                    PathElement::new(vec![(x - cap, m + e), (x + cap, m + e)], c),
                ])?;
            }
            Ok(false)
        }
        Trace::Boxes { boxes, color } => {
            let fill = rgb(*color).mix(0.7).filled();
            let edge = BLACK.mix(0.8).stroke_width(line);
            let r = theme.px(2.0) as i32;
            let half = 0.3;
            for (x, q) in boxes {
                let x = *x;
                chart.draw_series([
                    Rectangle::new([(x - half, q.q1), (x + half, q.q3)], fill),
                    Rectangle::new([(x - half, q.q1), (x + half, q.q3)], edge),
                ])?;
                chart.draw_series([
                    PathElement::new(vec![(x - half, q.median), (x + half, q.median)], edge),
                    PathElement::new(vec![(x, q.q3), (x, q.upper_whisker)], edge),
                    PathElement::new(vec![(x, q.q1), (x, q.lower_whisker)], edge),
                    PathElement::new(
                        vec![(x - half / 2.0, q.upper_whisker), (x + half / 2.0, q.upper_whisker)],
                        edge,
                    ),
                    PathElement::new(
                        vec![(x - half / 2.0, q.lower_whisker), (x + half / 2.0, q.lower_whisker)],
                        edge,
                    ),
                ])?;
                chart.draw_series(
                    q.outliers
                        .iter()
                        .map(|o| Circle::new((x, *o), r, BLACK.mix(0.6).stroke_width(line))),
                )?;
            }
            Ok(false)
        }
        Trace::Violins { violins, color } => {
            let c = rgb(*color);
            for (x, outline) in violins {
                let mut shape: Vec<(f64, f64)> = outline.iter().map(|(v, w)| (x + w, *v)).collect();
                shape.extend(outline.iter().rev().map(|(v, w)| (x - w, *v)));
                let mut closed = shape.clone();
                if let Some(first) = shape.first() {
                    closed.push(*first);
                }
                chart.draw_series(std::iter::once(Polygon::new(shape, c.mix(0.6).filled())))?;
                chart.draw_series(std::iter::once(PathElement::new(
                    closed,
                    BLACK.mix(0.7).stroke_width(line),
                )))?;
            }
            Ok(false)
        }
        Trace::Rings { .. } | Trace::Cells { .. } | Trace::Points3d { .. } => Ok(false),
    }
}

fn draw_colorbar(area: &Area<'_>, scale: &ColorScale, theme: &Theme) -> Result<()> {
    let (lo, hi) = if scale.max > scale.min {
        (scale.min, scale.max)
    } else {
        (scale.min - 0.5, scale.max + 0.5)
    };
    let mut chart = ChartBuilder::on(area)
        .margin(theme.margin())
        .margin_top(theme.margin() * 4)
        .margin_bottom(theme.margin() * 4)
        .y_label_area_size(theme.label_area(6))
        .build_cartesian_2d(0.0..1.0, lo..hi)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(scale.label.as_str())
        .label_style(theme.font(theme.tick_px))
        .axis_desc_style(theme.font(theme.label_px))
        .draw()?;
    let steps = 64;
    let step = (hi - lo) / f64::from(steps);
    chart.draw_series((0..steps).map(|i| {
        let a = lo + step * f64::from(i);
        Rectangle::new(
            [(0.0, a), (1.0, a + step)],
            color_at(scale.map, scale.normalize(a + step / 2.0)).filled(),
        )
    }))?;
    Ok(())
}

fn draw_matrix(area: &Area<'_>, subplot: &Subplot, labels: &[String], theme: &Theme) -> Result<()> {
    let Some((values, annotate)) = subplot.traces.iter().find_map(|t| match t {
        Trace::Cells { values, annotate } => Some((values, *annotate)),
        _ => None,
    }) else {
        return Ok(());
    };
    let k = labels.len().max(1);
    let top = (k - 1) as f64;
    let longest = labels.iter().map(|l| l.chars().count()).max().unwrap_or(1);
    let format_x = |v: &f64| category_label(labels, *v);
    let format_y = |v: &f64| category_label(labels, top - *v);

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(theme.margin())
        .x_label_area_size(theme.label_area(longest))
        .y_label_area_size(theme.label_area(longest));
    if let Some(title) = &subplot.title {
        builder.caption(title, theme.font(theme.label_px));
    }
    let mut chart = builder.build_cartesian_2d(-0.5..top + 0.5, -0.5..top + 0.5)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(k + 1)
        .y_labels(k + 1)
        .x_label_formatter(&format_x)
        .y_label_formatter(&format_y)
        .label_style(theme.font(theme.tick_px))
        .x_label_style(theme.font(theme.tick_px).transform(FontTransform::Rotate90))
        .draw()?;

    let scale = subplot.color_scale.clone().unwrap_or(ColorScale {
        map: ColorMap::CoolWarm,
        label: String::new(),
        min: -1.0,
        max: 1.0,
    });
    for (i, row) in values.iter().enumerate() {
        let y = top - i as f64;
        chart.draw_series(row.iter().enumerate().map(|(j, v)| {
            let x = j as f64;
            Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                color_at(scale.map, scale.normalize(*v)).filled(),
            )
        }))?;
        if annotate {
            chart.draw_series(row.iter().enumerate().map(|(j, v)| {
                let strong = (scale.normalize(*v) - 0.5).abs() > 0.3;
                let ink = if strong { WHITE } else { BLACK };
                Text::new(
                    format!("{v:.2}"),
                    (j as f64, y),
                    theme
                        .font(theme.tick_px)
                        .color(&ink)
                        .pos(Pos::new(HPos::Center, VPos::Center)),
                )
            }))?;
        }
    }
    Ok(())
}

fn draw_cube(area: &Area<'_>, subplot: &Subplot, z_label: &str, theme: &Theme) -> Result<()> {
    let Some((points, values)) = subplot.traces.iter().find_map(|t| match t {
        Trace::Points3d { points, values } => Some((points, values)),
        _ => None,
    }) else {
        return Ok(());
    };
    // the vertical plotters axis carries the third variable
    let (x0, x1) = padded(stats::finite_bounds(points.iter().map(|p| p.0)));
    let (d0, d1) = padded(stats::finite_bounds(points.iter().map(|p| p.1)));
    let (v0, v1) = padded(stats::finite_bounds(points.iter().map(|p| p.2)));
    let caption = format!(
        "x: {}  |  depth: {}  |  up: {}",
        subplot.x_label, subplot.y_label, z_label
    );

    let mut chart = ChartBuilder::on(area)
        .margin(theme.margin())
        .caption(caption, theme.font(theme.tick_px))
        .build_cartesian_3d(x0..x1, v0..v1, d0..d1)?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.7;
        pb.pitch = 0.35;
        pb.scale = 0.8;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .label_style(theme.font(theme.tick_px))
        .draw()?;

    let fixed = theme.pick(0);
    let r = theme.px(2.5) as i32;
    chart.draw_series(points.iter().enumerate().map(|(i, (x, d, v))| {
        let c = match (&subplot.color_scale, values.get(i)) {
            (Some(scale), Some(value)) => color_at(scale.map, scale.normalize(*value)),
            _ => fixed,
        };
        Circle::new((*x, *v, *d), r, c.mix(0.8).filled())
    }))?;
    Ok(())
}

fn draw_radial(area: &Area<'_>, subplot: &Subplot, theme: &Theme) -> Result<()> {
    let Some((rings, percent_labels)) = subplot.traces.iter().find_map(|t| match t {
        Trace::Rings {
            rings,
            percent_labels,
        } => Some((rings, *percent_labels)),
        _ => None,
    }) else {
        return Ok(());
    };
    let (w, h) = area.dim_in_pixel();
    let center = (f64::from(w) / 2.0, f64::from(h) / 2.0);
    let radius = f64::from(w.min(h)) * 0.36;
    let depth = rings.len().max(1) as f64;
    let hole = if rings.len() > 1 { radius / (depth + 1.0) } else { 0.0 };
    let thickness = (radius - hole) / depth;
    let edge = rgb(theme.page).stroke_width(theme.line() * 2);

    for (level, ring) in rings.iter().enumerate() {
        let r0 = hole + thickness * level as f64;
        let r1 = r0 + thickness;
        for (slice, (start, end)) in ring.iter().zip(slice_angles(ring)) {
            let color = lighten(theme.pick(slice.color_index), 0.25 * level as f64);
            let outline = sector(center, r0, r1, start, end);
            let mut closed = outline.clone();
            closed.push(outline[0]);
            area.draw(&Polygon::new(outline, color.filled()))?;
            area.draw(&PathElement::new(closed, edge))?;

            let mid = (start + end) / 2.0;
            let at = |r: f64| {
                (
                    (center.0 + r * mid.cos()).round() as i32,
                    (center.1 + r * mid.sin()).round() as i32,
                )
            };
            if rings.len() == 1 {
                let side = if mid.cos() >= 0.0 { HPos::Left } else { HPos::Right };
                area.draw(&Text::new(
                    slice.label.clone(),
                    at(r1 * 1.08),
                    theme
                        .font(theme.tick_px)
                        .color(&BLACK)
                        .pos(Pos::new(side, VPos::Center)),
                ))?;
                if percent_labels {
                    area.draw(&Text::new(
                        format!("{:.1}%", 100.0 * (end - start) / TAU),
                        at(r1 * 0.7),
                        theme
                            .font(theme.tick_px * 0.8)
                            .color(&BLACK)
                            .pos(Pos::new(HPos::Center, VPos::Center)),
                    ))?;
                }
            } else {
                let arc = (end - start) * (r0 + r1) / 2.0;
                let needed = theme.tick_px * 0.6 * slice.label.chars().count() as f64;
                if arc >= needed.min(thickness * 2.0) && end - start > 0.08 {
                    area.draw(&Text::new(
                        slice.label.clone(),
                        at((r0 + r1) / 2.0),
                        theme
                            .font(theme.tick_px * 0.8)
                            .color(&BLACK)
                            .pos(Pos::new(HPos::Center, VPos::Center)),
                    ))?;
                }
            }
        }
    }
    Ok(())
}

/// Start and end angle of each slice, clockwise from 12 o'clock.
fn slice_angles(ring: &[Slice]) -> Vec<(f64, f64)> {
    let total: f64 = ring.iter().map(|s| s.value.max(0.0)).sum();
    let mut start = -FRAC_PI_2;
    ring.iter()
        .map(|s| {
            let sweep = if total > 0.0 {
                TAU * s.value.max(0.0) / total
            } else {
                0.0
            };
            let span = (start, start + sweep);
            start += sweep;
            span
        })
        .collect()
}

/// Annular sector outline in pixel coordinates. `r0 == 0` gives a wedge.
fn sector(center: (f64, f64), r0: f64, r1: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    let steps = (((end - start).abs() / TAU) * 180.0).ceil().max(2.0) as usize;
    let point = |r: f64, a: f64| {
        (
            (center.0 + r * a.cos()).round() as i32,
            (center.1 + r * a.sin()).round() as i32,
        )
    };
    let angle = |i: usize| start + (end - start) * i as f64 / steps as f64;
    let mut outline: Vec<(i32, i32)> = (0..=steps).map(|i| point(r1, angle(i))).collect();
    if r0 > 0.0 {
        outline.extend((0..=steps).rev().map(|i| point(r0, angle(i))));
    } else {
        outline.push(point(0.0, 0.0));
    }
    outline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ChartKind;

    fn image(width: u32, height: u32, fill: [u8; 3]) -> RasterImage {
        RasterImage {
            width,
            height,
            pixels: fill.repeat((width * height) as usize),
        }
    }

    fn paint(img: &mut RasterImage, x: u32, y: u32, c: [u8; 3]) {
        let i = (y as usize * img.width as usize + x as usize) * 3;
        img.pixels[i..i + 3].copy_from_slice(&c);
    }

    #[test]
    fn crop_keeps_content_plus_padding() {
        let mut img = image(100, 80, [255, 255, 255]);
        paint(&mut img, 40, 30, [0, 0, 0]);
        paint(&mut img, 60, 50, [10, 20, 30]);
        let cropped = crop_to_content(&img, Rgb(255, 255, 255), 5);
        assert_eq!((cropped.width, cropped.height), (31, 31));
        assert_eq!(cropped.pixel(5, 5), [0, 0, 0]);
        assert_eq!(cropped.pixel(25, 25), [10, 20, 30]);
    }

    #[test]
    fn crop_clamps_padding_at_edges_and_ignores_blank_images() {
        let mut img = image(10, 10, [255, 255, 255]);
        paint(&mut img, 0, 9, [1, 1, 1]);
        let cropped = crop_to_content(&img, Rgb(255, 255, 255), 3);
        assert_eq!((cropped.width, cropped.height), (4, 4));

        let blank = image(10, 10, [255, 255, 255]);
        assert_eq!(crop_to_content(&blank, Rgb(255, 255, 255), 3), blank);
    }

    #[test]
    fn color_maps_hit_their_end_stops() {
        assert_eq!(color_at(ColorMap::Viridis, 0.0), RGBColor(68, 1, 84));
        assert_eq!(color_at(ColorMap::Viridis, 1.0), RGBColor(253, 231, 37));
        assert_eq!(color_at(ColorMap::CoolWarm, 0.5), RGBColor(221, 221, 221));
        assert_eq!(color_at(ColorMap::Plasma, 7.0), color_at(ColorMap::Plasma, 1.0));
        assert_eq!(color_at(ColorMap::Plasma, f64::NAN), RGBColor(190, 190, 190));
    }

    #[test]
    fn category_labels_only_on_integer_ticks() {
        let cats = vec!["Candi".to_string(), "Porong".to_string()];
        assert_eq!(category_label(&cats, 1.0), "Porong");
        assert_eq!(category_label(&cats, 0.5), "");
        assert_eq!(category_label(&cats, -1.0), "");
        assert_eq!(category_label(&cats, 2.0), "");
    }

    #[test]
    fn integer_labels_drop_decimals_and_fractional_ticks() {
        assert_eq!(integer_label(2010.0), "2010");
        assert_eq!(integer_label(2011.999_999_9), "2012");
        assert_eq!(integer_label(2012.5), "");
    }

    #[test]
    fn slice_angles_cover_the_circle() {
        let ring: Vec<Slice> = [1.0, 2.0, 1.0]
            .iter()
            .enumerate()
            .map(|(i, v)| Slice {
                label: i.to_string(),
                value: *v,
                color_index: i,
            })
            .collect();
        let angles = slice_angles(&ring);
        assert!((angles[0].0 + FRAC_PI_2).abs() < 1e-12);
        assert!((angles[2].1 - (TAU - FRAC_PI_2)).abs() < 1e-9);
        assert!((angles[1].1 - angles[1].0 - TAU / 2.0).abs() < 1e-9);
    }

    #[test]
    fn wedge_closes_on_center() {
        let outline = sector((50.0, 50.0), 0.0, 10.0, 0.0, FRAC_PI_2);
        assert_eq!(outline.first(), Some(&(60, 50)));
        assert_eq!(outline.last(), Some(&(50, 50)));
    }

    #[test]
    fn untitled_blank_figure_rasterizes_to_page_colour() {
        let spec = FigureSpec {
            title: String::new(),
            kind: ChartKind::Line,
            layout: Layout::Grid { columns: 2 },
            subplots: vec![
                Subplot::with_frame(Frame::Blank),
                Subplot::with_frame(Frame::Blank),
            ],
            size_in: (2.0, 1.0),
        };
        let style = Style::default();
        let theme = Theme::new(&style, BackendKind::Static, 50);
        let img = rasterize(&spec, &theme, 50).unwrap();
        assert_eq!((img.width, img.height), (100, 50));
        assert!(img.pixels.chunks(3).all(|p| p == [255, 255, 255]));
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
