//! Turns a resolved view plus a chart encoding into a [`FigureSpec`].
//!
//! Both backends draw from the same description; they differ in theme,
//! figure size and when rasterization happens.

use polars::prelude::DataFrame;

use crate::aggregation::{AggregatedView, CorrelationMatrix, Reduction, View};
use crate::catalog::{ChartJob, ChartKind, Encoding};
use crate::config::{Rgb, Style};
use crate::error::{ReportError, Result};
use crate::model::{float_column, label_column, require_columns, Field};
use crate::schema::region;
use crate::visualization::figure::{
    Bar, ColorMap, ColorScale, FigureSpec, Frame, Layout, Slice, Subplot, Trace,
};
use crate::visualization::stats;

const BAR_WIDTH: f64 = 0.8;
const STRIP_WIDTH: f64 = 0.7;
const VIOLIN_HALF_WIDTH: f64 = 0.4;
const KDE_POINTS: usize = 128;
const VIOLIN_POINTS: usize = 64;
const SCATTER_RADIUS_PT: f64 = 3.0;
const SMALL_RADIUS_PT: f64 = 1.5;

/// Everything the builder needs for one figure.
pub struct BuildContext<'a> {
    pub job: &'a ChartJob,
    pub view: &'a View,
    pub title: String,
    pub style: &'a Style,
    pub size_in: (f64, f64),
    /// Colour of single-series charts without an explicit series colour.
    pub accent: Rgb,
}

impl BuildContext<'_> {
    fn encoding(&self) -> &Encoding {
        &self.job.encoding
    }

    fn series_color(&self) -> Rgb {
        self.encoding().series_color.unwrap_or(self.accent)
    }

    fn need(&self, field: Option<Field>, channel: &str) -> Result<Field> {
        field.ok_or_else(|| {
            ReportError::Render(format!(
                "{:?} chart `{}` has no `{channel}` encoding",
                self.job.kind, self.job.id
            ))
        })
    }

    fn rows(&self) -> Result<&DataFrame> {
        match self.view {
            View::Rows(df) => Ok(df),
            _ => Err(self.wrong_view("row-level")),
        }
    }

    fn table(&self) -> Result<&AggregatedView> {
        match self.view {
            View::Table(t) => Ok(t),
            _ => Err(self.wrong_view("aggregated")),
        }
    }

    fn matrix(&self) -> Result<&CorrelationMatrix> {
        match self.view {
            View::Matrix(m) => Ok(m),
            _ => Err(self.wrong_view("correlation")),
        }
    }

    fn wrong_view(&self, wanted: &str) -> ReportError {
        ReportError::Render(format!(
            "{:?} chart `{}` needs a {wanted} view",
            self.job.kind, self.job.id
        ))
    }

    fn figure(&self, layout: Layout, subplots: Vec<Subplot>) -> FigureSpec {
        FigureSpec {
            title: self.title.clone(),
            kind: self.job.kind,
            layout,
            subplots,
            size_in: self.size_in,
        }
    }

    fn single(&self, subplot: Subplot) -> FigureSpec {
        self.figure(Layout::Grid { columns: 1 }, vec![subplot])
    }
}

pub fn build_spec(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    match ctx.job.kind {
        ChartKind::Line | ChartKind::Area => line(ctx),
        ChartKind::Bar => bar(ctx),
        ChartKind::GroupedBar => grouped_bar(ctx),
        ChartKind::StackedBar => stacked_bar(ctx),
        ChartKind::Scatter => scatter(ctx),
        ChartKind::Histogram => histogram(ctx),
        ChartKind::Box | ChartKind::Violin | ChartKind::Strip => distribution(ctx),
        ChartKind::Pie => pie(ctx),
        ChartKind::Heatmap => heatmap(ctx),
        ChartKind::PairGrid => pair_grid(ctx),
        ChartKind::FacetLine => facet_line(ctx),
        ChartKind::Scatter3d => scatter_3d(ctx),
        ChartKind::ErrorBar => error_bar(ctx),
        ChartKind::Joint => joint(ctx),
        ChartKind::Sunburst => sunburst(ctx),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn numeric(df: &DataFrame, field: Field) -> Result<Vec<f64>> {
    if !field.is_numeric() {
        return Err(ReportError::Render(format!(
            "`{}` cannot be plotted on a continuous axis",
            field.column()
        )));
    }
    require_columns(df, &[field.column()])?;
    float_column(df, field.column())
}

/// Mean or sum column of `field`, whichever the view carries.
fn table_values(table: &AggregatedView, field: Field) -> Result<Vec<f64>> {
    [Reduction::Mean, Reduction::Sum]
        .into_iter()
        .find_map(|r| table.values(field, r).ok())
        .ok_or_else(|| {
            ReportError::Render(format!("view has no reduction of `{}`", field.column()))
        })
}

/// Distinct labels in first-appearance order and each row's category index.
fn categorize(labels: &[String]) -> (Vec<String>, Vec<usize>) {
    let mut categories: Vec<String> = Vec::new();
    let index = labels
        .iter()
        .map(|l| match categories.iter().position(|c| c == l) {
            Some(i) => i,
            None => {
                categories.push(l.clone());
                categories.len() - 1
            }
        })
        .collect();
    (categories, index)
}

fn grouped(labels: &[String], values: &[f64]) -> (Vec<String>, Vec<Vec<f64>>) {
    let (categories, index) = categorize(labels);
    let mut groups = vec![Vec::new(); categories.len()];
    for (i, v) in index.into_iter().zip(values) {
        groups[i].push(*v);
    }
    (categories, groups)
}

/// x positions of a table's key column: numeric keys map to themselves,
/// labels to their category index.
fn key_axis(df: &DataFrame, field: Field) -> Result<(Vec<f64>, Option<Vec<String>>)> {
    if field.is_numeric() {
        return Ok((float_column(df, field.column())?, None));
    }
    let (categories, index) = categorize(&label_column(df, field.column())?);
    Ok((index.into_iter().map(|i| i as f64).collect(), Some(categories)))
}

fn axis_subplot(categories: Option<Vec<String>>, x_label: String, y_label: String) -> Subplot {
    match categories {
        Some(c) => Subplot::categorical(c, x_label, y_label),
        None => Subplot::cartesian(x_label, y_label),
    }
}

fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    let span = if hi > lo { hi - lo } else { 1.0 };
    (lo - span * 0.05, hi + span * 0.05)
}

fn histogram_bars(values: &[f64], bins: usize) -> Vec<Bar> {
    let bins = if bins == 0 { stats::auto_bins(values.len()) } else { bins };
    stats::histogram(values, bins)
        .into_iter()
        .map(|(lo, hi, count)| Bar {
            x: (lo + hi) / 2.0,
            width: hi - lo,
            base: 0.0,
            height: count as f64,
        })
        .collect()
}

/// KDE rescaled to the histogram's count axis.
fn kde_over_counts(values: &[f64], bars: &[Bar]) -> Vec<(f64, f64)> {
    let width = bars.first().map_or(1.0, |b| b.width);
    let scale = values.len() as f64 * width;
    stats::kde(values, KDE_POINTS)
        .into_iter()
        .map(|(x, d)| (x, d * scale))
        .collect()
}

fn regression_traces(points: &[(f64, f64)], color: Rgb) -> Vec<Trace> {
    let Some(fit) = stats::regression_band(points, 50) else {
        return Vec::new();
    };
    vec![
        Trace::Band {
            points: fit.iter().map(|p| (p.0, p.2, p.3)).collect(),
            color,
        },
        Trace::Line {
            name: None,
            points: fit.iter().map(|p| (p.0, p.1)).collect(),
            color,
            markers: false,
            fill: false,
        },
    ]
}

fn color_map_for(field: Field) -> ColorMap {
    if field == Field::Year {
        ColorMap::Viridis
    } else {
        ColorMap::Plasma
    }
}

// ── Chart kinds ─────────────────────────────────────────────────────────────

fn line(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let color = ctx.series_color();
    let fill = ctx.job.kind == ChartKind::Area;

    let (points, categories, band) = match ctx.view {
        View::Table(table) => {
            let (xs, categories) = key_axis(table.df(), x)?;
            let ys = table_values(table, y)?;
            (xs.into_iter().zip(ys).collect::<Vec<_>>(), categories, None)
        }
        View::Rows(df) => {
            // collapse repeated x into mean with a 95% interval
            let xs = numeric(df, x)?;
            let ys = numeric(df, y)?;
            let labels: Vec<String> = xs.iter().map(|v| v.to_string()).collect();
            let (_, groups) = grouped(&labels, &ys);
            let (_, xs_grouped) = grouped(&labels, &xs);
            let mut summary: Vec<(f64, f64, f64, f64)> = xs_grouped
                .iter()
                .zip(&groups)
                .map(|(gx, gy)| {
                    let (m, lo, hi) = stats::mean_ci95(gy);
                    (gx[0], m, lo, hi)
                })
                .collect();
            summary.sort_by(|a, b| a.0.total_cmp(&b.0));
            let band = enc
                .confidence_band
                .then(|| summary.iter().map(|s| (s.0, s.2, s.3)).collect::<Vec<_>>());
            (summary.iter().map(|s| (s.0, s.1)).collect(), None, band)
        }
        View::Matrix(_) => return Err(ctx.wrong_view("row-level or aggregated")),
    };

    let mut subplot = axis_subplot(categories, enc.x_label_or(x), enc.y_label_or(y));
    subplot.rotate_x_labels = enc.rotate_x_labels;
    subplot.integer_x = x == Field::Year;
    if let Some(band) = band {
        subplot = subplot.push(Trace::Band { points: band, color });
    }
    let mean_y = stats::mean(&points.iter().map(|p| p.1).collect::<Vec<_>>());
    subplot = subplot.push(Trace::Line {
        name: None,
        points,
        color,
        markers: enc.markers,
        fill,
    });
    if enc.mean_line && mean_y.is_finite() {
        subplot = subplot.push(Trace::HLine {
            y: mean_y,
            label: format!("Rata-rata: {mean_y:.2}"),
            color: ctx.style.reference_line,
        });
    }
    Ok(ctx.single(subplot))
}

fn bar(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let table = ctx.table()?;
    let (categories, index) = categorize(&label_column(table.df(), x.column())?);
    let heights = table_values(table, y)?;
    let bars = index
        .into_iter()
        .zip(heights)
        .map(|(i, h)| Bar {
            x: i as f64,
            width: BAR_WIDTH,
            base: 0.0,
            height: h,
        })
        .collect();

    let mut subplot = Subplot::categorical(categories, enc.x_label_or(x), enc.y_label_or(y));
    subplot.rotate_x_labels = enc.rotate_x_labels;
    Ok(ctx.single(subplot.push(Trace::Bars {
        name: None,
        bars,
        color: ctx.series_color(),
        value_labels: enc.value_labels,
    })))
}

fn grouped_bar(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let hue = ctx.need(enc.hue, "hue")?;
    let table = ctx.table()?;

    let (categories, x_index) = categorize(&table.labels(x)?);
    let (hues, hue_index) = categorize(&table.labels(hue)?);
    let heights = table_values(table, y)?;
    let width = BAR_WIDTH / hues.len() as f64;

    let mut subplot = Subplot::categorical(categories, enc.x_label_or(x), enc.y_label_or(y));
    subplot.rotate_x_labels = enc.rotate_x_labels;
    for (h, name) in hues.iter().enumerate() {
        let offset = -BAR_WIDTH / 2.0 + width * (h as f64 + 0.5);
        let bars = x_index
            .iter()
            .zip(&hue_index)
            .zip(&heights)
            .filter(|((_, hi), _)| **hi == h)
            .map(|((xi, _), height)| Bar {
                x: *xi as f64 + offset,
                width,
                base: 0.0,
                height: *height,
            })
            .collect();
        subplot = subplot.push(Trace::Bars {
            name: Some(name.clone()),
            bars,
            color: ctx.style.pick(h),
            value_labels: false,
        });
    }
    Ok(ctx.single(subplot))
}

fn stacked_bar(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    if enc.fields.is_empty() {
        return Err(ReportError::Render(format!(
            "stacked chart `{}` has no series fields",
            ctx.job.id
        )));
    }
    let table = ctx.table()?;
    let (categories, index) = categorize(&label_column(table.df(), x.column())?);
    let mut bases = vec![0.0; index.len()];

    let mut subplot = Subplot::categorical(
        categories,
        enc.x_label_or(x),
        enc.y_label.unwrap_or("").to_string(),
    );
    subplot.rotate_x_labels = enc.rotate_x_labels;
    for (s, field) in enc.fields.iter().enumerate() {
        let heights = table.values(*field, Reduction::Mean)?;
        let bars = index
            .iter()
            .zip(heights)
            .zip(bases.iter_mut())
            .map(|((i, h), base)| {
                let bar = Bar {
                    x: *i as f64,
                    width: BAR_WIDTH,
                    base: *base,
                    height: h,
                };
                *base += h;
                bar
            })
            .collect();
        subplot = subplot.push(Trace::Bars {
            name: Some(field.label().to_string()),
            bars,
            color: ctx.style.pick(s),
            value_labels: false,
        });
    }
    Ok(ctx.single(subplot))
}

fn scatter(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let df = ctx.rows()?;
    let points: Vec<(f64, f64)> = numeric(df, x)?.into_iter().zip(numeric(df, y)?).collect();
    let color = ctx.series_color();

    let mut subplot = Subplot::cartesian(enc.x_label_or(x), enc.y_label_or(y));
    subplot.integer_x = x == Field::Year;
    let values = match enc.color {
        Some(field) => {
            let values = numeric(df, field)?;
            subplot.color_scale = Some(ColorScale::over(color_map_for(field), field.label(), &values));
            Some(values)
        }
        None => None,
    };
    let fit = if enc.regression {
        regression_traces(&points, color)
    } else {
        Vec::new()
    };
    subplot = subplot.push(Trace::Points {
        name: None,
        points,
        values,
        color,
        radius_pt: SCATTER_RADIUS_PT,
    });
    subplot.traces.extend(fit);
    Ok(ctx.single(subplot))
}

fn histogram(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let values = numeric(ctx.rows()?, x)?;
    let bars = histogram_bars(&values, enc.bins);
    let color = ctx.series_color();

    let mut subplot = Subplot::cartesian(
        enc.x_label_or(x),
        enc.y_label.unwrap_or("Count").to_string(),
    );
    if enc.kde {
        let curve = kde_over_counts(&values, &bars);
        subplot = subplot.push(Trace::Bars {
            name: None,
            bars,
            color,
            value_labels: false,
        });
        subplot = subplot.push(Trace::Line {
            name: None,
            points: curve,
            color,
            markers: false,
            fill: false,
        });
    } else {
        subplot = subplot.push(Trace::Bars {
            name: None,
            bars,
            color,
            value_labels: false,
        });
    }
    Ok(ctx.single(subplot))
}

/// Box, violin and strip charts: one distribution of `y` per `x` category.
fn distribution(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let df = ctx.rows()?;
    let (categories, groups) = grouped(&label_column(df, x.column())?, &numeric(df, y)?);
    let color = ctx.series_color();

    let trace = match ctx.job.kind {
        ChartKind::Box => Trace::Boxes {
            boxes: groups
                .iter()
                .enumerate()
                .filter_map(|(i, g)| stats::quartiles(g).map(|q| (i as f64, q)))
                .collect(),
            color,
        },
        ChartKind::Violin => {
            let curves: Vec<Vec<(f64, f64)>> =
                groups.iter().map(|g| stats::kde(g, VIOLIN_POINTS)).collect();
            let peak = curves
                .iter()
                .flatten()
                .map(|p| p.1)
                .fold(0.0_f64, f64::max);
            let scale = if peak > 0.0 { VIOLIN_HALF_WIDTH / peak } else { 0.0 };
            Trace::Violins {
                violins: curves
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| (i as f64, c.into_iter().map(|(v, d)| (v, d * scale)).collect()))
                    .collect(),
                color,
            }
        }
        _ => {
            let mut points = Vec::new();
            for (i, g) in groups.iter().enumerate() {
                let offsets = stats::strip_offsets(g, STRIP_WIDTH);
                points.extend(g.iter().zip(offsets).map(|(v, o)| (i as f64 + o, *v)));
            }
            Trace::Points {
                name: None,
                points,
                values: None,
                color,
                radius_pt: SMALL_RADIUS_PT * 1.5,
            }
        }
    };

    let mut subplot = Subplot::categorical(categories, enc.x_label_or(x), enc.y_label_or(y));
    subplot.rotate_x_labels = enc.rotate_x_labels;
    Ok(ctx.single(subplot.push(trace)))
}

fn pie(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let table = ctx.table()?;
    let slices = table
        .labels(x)?
        .into_iter()
        .zip(table_values(table, y)?)
        .enumerate()
        .map(|(i, (label, value))| Slice {
            label,
            value,
            color_index: i,
        })
        .collect();
    Ok(ctx.single(Subplot::with_frame(Frame::Radial).push(Trace::Rings {
        rings: vec![slices],
        percent_labels: true,
    })))
}

fn sunburst(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let y = ctx.need(enc.y, "y")?;
    let table = ctx.table()?;
    let regions = table.labels(Field::Region)?;
    let districts = table.labels(Field::District)?;
    let values = table_values(table, y)?;

    // canonical region order first, then anything unexpected
    let mut order: Vec<String> = region::ALL
        .iter()
        .filter(|r| regions.iter().any(|x| x == *r))
        .map(|r| r.to_string())
        .collect();
    for r in &regions {
        if !order.contains(r) {
            order.push(r.clone());
        }
    }

    let mut inner = Vec::with_capacity(order.len());
    let mut outer = Vec::with_capacity(districts.len());
    for (ri, name) in order.iter().enumerate() {
        let mut total = 0.0;
        for ((r, d), v) in regions.iter().zip(&districts).zip(&values) {
            if r == name {
                total += v;
                outer.push(Slice {
                    label: d.clone(),
                    value: *v,
                    color_index: ri,
                });
            }
        }
        inner.push(Slice {
            label: name.clone(),
            value: total,
            color_index: ri,
        });
    }
    Ok(ctx.single(Subplot::with_frame(Frame::Radial).push(Trace::Rings {
        rings: vec![inner, outer],
        percent_labels: false,
    })))
}

fn heatmap(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let matrix = ctx.matrix()?;
    let labels = matrix.fields.iter().map(|f| f.column().to_string()).collect();
    let mut subplot = Subplot::with_frame(Frame::Matrix { labels }).push(Trace::Cells {
        values: matrix.values.clone(),
        annotate: ctx.encoding().annotate,
    });
    subplot.color_scale = Some(ColorScale {
        map: ColorMap::CoolWarm,
        label: String::new(),
        min: -1.0,
        max: 1.0,
    });
    Ok(ctx.single(subplot))
}

fn pair_grid(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    if enc.fields.len() < 2 {
        return Err(ReportError::Render(format!(
            "pair grid `{}` needs at least two fields",
            ctx.job.id
        )));
    }
    let df = ctx.rows()?;
    let columns: Vec<Vec<f64>> = enc
        .fields
        .iter()
        .map(|f| numeric(df, *f))
        .collect::<Result<_>>()?;
    let k = enc.fields.len();
    let color = ctx.series_color();

    let mut subplots = Vec::with_capacity(k * k);
    for (row, fy) in enc.fields.iter().enumerate() {
        for (col, fx) in enc.fields.iter().enumerate() {
            let x_label = if row == k - 1 { fx.label() } else { "" };
            let y_label = if col == 0 { fy.label() } else { "" };
            let mut subplot = Subplot::cartesian(x_label, y_label);
            if row == col {
                let values = &columns[col];
                let bars = histogram_bars(values, 0);
                if enc.kde {
                    let curve = stats::kde(values, KDE_POINTS);
                    subplot = subplot.push(Trace::Line {
                        name: None,
                        points: curve,
                        color,
                        markers: false,
                        fill: true,
                    });
                } else {
                    subplot = subplot.push(Trace::Bars {
                        name: None,
                        bars,
                        color,
                        value_labels: false,
                    });
                }
            } else {
                subplot = subplot.push(Trace::Points {
                    name: None,
                    points: columns[col].iter().copied().zip(columns[row].iter().copied()).collect(),
                    values: None,
                    color,
                    radius_pt: SMALL_RADIUS_PT,
                });
            }
            subplots.push(subplot);
        }
    }
    Ok(ctx.figure(Layout::Grid { columns: k }, subplots))
}

fn facet_line(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let facet = ctx.need(enc.facet, "facet")?;
    let table = ctx.table()?;

    let xs = numeric(table.df(), x)?;
    let ys = table_values(table, y)?;
    let (facets, index) = categorize(&table.labels(facet)?);
    let y_range = stats::finite_bounds(ys.iter().copied()).map(padded);
    let columns = enc.facet_wrap.max(1);
    let n = facets.len();
    let color = ctx.series_color();

    let subplots = facets
        .into_iter()
        .enumerate()
        .map(|(f, name)| {
            let mut points: Vec<(f64, f64)> = index
                .iter()
                .zip(xs.iter().zip(&ys))
                .filter(|(i, _)| **i == f)
                .map(|(_, (x, y))| (*x, *y))
                .collect();
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            let bottom_row = f + columns >= n;
            let mut subplot = Subplot::cartesian(
                if bottom_row { enc.x_label_or(x) } else { String::new() },
                if f % columns == 0 { enc.y_label_or(y) } else { String::new() },
            );
            subplot.title = Some(name);
            subplot.y_range = y_range;
            subplot.integer_x = x == Field::Year;
            subplot.push(Trace::Line {
                name: None,
                points,
                color,
                markers: true,
                fill: false,
            })
        })
        .collect();
    Ok(ctx.figure(Layout::Grid { columns }, subplots))
}

fn scatter_3d(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let z = ctx.need(enc.z, "z")?;
    let df = ctx.rows()?;
    let (xs, ys, zs) = (numeric(df, x)?, numeric(df, y)?, numeric(df, z)?);
    let points = xs
        .into_iter()
        .zip(ys)
        .zip(zs)
        .map(|((x, y), z)| (x, y, z))
        .collect();
    let values = match enc.color {
        Some(field) => numeric(df, field)?,
        None => vec![0.0; df.height()],
    };

    let mut subplot = Subplot::with_frame(Frame::Cube {
        z_label: enc.z.map_or("", |f| f.label()).to_string(),
    });
    subplot.x_label = enc.x_label_or(x);
    subplot.y_label = enc.y_label_or(y);
    if let Some(field) = enc.color {
        subplot.color_scale = Some(ColorScale::over(color_map_for(field), field.label(), &values));
    }
    Ok(ctx.single(subplot.push(Trace::Points3d { points, values })))
}

fn error_bar(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let table = ctx.table()?;
    let xs = numeric(table.df(), x)?;
    let means = table.values(y, Reduction::Mean)?;
    let stds = table.values(y, Reduction::Std)?;
    let color = ctx.series_color();

    let mut subplot = Subplot::cartesian(enc.x_label_or(x), enc.y_label_or(y));
    subplot.integer_x = x == Field::Year;
    let subplot = subplot
        .push(Trace::ErrorBars {
            points: xs
                .iter()
                .zip(&means)
                .zip(&stds)
                .map(|((x, m), s)| (*x, *m, *s))
                .collect(),
            color,
        })
        .push(Trace::Line {
            name: None,
            points: xs.iter().copied().zip(means.iter().copied()).collect(),
            color,
            markers: enc.markers,
            fill: false,
        });
    Ok(ctx.single(subplot))
}

fn joint(ctx: &BuildContext<'_>) -> Result<FigureSpec> {
    let enc = ctx.encoding();
    let x = ctx.need(enc.x, "x")?;
    let y = ctx.need(enc.y, "y")?;
    let df = ctx.rows()?;
    let xs = numeric(df, x)?;
    let ys = numeric(df, y)?;
    let color = ctx.series_color();
    let x_range = stats::finite_bounds(xs.iter().copied()).map(padded);
    let y_range = stats::finite_bounds(ys.iter().copied()).map(padded);
    let points: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();

    let mut main = Subplot::cartesian(enc.x_label_or(x), enc.y_label_or(y)).push(Trace::Points {
        name: None,
        points: points.clone(),
        values: None,
        color,
        radius_pt: SCATTER_RADIUS_PT,
    });
    if enc.regression {
        for trace in regression_traces(&points, color) {
            main = main.push(trace);
        }
    }
    main.x_range = x_range;
    main.y_range = y_range;

    let mut top = Subplot::cartesian("", "").push(Trace::Bars {
        name: None,
        bars: histogram_bars(&xs, 0),
        color,
        value_labels: false,
    });
    top.x_range = x_range;

    let mut right = Subplot::cartesian("", "").push(Trace::HBars {
        bars: histogram_bars(&ys, 0),
        color,
    });
    right.y_range = y_range;

    Ok(ctx.figure(Layout::Joint, vec![main, top, right]))
}
