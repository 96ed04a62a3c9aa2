use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::model::{float_column, label_column, Field, Panel};
use crate::schema::{panel, reduction};

/// Reduction applied to one numeric field within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Mean,
    Sum,
    /// Sample standard deviation (ddof = 1); 0 for single-member partitions.
    Std,
}

impl Reduction {
    pub const fn suffix(self) -> &'static str {
        match self {
            Reduction::Mean => reduction::MEAN,
            Reduction::Sum => reduction::SUM,
            Reduction::Std => reduction::STD,
        }
    }
}

/// Output column name of `reduction` over `field`, e.g. `yield_mean`.
pub fn value_column(field: Field, reduction: Reduction) -> String {
    format!("{}_{}", field.column(), reduction.suffix())
}

/// Read-only table keyed by one or more group keys.
#[derive(Debug, Clone)]
pub struct AggregatedView {
    keys: Vec<Field>,
    df: DataFrame,
}

impl AggregatedView {
    pub fn keys(&self) -> &[Field] {
        &self.keys
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn values(&self, field: Field, reduction: Reduction) -> Result<Vec<f64>> {
        let name = value_column(field, reduction);
        if self.df.column(&name).is_err() {
            return Err(ReportError::Render(format!("view has no `{name}` column")));
        }
        float_column(&self.df, &name)
    }

    pub fn labels(&self, key: Field) -> Result<Vec<String>> {
        if !self.keys.contains(&key) {
            return Err(ReportError::Render(format!(
                "view is not keyed by `{}`",
                key.column()
            )));
        }
        label_column(&self.df, key.column())
    }
}

/// Pairwise Pearson correlations over the whole panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<Field>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Field, b: Field) -> Option<f64> {
        let i = self.fields.iter().position(|f| *f == a)?;
        let j = self.fields.iter().position(|f| *f == b)?;
        Some(self.values[i][j])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ── Reductions ──────────────────────────────────────────────────────────────

pub fn group_mean(rows: &DataFrame, field: Field, by: &[Field]) -> Result<AggregatedView> {
    aggregate(rows, by, &[(field, Reduction::Mean)])
}

pub fn group_sum(rows: &DataFrame, field: Field, by: &[Field]) -> Result<AggregatedView> {
    aggregate(rows, by, &[(field, Reduction::Sum)])
}

pub fn group_std(rows: &DataFrame, field: Field, by: &[Field]) -> Result<AggregatedView> {
    aggregate(rows, by, &[(field, Reduction::Std)])
}

/// Mean and std of one field side by side (error-bar views).
pub fn group_mean_std(rows: &DataFrame, field: Field, by: &[Field]) -> Result<AggregatedView> {
    aggregate(rows, by, &[(field, Reduction::Mean), (field, Reduction::Std)])
}

/// Means of several fields side by side (stacked views).
pub fn group_means(rows: &DataFrame, fields: &[Field], by: &[Field]) -> Result<AggregatedView> {
    let specs: Vec<(Field, Reduction)> = fields.iter().map(|f| (*f, Reduction::Mean)).collect();
    aggregate(rows, by, &specs)
}

/// Partition `rows` by `by` (first-appearance order) and apply every
/// `(field, reduction)` to each partition.
pub fn aggregate(
    rows: &DataFrame,
    by: &[Field],
    specs: &[(Field, Reduction)],
) -> Result<AggregatedView> {
    if by.is_empty() {
        return Err(ReportError::Aggregation("no group keys given".into()));
    }
    if let Some(bad) = by.iter().find(|f| !f.is_group_key()) {
        return Err(ReportError::Aggregation(format!(
            "`{}` is not a group key",
            bad.column()
        )));
    }
    if let Some((bad, _)) = specs.iter().find(|(f, _)| !f.is_numeric()) {
        return Err(ReportError::Aggregation(format!(
            "`{}` is not numeric",
            bad.column()
        )));
    }
    if rows.height() == 0 {
        return Err(ReportError::Aggregation("no rows to aggregate".into()));
    }

    let key_names: Vec<&str> = by.iter().map(|f| f.column()).collect();
    let partitions = rows.partition_by_stable(key_names.iter().copied(), true)?;

    let mut key_columns: Vec<Vec<AnyValue>> = vec![Vec::with_capacity(partitions.len()); by.len()];
    let mut value_columns: Vec<Vec<f64>> = vec![Vec::with_capacity(partitions.len()); specs.len()];

    for partition in &partitions {
        for (i, name) in key_names.iter().enumerate() {
            let val = partition.column(name)?.get(0)?;
            key_columns[i].push(val.into_static());
        }
        for (i, (field, red)) in specs.iter().enumerate() {
            let series = partition.column(field.column())?.as_materialized_series();
            value_columns[i].push(reduce(series, *red)?);
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(by.len() + specs.len());
    for (i, name) in key_names.iter().enumerate() {
        let series = Series::from_any_values((*name).into(), &key_columns[i], true)?;
        columns.push(series.into());
    }
    for (i, (field, red)) in specs.iter().enumerate() {
        let name = value_column(*field, *red);
        columns.push(Column::new(name.into(), &value_columns[i]));
    }

    let df = DataFrame::new(columns)?;
    debug!(keys = ?key_names, rows = df.height(), "aggregated view");
    Ok(AggregatedView {
        keys: by.to_vec(),
        df,
    })
}

fn reduce(series: &Series, reduction: Reduction) -> Result<f64> {
    match reduction {
        Reduction::Mean => {
            let mean = series.mean_reduce();
            Ok(mean.value().try_extract::<f64>().unwrap_or(f64::NAN))
        }
        Reduction::Sum => {
            let sum = series.sum_reduce()?;
            Ok(sum.value().try_extract::<f64>().unwrap_or(0.0))
        }
        Reduction::Std => {
            let values: Vec<f64> = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_no_null_iter()
                .collect();
            Ok(sample_std(&values))
        }
    }
}

/// Sample standard deviation; a single observation has no spread.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

// ── Correlation ─────────────────────────────────────────────────────────────

pub fn correlation_matrix(rows: &DataFrame, fields: &[Field]) -> Result<CorrelationMatrix> {
    if fields.is_empty() {
        return Err(ReportError::Aggregation("no fields to correlate".into()));
    }
    if let Some(bad) = fields.iter().find(|f| !f.is_numeric()) {
        return Err(ReportError::Aggregation(format!(
            "`{}` is not numeric",
            bad.column()
        )));
    }
    if rows.height() < 2 {
        return Err(ReportError::Aggregation(
            "correlation needs at least two rows".into(),
        ));
    }

    let columns: Vec<Vec<f64>> = fields
        .iter()
        .map(|f| float_column(rows, f.column()))
        .collect::<Result<_>>()?;

    let k = fields.len();
    let mut values = vec![vec![0.0; k]; k];
    for i in 0..k {
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let r = pearson(&columns[i], &columns[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix {
        fields: fields.to_vec(),
        values,
    })
}

/// NaN when either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

// ── Filters ─────────────────────────────────────────────────────────────────

pub fn filter_by_year(rows: &DataFrame, year: i32) -> Result<DataFrame> {
    filter_by_years(rows, &[year])
}

pub fn filter_by_years(rows: &DataFrame, years: &[i32]) -> Result<DataFrame> {
    let predicate = years
        .iter()
        .map(|y| col(panel::YEAR).eq(lit(*y)))
        .reduce(|a, b| a.or(b))
        .ok_or_else(|| ReportError::Aggregation("no years to filter by".into()))?;

    let df = rows.clone().lazy().filter(predicate).collect()?;
    if df.height() == 0 {
        return Err(ReportError::Aggregation(format!(
            "no rows for year(s) {years:?}"
        )));
    }
    Ok(df)
}

// ── Declarative view specs ──────────────────────────────────────────────────

/// Which years a view is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YearFilter {
    All,
    /// The most recent year in the panel.
    Latest,
    Only(&'static [i32]),
}

impl YearFilter {
    /// Concrete years, or `None` for the whole panel.
    pub fn years(&self, panel: &Panel) -> Result<Option<Vec<i32>>> {
        match self {
            YearFilter::All => Ok(None),
            YearFilter::Latest => Ok(Some(vec![panel.latest_year()?])),
            YearFilter::Only(years) => Ok(Some(years.to_vec())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ViewShape {
    /// Row-level data, no reduction.
    Rows,
    Reduce {
        field: Field,
        reduction: Reduction,
        by: &'static [Field],
    },
    MeanStd {
        field: Field,
        by: &'static [Field],
    },
    Means {
        fields: &'static [Field],
        by: &'static [Field],
    },
    Correlation {
        fields: &'static [Field],
    },
}

/// What a chart job needs from the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewSpec {
    pub years: YearFilter,
    pub shape: ViewShape,
}

impl ViewSpec {
    pub const fn rows() -> Self {
        Self {
            years: YearFilter::All,
            shape: ViewShape::Rows,
        }
    }

    pub const fn mean(field: Field, by: &'static [Field]) -> Self {
        Self::reduce(field, Reduction::Mean, by)
    }

    pub const fn sum(field: Field, by: &'static [Field]) -> Self {
        Self::reduce(field, Reduction::Sum, by)
    }

    pub const fn reduce(field: Field, reduction: Reduction, by: &'static [Field]) -> Self {
        Self {
            years: YearFilter::All,
            shape: ViewShape::Reduce {
                field,
                reduction,
                by,
            },
        }
    }

    pub const fn mean_std(field: Field, by: &'static [Field]) -> Self {
        Self {
            years: YearFilter::All,
            shape: ViewShape::MeanStd { field, by },
        }
    }

    pub const fn means(fields: &'static [Field], by: &'static [Field]) -> Self {
        Self {
            years: YearFilter::All,
            shape: ViewShape::Means { fields, by },
        }
    }

    pub const fn correlation(fields: &'static [Field]) -> Self {
        Self {
            years: YearFilter::All,
            shape: ViewShape::Correlation { fields },
        }
    }

    pub const fn in_years(self, years: YearFilter) -> Self {
        Self {
            years,
            shape: self.shape,
        }
    }
}

/// A resolved view, ready for a backend.
#[derive(Debug, Clone)]
pub enum View {
    Rows(DataFrame),
    Table(AggregatedView),
    Matrix(CorrelationMatrix),
}

impl View {
    pub fn height(&self) -> usize {
        match self {
            View::Rows(df) => df.height(),
            View::Table(t) => t.height(),
            View::Matrix(m) => m.len(),
        }
    }
}

/// Compute the view described by `spec`. Pure over `panel`.
pub fn resolve(panel: &Panel, spec: &ViewSpec) -> Result<View> {
    let filtered;
    let rows = match spec.years.years(panel)? {
        None => panel.df(),
        Some(years) => {
            filtered = filter_by_years(panel.df(), &years)?;
            &filtered
        }
    };

    let view = match spec.shape {
        ViewShape::Rows => View::Rows(rows.clone()),
        ViewShape::Reduce {
            field,
            reduction,
            by,
        } => View::Table(aggregate(rows, by, &[(field, reduction)])?),
        ViewShape::MeanStd { field, by } => View::Table(group_mean_std(rows, field, by)?),
        ViewShape::Means { fields, by } => View::Table(group_means(rows, fields, by)?),
        ViewShape::Correlation { fields } => View::Matrix(correlation_matrix(rows, fields)?),
    };
    Ok(view)
}
