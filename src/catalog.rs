//! The fixed battery of chart jobs, as data.
//!
//! Each entry names a chart kind, the backend that draws it, the view it
//! needs and its encoding. Adding or removing a chart touches only the
//! `CATALOG` table.

use std::collections::HashSet;

use serde::Serialize;

use crate::aggregation::{ViewSpec, YearFilter};
use crate::config::{Rgb, REFERENCE_RED};
use crate::error::{ReportError, Result};
use crate::model::Field;

use self::BackendKind::{Interactive, Static};
use self::Band::{Advanced, Economics, Environment, Productivity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Productivity,
    Economics,
    Environment,
    Advanced,
}

impl Band {
    pub const ALL: [Band; 4] = [
        Band::Productivity,
        Band::Economics,
        Band::Environment,
        Band::Advanced,
    ];

    pub const fn title(self) -> &'static str {
        match self {
            Band::Productivity => "ANALISIS PRODUKTIVITAS DAN TREN PRODUKSI",
            Band::Economics => "ANALISIS EKONOMI DAN BIAYA PRODUKSI",
            Band::Environment => "ANALISIS LINGKUNGAN DAN CUACA",
            Band::Advanced => "ANALISIS LANJUTAN DAN PREDIKSI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Raster-ready figures, in-process styling, multi-axes layouts.
    Static,
    /// Declarative figures with native 3D and hierarchical encodings.
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Area,
    Bar,
    GroupedBar,
    StackedBar,
    Scatter,
    Histogram,
    Box,
    Violin,
    Strip,
    Pie,
    Heatmap,
    PairGrid,
    FacetLine,
    Scatter3d,
    ErrorBar,
    Joint,
    Sunburst,
}

/// Visual encoding of a chart. Unset fields fall back to `Encoding::DEFAULT`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Encoding {
    /// `{year}` is replaced with the filtered year(s).
    pub title: &'static str,
    pub x: Option<Field>,
    pub y: Option<Field>,
    pub z: Option<Field>,
    /// Continuous colour scale.
    pub color: Option<Field>,
    /// Discrete series split.
    pub hue: Option<Field>,
    pub facet: Option<Field>,
    pub facet_wrap: usize,
    /// Variables of a pair grid.
    pub fields: &'static [Field],
    pub x_label: Option<&'static str>,
    pub y_label: Option<&'static str>,
    pub series_color: Option<Rgb>,
    /// Histogram bins; 0 picks a count from the sample size.
    pub bins: usize,
    pub kde: bool,
    pub regression: bool,
    pub confidence_band: bool,
    pub mean_line: bool,
    pub markers: bool,
    pub value_labels: bool,
    pub annotate: bool,
    pub rotate_x_labels: bool,
    /// Figure size in inches (static backend).
    pub size_in: (f64, f64),
}

impl Encoding {
    pub const DEFAULT: Encoding = Encoding {
        title: "",
        x: None,
        y: None,
        z: None,
        color: None,
        hue: None,
        facet: None,
        facet_wrap: 4,
        fields: &[],
        x_label: None,
        y_label: None,
        series_color: None,
        bins: 0,
        kde: false,
        regression: false,
        confidence_band: false,
        mean_line: false,
        markers: false,
        value_labels: false,
        annotate: false,
        rotate_x_labels: false,
        size_in: (10.0, 6.0),
    };

    pub fn title_for(&self, years: Option<&[i32]>) -> String {
        let label = match years {
            Some([only]) => only.to_string(),
            Some([first, .., last]) => format!("{first}-{last}"),
            _ => String::new(),
        };
        self.title.replace("{year}", &label)
    }

    pub fn x_label_or(&self, field: Field) -> String {
        self.x_label.unwrap_or(field.label()).to_string()
    }

    pub fn y_label_or(&self, field: Field) -> String {
        self.y_label.unwrap_or(field.label()).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartJob {
    /// Two-digit-prefixed output identifier, e.g. `01_avg_yield_line`.
    pub id: &'static str,
    pub band: Band,
    pub kind: ChartKind,
    pub backend: BackendKind,
    pub view: ViewSpec,
    pub encoding: Encoding,
}

/// Reject catalogs whose ids collide or are not plain file stems.
pub fn validate_catalog(jobs: &[ChartJob]) -> Result<()> {
    let mut seen = HashSet::new();
    for job in jobs {
        let valid = !job.id.is_empty()
            && job
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ReportError::Configuration(format!(
                "invalid output identifier `{}`",
                job.id
            )));
        }
        if !seen.insert(job.id) {
            return Err(ReportError::Configuration(format!(
                "duplicate output identifier `{}`",
                job.id
            )));
        }
    }
    Ok(())
}

pub fn default_catalog() -> &'static [ChartJob] {
    &CATALOG
}

const YEAR: &[Field] = &[Field::Year];
const DISTRICT: &[Field] = &[Field::District];
const DISTRICT_YEAR: &[Field] = &[Field::District, Field::Year];
const REGION_DISTRICT: &[Field] = &[Field::Region, Field::District];
const INPUTS: &[Field] = &[Field::FertilizerUse, Field::PesticideUse];
const PAIR_VARS: &[Field] = &[
    Field::Yield,
    Field::Rainfall,
    Field::Temperature,
    Field::FertilizerUse,
];
const CORR_VARS: &[Field] = &[
    Field::AreaHarvested,
    Field::Production,
    Field::Yield,
    Field::Rainfall,
    Field::Temperature,
    Field::FertilizerUse,
    Field::PesticideUse,
    Field::LaborCost,
];

const DARK_GREEN: Rgb = Rgb(0, 100, 0);
const SKY_BLUE: Rgb = Rgb(135, 206, 235);
const RED: Rgb = REFERENCE_RED;
const GREEN: Rgb = Rgb(0, 128, 0);
const ORANGE: Rgb = Rgb(255, 165, 0);

const fn job(
    id: &'static str,
    band: Band,
    kind: ChartKind,
    backend: BackendKind,
    view: ViewSpec,
    encoding: Encoding,
) -> ChartJob {
    ChartJob {
        id,
        band,
        kind,
        backend,
        view,
        encoding,
    }
}

pub static CATALOG: [ChartJob; 36] = [
    // ── 1-10: productivity and production trends ────────────────────────────
    job(
        "01_avg_yield_line",
        Productivity,
        ChartKind::Line,
        Static,
        ViewSpec::mean(Field::Yield, YEAR),
        Encoding {
            title: "Tren Produktivitas Padi Rata-rata per Tahun di Sidoarjo",
            x: Some(Field::Year),
            y: Some(Field::Yield),
            x_label: Some("Tahun"),
            y_label: Some("Produktivitas (ton/ha)"),
            series_color: Some(DARK_GREEN),
            markers: true,
            mean_line: true,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "02_prod_bar_2023",
        Productivity,
        ChartKind::Bar,
        Static,
        ViewSpec::sum(Field::Production, DISTRICT).in_years(YearFilter::Latest),
        Encoding {
            title: "Total Produksi Padi per Kecamatan ({year})",
            x: Some(Field::District),
            y: Some(Field::Production),
            x_label: Some("Kecamatan"),
            y_label: Some("Produksi (ton)"),
            series_color: Some(SKY_BLUE),
            value_labels: true,
            rotate_x_labels: true,
            size_in: (12.0, 6.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "03_yield_rainfall_scatter",
        Productivity,
        ChartKind::Scatter,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Rice Yield vs Rainfall",
            x: Some(Field::Rainfall),
            y: Some(Field::Yield),
            color: Some(Field::Year),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "04_area_hist",
        Productivity,
        ChartKind::Histogram,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Distribution of Harvested Area",
            x: Some(Field::AreaHarvested),
            y_label: Some("Frequency"),
            bins: 30,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "05_yield_box_district",
        Productivity,
        ChartKind::Box,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Rice Yield Distribution by District",
            x: Some(Field::District),
            y: Some(Field::Yield),
            rotate_x_labels: true,
            size_in: (12.0, 6.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "06_prod_pie_2023",
        Productivity,
        ChartKind::Pie,
        Static,
        ViewSpec::sum(Field::Production, DISTRICT).in_years(YearFilter::Latest),
        Encoding {
            title: "Production Share by District ({year})",
            x: Some(Field::District),
            y: Some(Field::Production),
            size_in: (10.0, 10.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "07_temp_line",
        Productivity,
        ChartKind::Line,
        Static,
        ViewSpec::mean(Field::Temperature, YEAR),
        Encoding {
            title: "Average Temperature Over Years",
            x: Some(Field::Year),
            y: Some(Field::Temperature),
            series_color: Some(RED),
            markers: true,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "08_fert_bar",
        Productivity,
        ChartKind::Bar,
        Static,
        ViewSpec::mean(Field::FertilizerUse, YEAR),
        Encoding {
            title: "Average Fertilizer Use Over Years",
            x: Some(Field::Year),
            y: Some(Field::FertilizerUse),
            series_color: Some(GREEN),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "09_prod_labor_scatter",
        Productivity,
        ChartKind::Scatter,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Production vs Labor Cost",
            x: Some(Field::LaborCost),
            y: Some(Field::Production),
            color: Some(Field::AreaHarvested),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "10_pest_hist",
        Productivity,
        ChartKind::Histogram,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Distribution of Pesticide Use",
            x: Some(Field::PesticideUse),
            y_label: Some("Frequency"),
            series_color: Some(ORANGE),
            bins: 25,
            ..Encoding::DEFAULT
        },
    ),
    // ── 11-20: economics and production cost ────────────────────────────────
    job(
        "11_yield_line_ci",
        Economics,
        ChartKind::Line,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Rice Yield Trend with Confidence Interval",
            x: Some(Field::Year),
            y: Some(Field::Yield),
            confidence_band: true,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "12_prod_bar_hue",
        Economics,
        ChartKind::GroupedBar,
        Static,
        ViewSpec::mean(Field::Production, DISTRICT_YEAR)
            .in_years(YearFilter::Only(&[2020, 2021, 2022])),
        Encoding {
            title: "Production by District ({year})",
            x: Some(Field::District),
            y: Some(Field::Production),
            hue: Some(Field::Year),
            rotate_x_labels: true,
            size_in: (12.0, 6.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "13_yield_rain_reg",
        Economics,
        ChartKind::Scatter,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Yield vs Rainfall with Regression Line",
            x: Some(Field::Rainfall),
            y: Some(Field::Yield),
            regression: true,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "14_area_hist_kde",
        Economics,
        ChartKind::Histogram,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Harvested Area Distribution with KDE",
            x: Some(Field::AreaHarvested),
            y_label: Some("Count"),
            bins: 30,
            kde: true,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "15_yield_box_year",
        Economics,
        ChartKind::Box,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Yield Distribution by Year",
            x: Some(Field::Year),
            y: Some(Field::Yield),
            rotate_x_labels: true,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "16_temp_violin",
        Economics,
        ChartKind::Violin,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Temperature Distribution by District",
            x: Some(Field::District),
            y: Some(Field::Temperature),
            rotate_x_labels: true,
            size_in: (12.0, 6.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "17_corr_heatmap",
        Economics,
        ChartKind::Heatmap,
        Static,
        ViewSpec::correlation(CORR_VARS),
        Encoding {
            title: "Correlation Heatmap of Farming Variables",
            annotate: true,
            size_in: (10.0, 8.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "18_pair_plot",
        Economics,
        ChartKind::PairGrid,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Pair Plot of Key Variables",
            fields: PAIR_VARS,
            kde: true,
            size_in: (10.0, 10.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "19_farmer_bar",
        Economics,
        ChartKind::Bar,
        Static,
        ViewSpec::mean(Field::FarmerCount, DISTRICT),
        Encoding {
            title: "Average Farmer Count by District",
            x: Some(Field::District),
            y: Some(Field::FarmerCount),
            rotate_x_labels: true,
            size_in: (12.0, 6.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "20_yield_swarm",
        Economics,
        ChartKind::Strip,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Yield Swarm Plot by District",
            x: Some(Field::District),
            y: Some(Field::Yield),
            rotate_x_labels: true,
            size_in: (12.0, 6.0),
            ..Encoding::DEFAULT
        },
    ),
    // ── 21-30: environment and weather ──────────────────────────────────────
    job(
        "21_yield_line_plotly",
        Environment,
        ChartKind::Line,
        Interactive,
        ViewSpec::mean(Field::Yield, YEAR),
        Encoding {
            title: "Average Yield Over Years",
            x: Some(Field::Year),
            y: Some(Field::Yield),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "22_prod_bar_plotly",
        Environment,
        ChartKind::Bar,
        Interactive,
        ViewSpec::sum(Field::Production, DISTRICT),
        Encoding {
            title: "Total Production by District",
            x: Some(Field::District),
            y: Some(Field::Production),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "23_yield_rain_scatter_plotly",
        Environment,
        ChartKind::Scatter,
        Interactive,
        ViewSpec::rows(),
        Encoding {
            title: "Yield vs Rainfall",
            x: Some(Field::Rainfall),
            y: Some(Field::Yield),
            color: Some(Field::Year),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "24_area_hist_plotly",
        Environment,
        ChartKind::Histogram,
        Interactive,
        ViewSpec::rows(),
        Encoding {
            title: "Harvested Area Distribution",
            x: Some(Field::AreaHarvested),
            y_label: Some("count"),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "25_yield_box_plotly",
        Environment,
        ChartKind::Box,
        Interactive,
        ViewSpec::rows(),
        Encoding {
            title: "Yield by District",
            x: Some(Field::District),
            y: Some(Field::Yield),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "26_prod_pie_plotly",
        Environment,
        ChartKind::Pie,
        Interactive,
        ViewSpec::sum(Field::Production, DISTRICT),
        Encoding {
            title: "Production Share by District",
            x: Some(Field::District),
            y: Some(Field::Production),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "27_corr_heatmap_plotly",
        Environment,
        ChartKind::Heatmap,
        Interactive,
        ViewSpec::correlation(CORR_VARS),
        Encoding {
            title: "Correlation Heatmap",
            ..Encoding::DEFAULT
        },
    ),
    job(
        "28_scatter_matrix_plotly",
        Environment,
        ChartKind::PairGrid,
        Interactive,
        ViewSpec::rows(),
        Encoding {
            title: "Scatter Matrix",
            fields: PAIR_VARS,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "29_prod_area_plotly",
        Environment,
        ChartKind::Area,
        Interactive,
        ViewSpec::sum(Field::Production, YEAR),
        Encoding {
            title: "Total Production Over Years",
            x: Some(Field::Year),
            y: Some(Field::Production),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "30_temp_violin_plotly",
        Environment,
        ChartKind::Violin,
        Interactive,
        ViewSpec::rows(),
        Encoding {
            title: "Temperature by District",
            x: Some(Field::District),
            y: Some(Field::Temperature),
            ..Encoding::DEFAULT
        },
    ),
    // ── 31-36: advanced and predictive ──────────────────────────────────────
    job(
        "31_inputs_stacked_bar",
        Advanced,
        ChartKind::StackedBar,
        Static,
        ViewSpec::means(INPUTS, YEAR),
        Encoding {
            title: "Fertilizer and Pesticide Use Over Years",
            x: Some(Field::Year),
            fields: INPUTS,
            y_label: Some("Use (kg/liters per ha)"),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "32_yield_facet",
        Advanced,
        ChartKind::FacetLine,
        Static,
        ViewSpec::mean(Field::Yield, DISTRICT_YEAR),
        Encoding {
            title: "Yield Trends by District",
            x: Some(Field::Year),
            y: Some(Field::Yield),
            facet: Some(Field::District),
            facet_wrap: 4,
            x_label: Some("Year"),
            y_label: Some("Yield"),
            size_in: (12.0, 12.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "33_3d_scatter_plotly",
        Advanced,
        ChartKind::Scatter3d,
        Interactive,
        ViewSpec::rows(),
        Encoding {
            title: "3D Scatter: Yield vs Rainfall and Temperature",
            x: Some(Field::Rainfall),
            y: Some(Field::Temperature),
            z: Some(Field::Yield),
            color: Some(Field::Year),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "34_yield_error_bar",
        Advanced,
        ChartKind::ErrorBar,
        Static,
        ViewSpec::mean_std(Field::Yield, YEAR),
        Encoding {
            title: "Yield with Error Bars",
            x: Some(Field::Year),
            y: Some(Field::Yield),
            markers: true,
            ..Encoding::DEFAULT
        },
    ),
    job(
        "35_yield_rain_joint",
        Advanced,
        ChartKind::Joint,
        Static,
        ViewSpec::rows(),
        Encoding {
            title: "Joint Plot: Yield vs Rainfall",
            x: Some(Field::Rainfall),
            y: Some(Field::Yield),
            regression: true,
            size_in: (10.0, 10.0),
            ..Encoding::DEFAULT
        },
    ),
    job(
        "36_prod_sunburst_plotly",
        Advanced,
        ChartKind::Sunburst,
        Interactive,
        ViewSpec::sum(Field::Production, REGION_DISTRICT),
        Encoding {
            title: "Production Sunburst",
            x: Some(Field::Region),
            y: Some(Field::Production),
            ..Encoding::DEFAULT
        },
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_36_unique_jobs_in_order() {
        let jobs = default_catalog();
        assert_eq!(jobs.len(), 36);
        validate_catalog(jobs).unwrap();
        for (i, job) in jobs.iter().enumerate() {
            assert!(
                job.id.starts_with(&format!("{:02}_", i + 1)),
                "{} out of order",
                job.id
            );
        }
    }

    #[test]
    fn bands_cover_fixed_ranges() {
        let jobs = default_catalog();
        let count = |b: Band| jobs.iter().filter(|j| j.band == b).count();
        assert_eq!(count(Band::Productivity), 10);
        assert_eq!(count(Band::Economics), 10);
        assert_eq!(count(Band::Environment), 10);
        assert_eq!(count(Band::Advanced), 6);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let first = default_catalog()[0];
        let err = validate_catalog(&[first, first]).unwrap_err();
        assert!(matches!(err, ReportError::Configuration(_)));
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let mut job = default_catalog()[0];
        job.id = "../escape";
        assert!(validate_catalog(&[job]).is_err());
    }

    #[test]
    fn title_substitutes_filtered_years() {
        let enc = Encoding {
            title: "Production ({year})",
            ..Encoding::DEFAULT
        };
        assert_eq!(enc.title_for(Some(&[2023])), "Production (2023)");
        assert_eq!(enc.title_for(Some(&[2020, 2021, 2022])), "Production (2020-2022)");
        assert_eq!(enc.title_for(None), "Production ()");
    }
}
