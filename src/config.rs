//! Run configuration: panel dimensions, output location and chart style.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_OUTPUT_DIR: &str = "graphs";

pub const SIDOARJO_DISTRICTS: [&str; 16] = [
    "Balongbendo",
    "Buduran",
    "Candi",
    "Gedangan",
    "Jabon",
    "Krembung",
    "Porong",
    "Prambon",
    "Sedati",
    "Sukodono",
    "Tanggulangin",
    "Taman",
    "Tarik",
    "Tulangan",
    "Waru",
    "Wonoayu",
];

pub const FARMER_NAMES: [&str; 50] = [
    "Ahmad Sidoarjo",
    "Siti Nurhaliza Sidoarjo",
    "Budi Santoso Sidoarjo",
    "Dewi Kartika Sidoarjo",
    "Joko Widodo Sidoarjo",
    "Sri Wahyuni Sidoarjo",
    "Agus Setiawan Sidoarjo",
    "Rina Puspita Sidoarjo",
    "Hadi Susanto Sidoarjo",
    "Maya Sari Sidoarjo",
    "Dwi Cahyono Sidoarjo",
    "Lestari Indah Sidoarjo",
    "Eko Prasetyo Sidoarjo",
    "Wulan Dari Sidoarjo",
    "Slamet Riyadi Sidoarjo",
    "Ani Lestari Sidoarjo",
    "Bambang Sidoarjo",
    "Sari Dewi Sidoarjo",
    "Tono Sidoarjo",
    "Rita Anggraini Sidoarjo",
    "Yudi Sidoarjo",
    "Nurul Hidayah Sidoarjo",
    "Surya Lesmana Sidoarjo",
    "Indah Permata Sidoarjo",
    "Dian Fitriani Sidoarjo",
    "Ari Wibowo Sidoarjo",
    "Santi Lestari Sidoarjo",
    "Rudi Hartono Sidoarjo",
    "Mega Puspitasari Sidoarjo",
    "Adi Nugroho Sidoarjo",
    "Lina Marlina Sidoarjo",
    "Supriyadi Sidoarjo",
    "Fitria Wulandari Sidoarjo",
    "Gunawan Sidoarjo",
    "Sri Rejeki Sidoarjo",
    "Bayu Aji Sidoarjo",
    "Yeni Melati Sidoarjo",
    "Dodi Setiawan Sidoarjo",
    "Rina Amelia Sidoarjo",
    "Hendra Kusuma Sidoarjo",
    "Putri Lestari Sidoarjo",
    "Arif Rahman Sidoarjo",
    "Siska Amelia Sidoarjo",
    "Wawan Setiawan Sidoarjo",
    "Dewi Sartika Sidoarjo",
    "Iwan Kurniawan Sidoarjo",
    "Ratih Purwanti Sidoarjo",
    "Fajar Siddiq Sidoarjo",
    "Maya Indriani Sidoarjo",
    "Denny Sidoarjo",
];

/// 8-bit RGB triple, kept backend-neutral so the catalog and config do not
/// depend on the drawing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Default colour of reference lines; also the catalog's red series.
pub const REFERENCE_RED: Rgb = Rgb(214, 39, 40);

/// Chart styling handed explicitly to the backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub font_family: String,
    /// Font sizes in points; converted to pixels with the configured dpi.
    pub title_pt: f64,
    pub label_pt: f64,
    pub tick_pt: f64,
    pub page_background: Rgb,
    /// Plot-area fill for the static (seaborn-like) backend.
    pub static_background: Rgb,
    /// Plot-area fill for the interactive (plotly-like) backend.
    pub interactive_background: Rgb,
    pub grid: Rgb,
    /// Reference lines such as the series mean.
    pub reference_line: Rgb,
    pub palette: Vec<Rgb>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            title_pt: 14.0,
            label_pt: 11.0,
            tick_pt: 9.0,
            page_background: Rgb(255, 255, 255),
            static_background: Rgb(234, 234, 242),
            interactive_background: Rgb(229, 236, 246),
            grid: Rgb(255, 255, 255),
            reference_line: REFERENCE_RED,
            // husl, 8 hues
            palette: vec![
                Rgb(246, 112, 136),
                Rgb(206, 143, 49),
                Rgb(150, 163, 49),
                Rgb(50, 176, 101),
                Rgb(53, 172, 164),
                Rgb(56, 167, 208),
                Rgb(163, 140, 244),
                Rgb(245, 101, 204),
            ],
        }
    }
}

impl Style {
    /// Palette colour for series `i`, wrapping around.
    pub fn pick(&self, i: usize) -> Rgb {
        if self.palette.is_empty() {
            return Rgb(31, 119, 180);
        }
        self.palette[i % self.palette.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub seed: u64,
    pub districts: Vec<String>,
    /// Inclusive `[first, last]` year range.
    pub years: [i32; 2],
    pub name_pool: Vec<String>,
    pub output_dir: PathBuf,
    pub dpi: u32,
    /// Present each figure before persisting it. A no-op when headless.
    pub show_first: bool,
    pub style: Style,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            districts: SIDOARJO_DISTRICTS.iter().map(|s| s.to_string()).collect(),
            years: [2010, 2023],
            name_pool: FARMER_NAMES.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            dpi: DEFAULT_DPI,
            show_first: false,
            style: Style::default(),
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ReportError::Configuration(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn year_range(&self) -> std::ops::RangeInclusive<i32> {
        self.years[0]..=self.years[1]
    }

    pub fn year_count(&self) -> usize {
        self.year_range().count()
    }

    /// Fail fast on dimensions that would yield an empty or malformed panel.
    pub fn validate(&self) -> Result<()> {
        if self.districts.is_empty() {
            return Err(ReportError::Configuration("district list is empty".into()));
        }
        let mut seen = HashSet::new();
        for d in &self.districts {
            if d.trim().is_empty() {
                return Err(ReportError::Configuration("blank district name".into()));
            }
            if !seen.insert(d.as_str()) {
                return Err(ReportError::Configuration(format!(
                    "duplicate district: {d}"
                )));
            }
        }
        if self.years[0] > self.years[1] {
            return Err(ReportError::Configuration(format!(
                "empty year range [{}, {}]",
                self.years[0], self.years[1]
            )));
        }
        if self.name_pool.is_empty() {
            return Err(ReportError::Configuration("farmer name pool is empty".into()));
        }
        if self.name_pool.iter().any(|n| n.trim().is_empty()) {
            return Err(ReportError::Configuration("blank farmer name".into()));
        }
        if self.dpi == 0 {
            return Err(ReportError::Configuration("dpi must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ReportConfig::default();
        config.validate().unwrap();
        assert_eq!(config.districts.len(), 16);
        assert_eq!(config.year_count(), 14);
        assert_eq!(config.name_pool.len(), 50);
        assert_eq!(config.output_dir, PathBuf::from("graphs"));
    }

    #[test]
    fn rejects_empty_dimensions() {
        let mut config = ReportConfig::default();
        config.districts.clear();
        assert!(matches!(config.validate(), Err(ReportError::Configuration(_))));

        let mut config = ReportConfig::default();
        config.years = [2024, 2010];
        assert!(matches!(config.validate(), Err(ReportError::Configuration(_))));

        let mut config = ReportConfig::default();
        config.name_pool.clear();
        assert!(matches!(config.validate(), Err(ReportError::Configuration(_))));
    }

    #[test]
    fn rejects_duplicate_districts() {
        let mut config = ReportConfig::default();
        config.districts = vec!["A".into(), "B".into(), "A".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate district: A"));
    }

    #[test]
    fn json_overrides_fall_back_to_defaults() {
        let config = ReportConfig::from_json_str(
            r#"{"seed": 7, "districts": ["A", "B"], "years": [2020, 2021]}"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.districts, vec!["A", "B"]);
        assert_eq!(config.year_count(), 2);
        assert_eq!(config.name_pool.len(), 50);
        assert_eq!(config.dpi, DEFAULT_DPI);
    }

    #[test]
    fn json_with_invalid_dimensions_is_a_configuration_error() {
        let err = ReportConfig::from_json_str(r#"{"name_pool": []}"#).unwrap_err();
        assert!(matches!(err, ReportError::Configuration(_)));
    }

    #[test]
    fn single_year_range_is_allowed() {
        let mut config = ReportConfig::default();
        config.years = [2023, 2023];
        config.validate().unwrap();
        assert_eq!(config.year_count(), 1);
    }
}
