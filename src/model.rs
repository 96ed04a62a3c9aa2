use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::schema::panel;

/// A panel column, typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Year,
    District,
    FarmerName,
    AreaHarvested,
    Production,
    Yield,
    Rainfall,
    Temperature,
    FertilizerUse,
    PesticideUse,
    LaborCost,
    FarmerCount,
    Region,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Year,
        Field::District,
        Field::FarmerName,
        Field::AreaHarvested,
        Field::Production,
        Field::Yield,
        Field::Rainfall,
        Field::Temperature,
        Field::FertilizerUse,
        Field::PesticideUse,
        Field::LaborCost,
        Field::FarmerCount,
        Field::Region,
    ];

    pub const fn column(self) -> &'static str {
        match self {
            Field::Year => panel::YEAR,
            Field::District => panel::DISTRICT,
            Field::FarmerName => panel::FARMER_NAME,
            Field::AreaHarvested => panel::AREA_HARVESTED,
            Field::Production => panel::PRODUCTION,
            Field::Yield => panel::YIELD,
            Field::Rainfall => panel::RAINFALL,
            Field::Temperature => panel::TEMPERATURE,
            Field::FertilizerUse => panel::FERTILIZER_USE,
            Field::PesticideUse => panel::PESTICIDE_USE,
            Field::LaborCost => panel::LABOR_COST,
            Field::FarmerCount => panel::FARMER_COUNT,
            Field::Region => panel::REGION,
        }
    }

    /// Axis label with unit.
    pub const fn label(self) -> &'static str {
        match self {
            Field::Year => "Year",
            Field::District => "District",
            Field::FarmerName => "Farmer",
            Field::AreaHarvested => "Area Harvested (ha)",
            Field::Production => "Production (tons)",
            Field::Yield => "Yield (tons/ha)",
            Field::Rainfall => "Rainfall (mm)",
            Field::Temperature => "Temperature (°C)",
            Field::FertilizerUse => "Fertilizer Use (kg/ha)",
            Field::PesticideUse => "Pesticide Use (liters/ha)",
            Field::LaborCost => "Labor Cost (IDR)",
            Field::FarmerCount => "Farmer Count",
            Field::Region => "Region",
        }
    }

    /// Fields that can be reduced (mean, sum, std, correlation).
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Field::District | Field::FarmerName | Field::Region)
    }

    /// Fields a view may be keyed by.
    pub const fn is_group_key(self) -> bool {
        matches!(self, Field::Year | Field::District | Field::Region)
    }

    pub fn from_column(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.column() == name)
    }
}

/// One (district, year) observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub year: i32,
    pub district: String,
    pub farmer_name: String,
    pub area_harvested: f64,
    pub production: f64,
    pub crop_yield: f64,
    pub rainfall: f64,
    pub temperature: f64,
    pub fertilizer_use: f64,
    pub pesticide_use: f64,
    pub labor_cost: f64,
    pub farmer_count: i32,
    pub region: String,
}

impl Record {
    /// Overwrite yield with `production / area_harvested`.
    pub fn derive_yield(&mut self) {
        self.crop_yield = self.production / self.area_harvested;
    }
}

/// The full district × year table. Immutable once built.
#[derive(Debug, Clone)]
pub struct Panel {
    df: DataFrame,
}

impl Panel {
    pub fn from_records(records: &[Record]) -> Result<Self> {
        let years: Vec<i32> = records.iter().map(|r| r.year).collect();
        let districts: Vec<&str> = records.iter().map(|r| r.district.as_str()).collect();
        let names: Vec<&str> = records.iter().map(|r| r.farmer_name.as_str()).collect();
        let regions: Vec<&str> = records.iter().map(|r| r.region.as_str()).collect();
        let counts: Vec<i32> = records.iter().map(|r| r.farmer_count).collect();
        let float = |get: fn(&Record) -> f64| -> Vec<f64> { records.iter().map(get).collect() };

        let df = DataFrame::new(vec![
            Column::new(panel::YEAR.into(), &years),
            Column::new(panel::DISTRICT.into(), &districts),
            Column::new(panel::FARMER_NAME.into(), &names),
            Column::new(panel::AREA_HARVESTED.into(), &float(|r| r.area_harvested)),
            Column::new(panel::PRODUCTION.into(), &float(|r| r.production)),
            Column::new(panel::YIELD.into(), &float(|r| r.crop_yield)),
            Column::new(panel::RAINFALL.into(), &float(|r| r.rainfall)),
            Column::new(panel::TEMPERATURE.into(), &float(|r| r.temperature)),
            Column::new(panel::FERTILIZER_USE.into(), &float(|r| r.fertilizer_use)),
            Column::new(panel::PESTICIDE_USE.into(), &float(|r| r.pesticide_use)),
            Column::new(panel::LABOR_COST.into(), &float(|r| r.labor_cost)),
            Column::new(panel::FARMER_COUNT.into(), &counts),
            Column::new(panel::REGION.into(), &regions),
        ])?;

        Ok(Self { df })
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Most recent year present in the panel.
    pub fn latest_year(&self) -> Result<i32> {
        self.df
            .column(panel::YEAR)?
            .i32()?
            .max()
            .ok_or_else(|| ReportError::Aggregation("panel has no years".into()))
    }

    /// Typed rows back out of the table, in table order.
    pub fn records(&self) -> Result<Vec<Record>> {
        let df = &self.df;
        let years = df.column(panel::YEAR)?.i32()?;
        let districts = df.column(panel::DISTRICT)?.str()?;
        let names = df.column(panel::FARMER_NAME)?.str()?;
        let regions = df.column(panel::REGION)?.str()?;
        let counts = df.column(panel::FARMER_COUNT)?.i32()?;
        let area = float_column(df, panel::AREA_HARVESTED)?;
        let production = float_column(df, panel::PRODUCTION)?;
        let crop_yield = float_column(df, panel::YIELD)?;
        let rainfall = float_column(df, panel::RAINFALL)?;
        let temperature = float_column(df, panel::TEMPERATURE)?;
        let fertilizer = float_column(df, panel::FERTILIZER_USE)?;
        let pesticide = float_column(df, panel::PESTICIDE_USE)?;
        let labor = float_column(df, panel::LABOR_COST)?;

        let mut out = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let null = |c: &str| ReportError::Aggregation(format!("null {c} at row {i}"));
            out.push(Record {
                year: years.get(i).ok_or_else(|| null(panel::YEAR))?,
                district: districts.get(i).ok_or_else(|| null(panel::DISTRICT))?.to_string(),
                farmer_name: names.get(i).ok_or_else(|| null(panel::FARMER_NAME))?.to_string(),
                area_harvested: area[i],
                production: production[i],
                crop_yield: crop_yield[i],
                rainfall: rainfall[i],
                temperature: temperature[i],
                fertilizer_use: fertilizer[i],
                pesticide_use: pesticide[i],
                labor_cost: labor[i],
                farmer_count: counts.get(i).ok_or_else(|| null(panel::FARMER_COUNT))?,
                region: regions.get(i).ok_or_else(|| null(panel::REGION))?.to_string(),
            });
        }
        Ok(out)
    }
}

/// Numeric column as `f64`, casting integer columns. Nulls become NaN.
pub fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Any column rendered as display labels (`2010`, `Candi`, ...).
pub fn label_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &name in required {
        if df.column(name).is_err() {
            return Err(ReportError::Render(format!("field `{name}` absent from view")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: i32, district: &str, area: f64, production: f64) -> Record {
        Record {
            year,
            district: district.to_string(),
            farmer_name: "Tono Sidoarjo".to_string(),
            area_harvested: area,
            production,
            crop_yield: 4.0,
            rainfall: 2000.0,
            temperature: 30.0,
            fertilizer_use: 250.0,
            pesticide_use: 100.0,
            labor_cost: 100_000.0,
            farmer_count: 120,
            region: "North".to_string(),
        }
    }

    #[test]
    fn derive_yield_overwrites_provisional_value() {
        let mut r = record(2020, "A", 500.0, 2000.0);
        r.derive_yield();
        assert_eq!(r.crop_yield, 4.0);
        let mut r = record(2020, "A", 1000.0, 2500.0);
        r.derive_yield();
        assert!((r.crop_yield - 2.5).abs() < 1e-12);
    }

    #[test]
    fn panel_round_trips_records() {
        let records = vec![record(2020, "A", 600.0, 1800.0), record(2021, "B", 800.0, 4000.0)];
        let panel = Panel::from_records(&records).unwrap();
        assert_eq!(panel.height(), 2);
        assert_eq!(panel.records().unwrap(), records);
        assert_eq!(panel.latest_year().unwrap(), 2021);
    }

    #[test]
    fn field_columns_are_unique_and_resolvable() {
        for field in Field::ALL {
            assert_eq!(Field::from_column(field.column()), Some(field));
        }
        assert_eq!(Field::from_column("nope"), None);
        assert!(Field::Year.is_numeric() && Field::Year.is_group_key());
        assert!(!Field::District.is_numeric() && Field::District.is_group_key());
        assert!(!Field::FarmerName.is_group_key());
    }

    #[test]
    fn label_column_stringifies_years() {
        let panel = Panel::from_records(&[record(2019, "A", 1.0, 1.0)]).unwrap();
        assert_eq!(label_column(panel.df(), panel::YEAR).unwrap(), vec!["2019"]);
        assert_eq!(float_column(panel.df(), panel::FARMER_COUNT).unwrap(), vec![120.0]);
    }
}
