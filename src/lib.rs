//! Synthetic rice-productivity panel for the districts of Sidoarjo and the
//! battery of statistical charts rendered from it.
//!
//! Flow: [`synth::synthesize`] builds the panel, [`aggregation`] reduces it
//! to per-chart views, [`visualization::Dispatcher`] draws each job of the
//! [`catalog`] through its backend and [`sink::OutputSink`] writes the PNGs.
//! [`pipeline::Pipeline`] ties these together with per-job error isolation.

pub mod aggregation;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod synth;
pub mod visualization;

pub use catalog::{default_catalog, ChartJob};
pub use config::{ReportConfig, Style};
pub use error::{ReportError, Result};
pub use model::{Field, Panel};
pub use pipeline::{Pipeline, RunReport};
