//! Synthesize once, then render and persist every catalog job in isolation.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{validate_catalog, Band, ChartJob};
use crate::config::ReportConfig;
use crate::error::{ErrorCategory, Result};
use crate::model::Panel;
use crate::sink::OutputSink;
use crate::synth::synthesize;
use crate::visualization::Dispatcher;

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub id: String,
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub succeeded: Vec<String>,
    pub failures: Vec<JobFailure>,
    pub pruned: Vec<PathBuf>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}

pub struct Pipeline {
    config: ReportConfig,
    panel: Panel,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Validate `config` and synthesize the panel. Configuration errors end here.
    pub fn new(config: ReportConfig) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config.style, config.dpi);
        Self::with_dispatcher(config, dispatcher)
    }

    pub fn with_dispatcher(config: ReportConfig, dispatcher: Dispatcher) -> Result<Self> {
        let panel = synthesize(&config)?;
        info!(
            rows = panel.height(),
            seed = config.seed,
            first_year = config.years[0],
            last_year = config.years[1],
            "panel ready"
        );
        Ok(Self {
            config,
            panel,
            dispatcher,
        })
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Run every job. Per-job failures are collected in the report; only an
    /// invalid catalog or an unusable output directory aborts the run.
    pub fn run(&self, catalog: &[ChartJob]) -> Result<RunReport> {
        validate_catalog(catalog)?;
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let sink = OutputSink::new(&self.config.output_dir)?;
        println!("{}", banner(catalog));
        info!(%run_id, jobs = catalog.len(), dir = %sink.dir().display(), "run started");

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for job in catalog {
            match self.run_job(&sink, job) {
                Ok(path) => {
                    info!(job = job.id, path = %path.display(), "chart saved");
                    succeeded.push(job.id.to_string());
                }
                Err(e) => {
                    warn!(job = job.id, category = ?e.category(), error = %e, "chart failed");
                    if let Err(stale) = sink.discard(job.id) {
                        warn!(job = job.id, error = %stale, "could not remove previous output");
                    }
                    failures.push(JobFailure {
                        id: job.id.to_string(),
                        category: e.category(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let keep: HashSet<&str> = catalog.iter().map(|j| j.id).collect();
        let pruned = sink.prune(&keep).unwrap_or_else(|e| {
            warn!(error = %e, "could not prune stale outputs");
            Vec::new()
        });

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            output_dir: sink.dir().to_path_buf(),
            succeeded,
            failures,
            pruned,
        };
        println!("{}", completion_message(&report, catalog.len()));
        info!(
            %run_id,
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "run finished"
        );
        Ok(report)
    }

    fn run_job(&self, sink: &OutputSink, job: &ChartJob) -> Result<PathBuf> {
        let figure = self.dispatcher.render(job, &self.panel)?;
        let backend = self.dispatcher.backend(job.backend)?;
        sink.present_and_persist(backend, figure, job.id, self.config.show_first)
    }
}

/// Start-of-run banner listing each band's chart numbers within `catalog`.
pub fn banner(catalog: &[ChartJob]) -> String {
    let mut out = String::from("=== ANALISIS PRODUKTIVITAS PADI SIDOARJO ===\nKELOMPOK ANALISIS:\n");
    let bands = Band::ALL.iter().filter_map(|band| {
        let mut positions = catalog
            .iter()
            .enumerate()
            .filter(|(_, j)| j.band == *band)
            .map(|(i, _)| i + 1);
        let first = positions.next()?;
        let last = positions.last().unwrap_or(first);
        Some((band, first, last))
    });
    for (n, (band, first, last)) in bands.enumerate() {
        let range = if first == last {
            first.to_string()
        } else {
            format!("{first}-{last}")
        };
        out.push_str(&format!("{}. GRAFIK {range}: {}\n", n + 1, band.title()));
    }
    out.push_str(&"=".repeat(RULE_WIDTH));
    out
}

pub fn completion_message(report: &RunReport, total: usize) -> String {
    let dir = report.output_dir.display();
    if report.is_success() {
        format!("All {total} graphs generated and saved in '{dir}' folder.")
    } else {
        format!(
            "{} of {total} graphs generated and saved in '{dir}' folder. Failed: {}",
            report.succeeded.len(),
            report.failed_ids().join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;

    fn report(failures: Vec<JobFailure>) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            output_dir: PathBuf::from("graphs"),
            succeeded: vec!["01_a".into(), "02_b".into()],
            failures,
            pruned: Vec::new(),
        }
    }

    #[test]
    fn banner_lists_every_band() {
        let text = banner(default_catalog());
        for band in Band::ALL {
            assert!(text.contains(band.title()));
        }
        assert!(text.contains("1. GRAFIK 1-10: "));
        assert!(text.contains("4. GRAFIK 31-36: "));
        assert!(text.ends_with(&"=".repeat(RULE_WIDTH)));
    }

    #[test]
    fn banner_ranges_follow_a_custom_catalog() {
        let all = default_catalog();
        let custom = [all[0], all[1], all[35]];
        let text = banner(&custom);
        assert!(text.contains("1. GRAFIK 1-2: ANALISIS PRODUKTIVITAS"));
        assert!(text.contains("2. GRAFIK 3: ANALISIS LANJUTAN"));
        assert!(!text.contains(Band::Economics.title()));
    }

    #[test]
    fn completion_message_names_failed_jobs() {
        assert_eq!(
            completion_message(&report(Vec::new()), 2),
            "All 2 graphs generated and saved in 'graphs' folder."
        );
        let failed = report(vec![JobFailure {
            id: "03_c".into(),
            category: ErrorCategory::Render,
            message: "boom".into(),
        }]);
        let text = completion_message(&failed, 3);
        assert!(text.starts_with("2 of 3 graphs"));
        assert!(text.ends_with("Failed: 03_c"));
    }

    #[test]
    fn invalid_config_aborts_before_rendering() {
        let config = ReportConfig {
            districts: Vec::new(),
            ..ReportConfig::default()
        };
        let err = Pipeline::new(config).err().unwrap();
        assert!(err.is_fatal());
    }
}
