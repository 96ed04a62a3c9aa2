use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use padi_report::catalog::BackendKind;
use padi_report::error::ErrorCategory;
use padi_report::visualization::raster::RasterImage;
use padi_report::visualization::{
    Backend, Dispatcher, Figure, FigureContent, FigureRequest, INTERACTIVE_SIZE_IN,
};
use padi_report::{default_catalog, Pipeline, ReportConfig, ReportError, Result};

/// Stands in for a drawing backend: records the view height in a tiny file.
struct FakeBackend {
    kind: BackendKind,
}

impl Backend for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn build_figure(&self, request: &FigureRequest<'_>) -> Result<Figure> {
        let rows = request.view.height() as u8;
        Ok(Figure::new(
            request.job.id,
            self.kind,
            FigureContent::Raster(RasterImage {
                width: 1,
                height: 1,
                pixels: vec![rows, 0, 0],
            }),
        ))
    }

    fn present(&self, _figure: &Figure) -> Result<()> {
        Ok(())
    }

    fn serialize(&self, figure: &Figure, path: &Path) -> Result<()> {
        let FigureContent::Raster(image) = figure.content() else {
            return Err(ReportError::Render("unexpected figure".into()));
        };
        fs::write(path, &image.pixels).map_err(ReportError::from)
    }
}

fn fake_dispatcher() -> Dispatcher {
    Dispatcher::with_backends(vec![
        Box::new(FakeBackend {
            kind: BackendKind::Static,
        }),
        Box::new(FakeBackend {
            kind: BackendKind::Interactive,
        }),
    ])
}

fn config(dir: &Path, years: [i32; 2]) -> ReportConfig {
    ReportConfig {
        districts: vec!["Candi".into(), "Porong".into(), "Waru".into()],
        years,
        output_dir: dir.to_path_buf(),
        ..ReportConfig::default()
    }
}

fn png_stems(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "png"))
        .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn every_job_produces_a_file() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_dispatcher(config(tmp.path(), [2019, 2023]), fake_dispatcher()).unwrap();
    let report = pipeline.run(default_catalog()).unwrap();

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.succeeded.len(), 36);
    let expected: BTreeSet<String> = default_catalog().iter().map(|j| j.id.to_string()).collect();
    assert_eq!(png_stems(tmp.path()), expected);
}

#[test]
fn one_failing_job_does_not_stop_the_others() {
    let tmp = tempfile::tempdir().unwrap();
    // the grouped bar chart is fixed to 2020-2022, outside this panel
    let pipeline = Pipeline::with_dispatcher(config(tmp.path(), [2010, 2015]), fake_dispatcher()).unwrap();
    let report = pipeline.run(default_catalog()).unwrap();

    assert_eq!(report.failed_ids(), vec!["12_prod_bar_hue"]);
    assert_eq!(report.failures[0].category, ErrorCategory::Aggregation);
    assert_eq!(report.succeeded.len(), 35);
    let stems = png_stems(tmp.path());
    assert_eq!(stems.len(), 35);
    assert!(!stems.contains("12_prod_bar_hue"));
}

#[test]
fn rerun_is_idempotent_and_prunes_stale_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("99_retired_chart.png"), b"old").unwrap();
    let pipeline = Pipeline::with_dispatcher(config(tmp.path(), [2020, 2023]), fake_dispatcher()).unwrap();

    let first = pipeline.run(default_catalog()).unwrap();
    assert_eq!(first.pruned, vec![tmp.path().join("99_retired_chart.png")]);
    let after_first = png_stems(tmp.path());
    let bytes_first = fs::read(tmp.path().join("02_prod_bar_2023.png")).unwrap();

    let second = pipeline.run(default_catalog()).unwrap();
    assert!(second.pruned.is_empty());
    assert_eq!(png_stems(tmp.path()), after_first);
    assert_eq!(fs::read(tmp.path().join("02_prod_bar_2023.png")).unwrap(), bytes_first);
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn same_seed_gives_same_panel_across_pipelines() {
    let tmp = tempfile::tempdir().unwrap();
    let a = Pipeline::with_dispatcher(config(tmp.path(), [2020, 2021]), fake_dispatcher()).unwrap();
    let b = Pipeline::with_dispatcher(config(tmp.path(), [2020, 2021]), fake_dispatcher()).unwrap();
    assert!(a.panel().df().equals(b.panel().df()));
    assert_eq!(a.panel().height(), 6);
}

#[test]
fn duplicate_catalog_ids_abort_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_dispatcher(config(tmp.path(), [2020, 2021]), fake_dispatcher()).unwrap();
    let first = default_catalog()[0];
    let err = pipeline.run(&[first, first]).unwrap_err();
    assert!(err.is_fatal());
    assert!(png_stems(tmp.path()).is_empty());
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("padi-report.json");
    fs::write(&path, r#"{ "seed": 7, "years": [2020, 2021], "districts": ["A", "B"] }"#).unwrap();
    let config = ReportConfig::from_json_file(&path).unwrap();
    assert_eq!(config.seed, 7);
    assert_eq!(config.dpi, 300);
    let pipeline = Pipeline::with_dispatcher(config, fake_dispatcher()).unwrap();
    assert_eq!(pipeline.panel().height(), 4);
}

#[test]
fn failed_job_does_not_leave_an_earlier_chart_behind() {
    let tmp = tempfile::tempdir().unwrap();
    let chart = tmp.path().join("12_prod_bar_hue.png");

    let first = Pipeline::with_dispatcher(config(tmp.path(), [2020, 2023]), fake_dispatcher())
        .unwrap()
        .run(default_catalog())
        .unwrap();
    assert!(first.is_success());
    assert!(chart.exists());

    let second = Pipeline::with_dispatcher(config(tmp.path(), [2010, 2015]), fake_dispatcher())
        .unwrap()
        .run(default_catalog())
        .unwrap();
    assert_eq!(second.failed_ids(), vec!["12_prod_bar_hue"]);
    assert!(!chart.exists());
    assert_eq!(png_stems(tmp.path()).len(), 35);
}

fn font_available(family: &str) -> bool {
    use plotters::style::IntoFont;
    (family, 10.0).into_font().box_size("x").is_ok()
}

#[test]
fn real_backends_write_cropped_pngs_at_the_configured_dpi() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path(), [2020, 2023]);
    if !font_available(&config.style.font_family) {
        eprintln!("skipping: no `{}` font installed", config.style.font_family);
        return;
    }
    config.dpi = 40;
    let page = config.style.page_background;
    let report = Pipeline::new(config).unwrap().run(default_catalog()).unwrap();
    assert!(report.is_success(), "failures: {:?}", report.failures);

    for job in default_catalog() {
        let path = tmp.path().join(format!("{}.png", job.id));
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n", "{}", job.id);

        let size_in = match job.backend {
            BackendKind::Static => job.encoding.size_in,
            BackendKind::Interactive => INTERACTIVE_SIZE_IN,
        };
        let image = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let (width, height) = image.dimensions();
        assert!(width > 0 && f64::from(width) <= (size_in.0 * 40.0).round(), "{}", job.id);
        assert!(height > 0 && f64::from(height) <= (size_in.1 * 40.0).round(), "{}", job.id);
        assert_eq!(image.get_pixel(0, 0).0, [page.0, page.1, page.2], "{}", job.id);
        assert!(image.pixels().any(|p| p.0 != [page.0, page.1, page.2]), "{}", job.id);
    }
}
