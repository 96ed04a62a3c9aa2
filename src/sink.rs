//! Persists figures as `{dir}/{id}.png`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::visualization::{Backend, Figure};

const EXTENSION: &str = "png";

#[derive(Debug, Clone)]
pub struct OutputSink {
    dir: PathBuf,
}

impl OutputSink {
    /// Create `dir` (and parents) if missing. Safe to call repeatedly.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ReportError::Persist {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "output directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    /// Optionally present `figure`, then serialize it through `backend`.
    /// The figure is consumed and released whether or not the write succeeds.
    pub fn present_and_persist(
        &self,
        backend: &dyn Backend,
        figure: Figure,
        id: &str,
        show_first: bool,
    ) -> Result<PathBuf> {
        if show_first {
            if let Err(e) = backend.present(&figure) {
                warn!(id, error = %e, "presentation failed; persisting anyway");
            }
        }
        let path = self.path_for(id);
        let written = backend.serialize(&figure, &path);
        drop(figure);
        written.map(|()| path)
    }

    /// Remove the output of `id` left by an earlier run. Returns whether a
    /// file was removed.
    pub fn discard(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed output of failed job");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ReportError::Persist { path, source }),
        }
    }

    /// Delete `*.png` files whose stem is not in `keep`. Returns the removed paths.
    pub fn prune(&self, keep: &HashSet<&str>) -> Result<Vec<PathBuf>> {
        let persist = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| ReportError::Persist { path, source }
        };
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(persist(&self.dir))? {
            let path = entry.map_err(persist(&self.dir))?.path();
            let is_png = path.extension().is_some_and(|e| e == EXTENSION);
            let stale = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| !keep.contains(stem));
            if path.is_file() && is_png && stale {
                fs::remove_file(&path).map_err(persist(&path))?;
                info!(path = %path.display(), "removed stale output");
                removed.push(path);
            }
        }
        removed.sort();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::catalog::BackendKind;
    use crate::visualization::{FigureContent, FigureRequest};
    use crate::visualization::raster::RasterImage;

    /// Writes a fixed payload, or fails on demand, and counts presentations.
    struct FakeBackend {
        fail: bool,
        presented: Arc<AtomicUsize>,
    }

    impl Backend for FakeBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Static
        }

        fn build_figure(&self, request: &FigureRequest<'_>) -> Result<Figure> {
            Ok(figure(request.job.id))
        }

        fn present(&self, _figure: &Figure) -> Result<()> {
            self.presented.fetch_add(1, Ordering::SeqCst);
            Err(ReportError::Render("no display".into()))
        }

        fn serialize(&self, _figure: &Figure, path: &Path) -> Result<()> {
            if self.fail {
                return Err(ReportError::Render("refused".into()));
            }
            fs::write(path, b"png").map_err(ReportError::from)
        }
    }

    fn figure(id: &str) -> Figure {
        Figure::new(
            id,
            BackendKind::Static,
            FigureContent::Raster(RasterImage {
                width: 1,
                height: 1,
                pixels: vec![0, 0, 0],
            }),
        )
    }

    fn backend(fail: bool) -> (FakeBackend, Arc<AtomicUsize>) {
        let presented = Arc::new(AtomicUsize::new(0));
        (
            FakeBackend {
                fail,
                presented: presented.clone(),
            },
            presented,
        )
    }

    #[test]
    fn creating_the_directory_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("graphs");
        OutputSink::new(&dir).unwrap();
        OutputSink::new(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn persists_under_the_output_id() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(tmp.path()).unwrap();
        let (backend, presented) = backend(false);
        let path = sink
            .present_and_persist(&backend, figure("01_x"), "01_x", false)
            .unwrap();
        assert_eq!(path, tmp.path().join("01_x.png"));
        assert_eq!(fs::read(&path).unwrap(), b"png");
        assert_eq!(presented.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn presentation_failure_does_not_block_persisting() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(tmp.path()).unwrap();
        let (backend, presented) = backend(false);
        sink.present_and_persist(&backend, figure("a"), "a", true)
            .unwrap();
        assert_eq!(presented.load(Ordering::SeqCst), 1);
        assert!(tmp.path().join("a.png").exists());
    }

    #[test]
    fn serialization_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(tmp.path()).unwrap();
        let (backend, _) = backend(true);
        let err = sink
            .present_and_persist(&backend, figure("a"), "a", false)
            .unwrap_err();
        assert!(matches!(err, ReportError::Render(_)));
        assert!(!tmp.path().join("a.png").exists());
    }

    #[test]
    fn discard_removes_previous_output_once() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(tmp.path()).unwrap();
        fs::write(sink.path_for("07_x"), b"old").unwrap();
        assert!(sink.discard("07_x").unwrap());
        assert!(!sink.path_for("07_x").exists());
        assert!(!sink.discard("07_x").unwrap());
    }

    #[test]
    fn prune_removes_only_stale_pngs() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(tmp.path()).unwrap();
        for name in ["keep.png", "old.png", "notes.txt"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        let keep: HashSet<&str> = ["keep"].into_iter().collect();
        let removed = sink.prune(&keep).unwrap();
        assert_eq!(removed, vec![tmp.path().join("old.png")]);
        assert!(tmp.path().join("keep.png").exists());
        assert!(tmp.path().join("notes.txt").exists());
        assert!(sink.prune(&keep).unwrap().is_empty());
    }
}
