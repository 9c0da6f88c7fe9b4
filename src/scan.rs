//! Tree scan and mirror.
//!
//! Phase 1 of a run. Walks the source tree breadth-first, recreates every
//! directory under the destination, copies non-image files straight away and
//! collects one [`TransformJob`] per image for the worker pool.
//!
//! ```text
//! photos/                     dst/photos/
//! ├── notes.txt        copy   ├── notes.txt
//! ├── a.png            job    ├── a.jpg        (written later by the pool)
//! └── 2024/                   └── 2024/
//!     └── b.JPG        job        └── b.jpg
//! ```
//!
//! The mirrored root is `dst_parent/<source dir name>`. Every directory is
//! created before any of its children are visited, and children are visited
//! in file-name order, so the event stream is deterministic.
//!
//! Every destination a copy or job may write is claimed here, before the pool
//! starts, so two sources that map to the same output (`a.png` and `a.jpg`
//! both becoming `a.jpg`) are caught in traversal order rather than racing
//! in the workers.
//!
//! Symlinked directories are followed. An alias of a directory seen elsewhere
//! is mirrored again; only a link back to one of its own ancestors is a loop.
//!
//! Any error aborts the scan. Nothing that was already created is removed.

use crate::config::ScanConfig;
use crate::fsutil::copy_new;
use crate::transform::{TransformJob, TransformKind};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),
    #[error("Not a file or directory: {0}")]
    NotFileOrDirectory(PathBuf),
    #[error("Path is outside the source root: {0}")]
    OutsideRoot(PathBuf),
    #[error("Destination {0} is inside the source tree")]
    DestinationInsideSource(PathBuf),
    #[error("Directory {path} resolves to {target}, one of its own ancestors")]
    SymlinkLoop { path: PathBuf, target: PathBuf },
    #[error("{second} and {first} would both write {output}")]
    OutputCollision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ScanError + '_ {
    move |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Which files become jobs, and for which transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    /// Lowercase, without the leading dot.
    pub suffixes: Vec<String>,
    pub transform: TransformKind,
}

impl ScanPlan {
    pub fn new(config: &ScanConfig, transform: TransformKind) -> Self {
        Self {
            suffixes: config.normalized_suffixes(),
            transform,
        }
    }

    /// Case-insensitive suffix check. Files without a suffix never match.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.suffixes.iter().any(|s| *s == e))
    }
}

/// One resolved entry, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    DirectoryCreated { destination: PathBuf },
    FileCopied { destination: PathBuf, bytes: u64 },
    JobQueued {
        source: PathBuf,
        /// Mirrored path of the source; the job's output may change the suffix.
        destination: PathBuf,
        transform: TransformKind,
    },
}

/// Everything the scan did, plus the jobs left for the pool.
#[derive(Debug, Default)]
pub struct ScanManifest {
    pub created_dirs: Vec<PathBuf>,
    pub copied_files: Vec<PathBuf>,
    pub jobs: Vec<TransformJob>,
}

/// Record that `source` may write `output`, or fail if another source already
/// did.
fn claim(
    claimed: &mut HashMap<PathBuf, PathBuf>,
    output: PathBuf,
    source: &Path,
) -> Result<(), ScanError> {
    if let Some(first) = claimed.get(&output) {
        return Err(ScanError::OutputCollision {
            first: first.clone(),
            second: source.to_path_buf(),
            output,
        });
    }
    claimed.insert(output, source.to_path_buf());
    Ok(())
}

/// Mirror `src` into `dst_parent/<name of src>`.
///
/// `on_event` sees every created directory, copied file and queued job in
/// the order they happen.
pub fn scan<F>(
    src: &Path,
    dst_parent: &Path,
    plan: &ScanPlan,
    mut on_event: F,
) -> Result<ScanManifest, ScanError>
where
    F: FnMut(&ScanEvent),
{
    let root = fs::canonicalize(src).map_err(io_error(src))?;
    let base = root.parent().unwrap_or(&root).to_path_buf();
    if fs::canonicalize(dst_parent)
        .map_err(io_error(dst_parent))?
        .starts_with(&root)
    {
        return Err(ScanError::DestinationInsideSource(dst_parent.to_path_buf()));
    }

    let mut manifest = ScanManifest::default();
    // output path -> the source that claimed it first
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    // each entry carries the canonical paths of the directories above it
    let mut queue = VecDeque::from([(root.clone(), Rc::new(Vec::new()))]);

    while let Some((path, ancestors)) = queue.pop_front() {
        let relative = path
            .strip_prefix(&base)
            .map_err(|_| ScanError::OutsideRoot(path.clone()))?;
        let destination = dst_parent.join(relative);

        let meta = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ScanError::NotFileOrDirectory(path.clone()),
            _ => ScanError::Io {
                path: path.clone(),
                source: e,
            },
        })?;

        if meta.is_dir() {
            let target = fs::canonicalize(&path).map_err(io_error(&path))?;
            if ancestors.contains(&target) {
                return Err(ScanError::SymlinkLoop { path, target });
            }
            let mut chain = Vec::with_capacity(ancestors.len() + 1);
            chain.extend(ancestors.iter().cloned());
            chain.push(target);
            let chain = Rc::new(chain);

            fs::create_dir(&destination).map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => ScanError::DestinationExists(destination.clone()),
                _ => ScanError::Io {
                    path: destination.clone(),
                    source: e,
                },
            })?;
            on_event(&ScanEvent::DirectoryCreated {
                destination: destination.clone(),
            });
            manifest.created_dirs.push(destination);

            for entry in WalkDir::new(&path)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| ScanError::Io {
                    path: path.clone(),
                    source: e.into(),
                })?;
                queue.push_back((entry.into_path(), Rc::clone(&chain)));
            }
        } else if meta.is_file() {
            if plan.matches(&path) {
                let output_dir = destination
                    .parent()
                    .unwrap_or(dst_parent)
                    .to_path_buf();
                let job = TransformJob::new(path, output_dir, plan.transform);
                for output in job.possible_outputs() {
                    claim(&mut claimed, output, &job.source_path)?;
                }
                on_event(&ScanEvent::JobQueued {
                    source: job.source_path.clone(),
                    destination,
                    transform: plan.transform,
                });
                manifest.jobs.push(job);
            } else {
                claim(&mut claimed, destination.clone(), &path)?;
                let bytes = copy_new(&path, &destination).map_err(io_error(&destination))?;
                on_event(&ScanEvent::FileCopied {
                    destination: destination.clone(),
                    bytes,
                });
                manifest.copied_files.push(destination);
            }
        } else {
            return Err(ScanError::NotFileOrDirectory(path));
        }
    }

    debug!(
        dirs = manifest.created_dirs.len(),
        copied = manifest.copied_files.len(),
        jobs = manifest.jobs.len(),
        "scan complete"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::tree_listing;
    use tempfile::TempDir;

    fn plan() -> ScanPlan {
        ScanPlan::new(&ScanConfig::default(), TransformKind::DownSize)
    }

    /// `src/photos` with a nested layout, and an empty `dst`.
    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src/photos");
        fs::create_dir_all(src.join("2024/summer")).unwrap();
        fs::create_dir_all(src.join("docs")).unwrap();
        fs::write(src.join("a.png"), b"png").unwrap();
        fs::write(src.join("notes.txt"), b"hello").unwrap();
        fs::write(src.join("2024/B.JPG"), b"jpg").unwrap();
        fs::write(src.join("2024/summer/c.webp"), b"webp").unwrap();
        fs::write(src.join("docs/readme"), b"no suffix").unwrap();
        let dst = tmp.path().join("dst");
        fs::create_dir(&dst).unwrap();
        (tmp, src, dst)
    }

    fn names(events: &[ScanEvent], base: &Path) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                ScanEvent::DirectoryCreated { destination } => {
                    format!("dir {}", destination.strip_prefix(base).unwrap().display())
                }
                ScanEvent::FileCopied { destination, .. } => {
                    format!("copy {}", destination.strip_prefix(base).unwrap().display())
                }
                ScanEvent::JobQueued { source, .. } => {
                    format!("job {}", source.file_name().unwrap().to_string_lossy())
                }
            })
            .collect()
    }

    #[test]
    fn plan_matches_suffix_case_insensitively() {
        let p = plan();
        assert!(p.matches(Path::new("/x/IMG.JPG")));
        assert!(p.matches(Path::new("/x/a.Heic")));
        assert!(!p.matches(Path::new("/x/a.txt")));
        assert!(!p.matches(Path::new("/x/jpg")));
    }

    #[test]
    fn plan_accepts_dotted_suffixes() {
        let config = ScanConfig {
            suffixes: vec![".PNG".into()],
        };
        let p = ScanPlan::new(&config, TransformKind::StripExif);
        assert!(p.matches(Path::new("a.png")));
        assert!(!p.matches(Path::new("a.jpg")));
    }

    #[test]
    fn mirrors_directories_and_copies_other_files() {
        let (_tmp, src, dst) = setup();
        let manifest = scan(&src, &dst, &plan(), |_| {}).unwrap();

        assert_eq!(
            tree_listing(&dst),
            vec![
                "photos/",
                "photos/2024/",
                "photos/2024/summer/",
                "photos/docs/",
                "photos/docs/readme",
                "photos/notes.txt",
            ]
        );
        assert_eq!(fs::read(dst.join("photos/notes.txt")).unwrap(), b"hello");
        assert_eq!(manifest.created_dirs.len(), 4);
        assert_eq!(manifest.copied_files.len(), 2);
        assert_eq!(manifest.jobs.len(), 3);
    }

    #[test]
    fn jobs_point_at_mirrored_directories() {
        let (_tmp, src, dst) = setup();
        let manifest = scan(&src, &dst, &plan(), |_| {}).unwrap();

        let job = manifest
            .jobs
            .iter()
            .find(|j| j.output_stem == "B")
            .unwrap();
        assert_eq!(job.output_dir, dst.join("photos/2024"));
        assert_eq!(job.transform, TransformKind::DownSize);
        assert_eq!(job.jpeg_output(), dst.join("photos/2024/B.jpg"));
    }

    #[test]
    fn events_are_breadth_first_in_name_order() {
        let (_tmp, src, dst) = setup();
        let mut events = Vec::new();
        scan(&src, &dst, &plan(), |e| events.push(e.clone())).unwrap();

        assert_eq!(
            names(&events, &dst),
            vec![
                "dir photos",
                "dir photos/2024",
                "job a.png",
                "dir photos/docs",
                "copy photos/notes.txt",
                "job B.JPG",
                "dir photos/2024/summer",
                "copy photos/docs/readme",
                "job c.webp",
            ]
        );
    }

    #[test]
    fn existing_destination_is_fatal() {
        let (_tmp, src, dst) = setup();
        fs::create_dir(dst.join("photos")).unwrap();

        let err = scan(&src, &dst, &plan(), |_| {}).unwrap_err();
        assert!(matches!(err, ScanError::DestinationExists(p) if p == dst.join("photos")));
    }

    #[test]
    fn destination_inside_source_is_rejected() {
        let (_tmp, src, _dst) = setup();
        let inner = src.join("docs");

        let err = scan(&src, &inner, &plan(), |_| {}).unwrap_err();
        assert!(matches!(err, ScanError::DestinationInsideSource(_)));
        assert!(!inner.join("photos").exists());
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = scan(&tmp.path().join("nope"), tmp.path(), &plan(), |_| {}).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_not_a_file() {
        let (_tmp, src, dst) = setup();
        std::os::unix::fs::symlink(src.join("gone.txt"), src.join("dangling")).unwrap();

        let err = scan(&src, &dst, &plan(), |_| {}).unwrap_err();
        assert!(matches!(err, ScanError::NotFileOrDirectory(p) if p.ends_with("dangling")));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_detected() {
        let (_tmp, src, dst) = setup();
        std::os::unix::fs::symlink(&src, src.join("2024/back")).unwrap();

        let err = scan(&src, &dst, &plan(), |_| {}).unwrap_err();
        assert!(matches!(err, ScanError::SymlinkLoop { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn sibling_alias_is_mirrored_twice() {
        let (_tmp, src, dst) = setup();
        std::os::unix::fs::symlink(src.join("docs"), src.join("docs_alias")).unwrap();

        scan(&src, &dst, &plan(), |_| {}).unwrap();

        assert_eq!(fs::read(dst.join("photos/docs/readme")).unwrap(), b"no suffix");
        assert_eq!(
            fs::read(dst.join("photos/docs_alias/readme")).unwrap(),
            b"no suffix"
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_an_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, src, dst) = setup();
        let locked = src.join("docs");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced for this user (root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = scan(&src, &dst, &plan(), |_| {});
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(ScanError::Io { path, .. }) if path.ends_with("docs")));
    }

    #[test]
    fn colliding_outputs_are_rejected_before_any_job_runs() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.jpg"), b"jpg").unwrap();
        fs::write(src.join("a.png"), b"png").unwrap();
        let dst = tmp.path().join("dst");
        fs::create_dir(&dst).unwrap();

        let plan = ScanPlan::new(&ScanConfig::default(), TransformKind::DownScale);
        let err = scan(&src, &dst, &plan, |_| {}).unwrap_err();
        match err {
            ScanError::OutputCollision {
                output,
                first,
                second,
            } => {
                assert_eq!(output, dst.join("photos/a.jpg"));
                assert!(first.ends_with("a.jpg"));
                assert!(second.ends_with("a.png"));
            }
            other => panic!("expected OutputCollision, got {other:?}"),
        }
    }

    #[test]
    fn same_stem_is_fine_when_suffixes_are_kept() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.jpg"), b"jpg").unwrap();
        fs::write(src.join("a.png"), b"png").unwrap();
        let dst = tmp.path().join("dst");
        fs::create_dir(&dst).unwrap();

        let plan = ScanPlan::new(&ScanConfig::default(), TransformKind::StripExif);
        let manifest = scan(&src, &dst, &plan, |_| {}).unwrap();
        assert_eq!(manifest.jobs.len(), 2);
    }

    #[test]
    fn queued_event_names_the_mirrored_path() {
        let (_tmp, src, dst) = setup();
        let mut events = Vec::new();
        scan(&src, &dst, &plan(), |e| events.push(e.clone())).unwrap();

        let queued = events
            .iter()
            .find_map(|e| match e {
                ScanEvent::JobQueued {
                    source,
                    destination,
                    ..
                } if source.ends_with("B.JPG") => Some(destination.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(queued, dst.join("photos/2024/B.JPG"));
    }
}
