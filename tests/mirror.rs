//! End-to-end runs through the public API: scan a tree, run the pool, and
//! check the mirrored output.

use image::{DynamicImage, GenericImageView, RgbImage};
use imgmirror::config::MirrorConfig;
use imgmirror::exif::{ExifContainer, jpeg, read_jpeg_exif, resolve_tag_name};
use imgmirror::imaging::RustBackend;
use imgmirror::pool::{self, JobEvent, RunSummary};
use imgmirror::scan::{self, ScanEvent, ScanPlan};
use imgmirror::transform::{Transform, TransformKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tempfile::TempDir;
use walkdir::WalkDir;

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    }))
}

fn write_image(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}

fn write_tagged_jpeg(path: &Path, width: u32, height: u32, tags: &[(&str, &str)]) {
    let mut plain = Vec::new();
    gradient(width, height)
        .write_to(&mut std::io::Cursor::new(&mut plain), image::ImageFormat::Jpeg)
        .unwrap();
    let mut container = ExifContainer::new();
    for (name, value) in tags {
        container.set(resolve_tag_name(name).unwrap(), value).unwrap();
    }
    fs::write(path, jpeg::embed_exif(&plain, &container.to_bytes()).unwrap()).unwrap();
}

fn artist_of(path: &Path) -> Option<String> {
    let container = read_jpeg_exif(&fs::read(path).unwrap()).unwrap()?;
    container
        .get(resolve_tag_name("artist").unwrap())
        .and_then(|e| e.as_ascii())
}

/// Relative paths of every file under `root`, sorted.
fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

struct Fixture {
    _tmp: TempDir,
    src: PathBuf,
    dst: PathBuf,
}

/// `album/` with a text file, a PNG, a JPEG and a nested directory.
fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("album");
    fs::create_dir_all(src.join("day1/raw")).unwrap();
    fs::create_dir_all(src.join("empty")).unwrap();
    fs::write(src.join("README.txt"), b"captions live here\n").unwrap();
    write_image(&src.join("cover.png"), 320, 200);
    write_tagged_jpeg(&src.join("day1/IMG_0001.JPG"), 400, 300, &[("Artist", "kim")]);
    write_image(&src.join("day1/raw/scan.bmp"), 64, 64);
    let dst = tmp.path().join("out");
    fs::create_dir(&dst).unwrap();
    Fixture {
        _tmp: tmp,
        src,
        dst,
    }
}

fn run(f: &Fixture, config: &MirrorConfig, kind: TransformKind) -> (Vec<ScanEvent>, RunSummary) {
    config.validate().unwrap();
    let mut events = Vec::new();
    let manifest = scan::scan(
        &f.src,
        &f.dst,
        &ScanPlan::new(&config.scan, kind),
        |e| events.push(e.clone()),
    )
    .unwrap();
    let transform = Transform::from_config(kind, config);
    let summary = pool::run(&RustBackend::new(), &transform, &manifest.jobs, 2, None).unwrap();
    (events, summary)
}

#[test]
fn down_size_mirrors_every_entry() {
    let f = fixture();
    let mut config = MirrorConfig::default();
    config.down_size.max_size_mb = 0.01;

    let (_, summary) = run(&f, &config, TransformKind::DownSize);

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.total, 3);
    let out = f.dst.join("album");
    assert_eq!(
        files_under(&out),
        vec![
            PathBuf::from("README.txt"),
            PathBuf::from("cover.jpg"),
            PathBuf::from("day1/IMG_0001.jpg"),
            PathBuf::from("day1/raw/scan.jpg"),
        ]
    );
    assert!(out.join("empty").is_dir());
    assert_eq!(
        fs::read(out.join("README.txt")).unwrap(),
        fs::read(f.src.join("README.txt")).unwrap()
    );
    for name in ["cover.jpg", "day1/IMG_0001.jpg", "day1/raw/scan.jpg"] {
        let len = fs::metadata(out.join(name)).unwrap().len();
        assert!(len <= 10_485, "{name} is {len} bytes");
    }
    assert_eq!(artist_of(&out.join("day1/IMG_0001.jpg")).as_deref(), Some("kim"));
}

#[test]
fn generous_budget_copies_images_verbatim() {
    let f = fixture();
    let config = MirrorConfig::default();

    let (_, summary) = run(&f, &config, TransformKind::DownSize);

    assert!(summary.all_succeeded());
    let out = f.dst.join("album");
    assert_eq!(
        fs::read(out.join("day1/IMG_0001.JPG")).unwrap(),
        fs::read(f.src.join("day1/IMG_0001.JPG")).unwrap()
    );
    // Not a JPEG, but force_jpg is off.
    assert!(out.join("cover.png").exists());
}

#[test]
fn down_scale_with_zero_cap_keeps_dimensions() {
    let f = fixture();
    let config = MirrorConfig::default();

    run(&f, &config, TransformKind::DownScale);

    let out = f.dst.join("album");
    let cover = image::open(out.join("cover.jpg")).unwrap();
    assert_eq!(cover.dimensions(), (320, 200));
    let photo = image::open(out.join("day1/IMG_0001.jpg")).unwrap();
    assert_eq!(photo.dimensions(), (400, 300));
}

#[test]
fn distort_never_grows_an_image() {
    let f = fixture();
    let mut config = MirrorConfig::default();
    config.distort.width_aspect_ratio = 16.0;
    config.distort.height_aspect_ratio = 9.0;

    run(&f, &config, TransformKind::Distort);

    let out = f.dst.join("album");
    for (name, source) in [("cover.jpg", (320, 200)), ("day1/raw/scan.jpg", (64, 64))] {
        let (w, h) = image::open(out.join(name)).unwrap().dimensions();
        assert!(w <= source.0 && h <= source.1, "{name}: {w}x{h}");
    }
}

#[test]
fn strip_exif_keeps_suffix_and_other_bytes() {
    let f = fixture();
    let mut config = MirrorConfig::default();
    config.strip_exif.tags = vec!["artist".into()];

    run(&f, &config, TransformKind::StripExif);

    let out = f.dst.join("album");
    let stripped = out.join("day1/IMG_0001.JPG");
    assert_eq!(artist_of(&stripped), None);
    assert_eq!(
        fs::read(out.join("cover.png")).unwrap(),
        fs::read(f.src.join("cover.png")).unwrap()
    );
}

#[test]
fn set_exif_fails_non_jpegs_but_tags_jpegs() {
    let f = fixture();
    let mut config = MirrorConfig::default();
    config.set_exif.values.insert("artist".into(), "john".into());

    let (_, summary) = run(&f, &config, TransformKind::SetExif);

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
    let out = f.dst.join("album");
    assert_eq!(artist_of(&out.join("day1/IMG_0001.JPG")).as_deref(), Some("john"));
}

#[test]
fn events_follow_the_tree_breadth_first() {
    let f = fixture();
    let (events, _) = run(&f, &MirrorConfig::default(), TransformKind::StripExif);

    let dirs: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::DirectoryCreated { destination } => {
                Some(destination.strip_prefix(&f.dst).unwrap().to_path_buf())
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        dirs,
        vec![
            PathBuf::from("album"),
            PathBuf::from("album/day1"),
            PathBuf::from("album/empty"),
            PathBuf::from("album/day1/raw"),
        ]
    );
}

#[test]
fn rerun_into_same_destination_is_rejected() {
    let f = fixture();
    let config = MirrorConfig::default();
    run(&f, &config, TransformKind::StripExif);

    let err = scan::scan(
        &f.src,
        &f.dst,
        &ScanPlan::new(&config.scan, TransformKind::StripExif),
        |_| {},
    )
    .unwrap_err();
    assert!(matches!(err, scan::ScanError::DestinationExists(_)));
}

#[test]
fn progress_events_cover_every_job() {
    let f = fixture();
    let config = MirrorConfig::default();
    let manifest = scan::scan(
        &f.src,
        &f.dst,
        &ScanPlan::new(&config.scan, TransformKind::DownScale),
        |_| {},
    )
    .unwrap();

    let (tx, rx) = mpsc::channel();
    let transform = Transform::from_config(TransformKind::DownScale, &config);
    pool::run(&RustBackend::new(), &transform, &manifest.jobs, 4, Some(tx)).unwrap();

    let mut done: Vec<_> = rx
        .iter()
        .map(|e| match e {
            JobEvent::Done { source, .. } => source.file_name().unwrap().to_owned(),
            JobEvent::Failed { source, error } => panic!("{} failed: {error}", source.display()),
        })
        .collect();
    done.sort();
    assert_eq!(done, vec!["IMG_0001.JPG", "cover.png", "scan.bmp"]);
}
