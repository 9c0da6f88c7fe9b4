use clap::{Parser, Subcommand};
use imgmirror::config::{self, MirrorConfig};
use imgmirror::imaging::{Quality, RustBackend};
use imgmirror::scan::{self, ScanPlan};
use imgmirror::transform::{Transform, TransformKind};
use imgmirror::{output, pool};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "imgmirror")]
#[command(about = "Mirror a directory tree while transforming its images")]
#[command(long_about = "\
Mirror a directory tree while transforming its images

SRC is recreated as DST/<name of SRC>. Directories are mirrored first,
non-image files are copied byte-for-byte, and every image is handed to
the chosen transform running on a pool of parallel workers.

  photos/                 DST/photos/
  ├── notes.txt    copy   ├── notes.txt
  ├── a.png        job    ├── a.jpg
  └── 2024/               └── 2024/
      └── b.JPG    job        └── b.jpg

Re-encoding transforms write <stem>.jpg; copies and EXIF-only
rewrites keep the source suffix. Existing files are never overwritten.

Options come from the stock defaults, then --config, then flags.
Run 'imgmirror gen-config' to print a documented config file.")]
#[command(version)]
struct Cli {
    /// TOML config file merged over the stock defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of parallel workers (default: half the cores, at least 2)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Source tree and the existing directory to mirror it into.
#[derive(clap::Args, Clone)]
struct Dirs {
    src: PathBuf,
    dst: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Shrink images until each fits under a size in MB
    DownSize {
        #[command(flatten)]
        dirs: Dirs,
        /// Maximum output size in MB
        #[arg(short, long)]
        size: Option<f64>,
        /// JPEG quality, 1-100
        #[arg(short, long)]
        quality: Option<u32>,
        /// Convert every non-JPEG image, even when under the size
        #[arg(short, long)]
        force: bool,
        /// EXIF tag removed from re-encoded images; repeatable
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
    },
    /// Cap the longer side of every image
    DownScale {
        #[command(flatten)]
        dirs: Dirs,
        /// Maximum width/height in pixels; 0 keeps the size
        #[arg(short, long)]
        dimension: Option<u32>,
        /// JPEG quality, 1-100
        #[arg(short, long)]
        quality: Option<u32>,
        /// EXIF tag removed from re-encoded images; repeatable
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
        /// Copy images under this many MB unchanged; 0 never skips
        #[arg(short = 's', long)]
        skip_under: Option<f64>,
    },
    /// Stretch or squash images to a fixed aspect ratio
    #[command(alias = "distort-images")]
    Distort {
        #[command(flatten)]
        dirs: Dirs,
        /// JPEG quality, 1-100
        #[arg(short, long)]
        quality: Option<u32>,
        /// Width part of the target ratio
        #[arg(long)]
        width_ratio: Option<f64>,
        /// Height part of the target ratio
        #[arg(long)]
        height_ratio: Option<f64>,
    },
    /// Crop black borders off images
    RemoveBlackBar {
        #[command(flatten)]
        dirs: Dirs,
        /// JPEG quality, 1-100
        #[arg(short, long)]
        quality: Option<u32>,
        /// Luma at or below this counts as black
        #[arg(long)]
        threshold: Option<u8>,
    },
    /// Remove EXIF tags without re-encoding
    StripExif {
        #[command(flatten)]
        dirs: Dirs,
        /// EXIF tag to remove, eg. image_description; repeatable
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
    },
    /// Write EXIF tags without re-encoding
    SetExif {
        #[command(flatten)]
        dirs: Dirs,
        /// Tag and value, alternating: -t artist -t john
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
    },
    /// Run a transform by name with options from the config only
    Apply {
        /// down_size, down_scale, distort, remove_black_bar, strip_exif or set_exif
        name: String,
        #[command(flatten)]
        dirs: Dirs,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = config::resolve_config(
        cli.config.as_deref().map(config::load_raw_config).transpose()?,
    )?;
    if let Some(n) = cli.workers {
        config.processing.max_processes = Some(n);
    }
    let (kind, dirs) = apply_flags(cli.command, &mut config)?;
    config.validate()?;

    for dir in [&dirs.src, &dirs.dst] {
        require_dir(dir)?;
    }

    let plan = ScanPlan::new(&config.scan, kind);
    let manifest = scan::scan(&dirs.src, &dirs.dst, &plan, output::print_scan_event)?;
    output::print_scan_summary(&manifest);

    let transform = Transform::from_config(kind, &config);
    let workers = config::effective_workers(&config.processing);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_job_event(&event);
        }
    });
    let result = pool::run(&RustBackend::new(), &transform, &manifest.jobs, workers, Some(tx));
    printer.join().map_err(|_| "progress printer panicked")?;

    let summary = result?;
    output::print_run_summary(&summary);
    if !summary.all_succeeded() {
        return Err(format!("{} of {} jobs failed", summary.failed, summary.total).into());
    }
    Ok(())
}

/// Fold the subcommand's flags into `config`. Flags win over the file.
fn apply_flags(
    command: Command,
    config: &mut MirrorConfig,
) -> Result<(TransformKind, Dirs), Box<dyn std::error::Error>> {
    let resolved = match command {
        Command::DownSize {
            dirs,
            size,
            quality,
            force,
            tags,
        } => {
            let c = &mut config.down_size;
            if let Some(mb) = size {
                c.max_size_mb = mb;
            }
            if let Some(q) = quality {
                c.quality = Quality(q);
            }
            c.force_jpg |= force;
            if !tags.is_empty() {
                c.tags = lowercase(tags);
            }
            (TransformKind::DownSize, dirs)
        }
        Command::DownScale {
            dirs,
            dimension,
            quality,
            tags,
            skip_under,
        } => {
            let c = &mut config.down_scale;
            if let Some(d) = dimension {
                c.max_dimension = d;
            }
            if let Some(q) = quality {
                c.quality = Quality(q);
            }
            if !tags.is_empty() {
                c.tags = lowercase(tags);
            }
            if let Some(mb) = skip_under {
                c.skip_under_mb = mb;
            }
            (TransformKind::DownScale, dirs)
        }
        Command::Distort {
            dirs,
            quality,
            width_ratio,
            height_ratio,
        } => {
            let c = &mut config.distort;
            if let Some(q) = quality {
                c.quality = Quality(q);
            }
            if let Some(w) = width_ratio {
                c.width_aspect_ratio = w;
            }
            if let Some(h) = height_ratio {
                c.height_aspect_ratio = h;
            }
            (TransformKind::Distort, dirs)
        }
        Command::RemoveBlackBar {
            dirs,
            quality,
            threshold,
        } => {
            let c = &mut config.remove_black_bar;
            if let Some(q) = quality {
                c.quality = Quality(q);
            }
            if let Some(t) = threshold {
                c.threshold = t;
            }
            (TransformKind::RemoveBlackBar, dirs)
        }
        Command::StripExif { dirs, tags } => {
            if !tags.is_empty() {
                config.strip_exif.tags = lowercase(tags);
            }
            if config.strip_exif.tags.is_empty() {
                return Err("strip-exif needs at least one -t tag".into());
            }
            (TransformKind::StripExif, dirs)
        }
        Command::SetExif { dirs, tags } => {
            if tags.len() % 2 != 0 {
                return Err("-t values must come in tag/value pairs".into());
            }
            if !tags.is_empty() {
                config.set_exif.values = tags
                    .chunks_exact(2)
                    .map(|kv| (kv[0].clone(), kv[1].clone()))
                    .collect();
            }
            if config.set_exif.values.is_empty() {
                return Err("set-exif needs at least one -t tag -t value pair".into());
            }
            (TransformKind::SetExif, dirs)
        }
        Command::Apply { name, dirs } => (TransformKind::lookup(&name)?, dirs),
        Command::GenConfig => return Err("gen-config does not mirror a tree".into()),
    };
    Ok(resolved)
}

fn lowercase(tags: Vec<String>) -> Vec<String> {
    tags.into_iter().map(|t| t.to_lowercase()).collect()
}

fn require_dir(path: &Path) -> Result<(), String> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(format!("{} is not an existing directory", path.display()))
    }
}

/// Logs go to stderr so progress lines on stdout stay clean.
fn init_logging(verbose: bool) {
    let default = if verbose { "imgmirror=debug" } else { "imgmirror=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
