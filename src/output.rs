//! CLI output formatting for both phases of a run.
//!
//! Every `format_*` function is pure and returns display lines; the matching
//! `print_*` wrapper writes them to stdout. Diagnostics go through `tracing`
//! instead and never mix into these lines.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Create: dst/photos
//! Create: dst/photos/2024
//! Process:down_size: /src/photos/a.png
//! Copy: dst/photos/notes.txt
//! Scanned: 2 directories, 1 copied, 1 queued
//! ```
//!
//! ## Transform
//!
//! ```text
//!     dst/photos/a.jpg: 1800x1200, 1.43 MB, 3 rounds
//!     dst/photos/b.jpg: kept (512.0 KB)
//!     FAILED /src/photos/c.png: Failed to decode ...
//! Done: 2 of 3 images, 1 failed
//! ```

use crate::pool::{JobEvent, RunSummary};
use crate::scan::{ScanEvent, ScanManifest};
use crate::transform::JobOutcome;

const INDENT: &str = "    ";

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

// ============================================================================
// Phase 1: Scan
// ============================================================================

pub fn format_scan_event(event: &ScanEvent) -> String {
    match event {
        ScanEvent::DirectoryCreated { destination } => {
            format!("Create: {}", destination.display())
        }
        ScanEvent::FileCopied { destination, .. } => format!("Copy: {}", destination.display()),
        ScanEvent::JobQueued {
            destination,
            transform,
            ..
        } => format!("Process:{}: {}", transform, destination.display()),
    }
}

pub fn print_scan_event(event: &ScanEvent) {
    println!("{}", format_scan_event(event));
}

pub fn format_scan_summary(manifest: &ScanManifest) -> String {
    format!(
        "Scanned: {} directories, {} copied, {} queued",
        manifest.created_dirs.len(),
        manifest.copied_files.len(),
        manifest.jobs.len()
    )
}

pub fn print_scan_summary(manifest: &ScanManifest) {
    println!("{}", format_scan_summary(manifest));
}

// ============================================================================
// Phase 2: Transform
// ============================================================================

fn outcome_line(outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Copied { output, bytes } => {
            format!("{}: kept ({})", output.display(), format_size(*bytes))
        }
        JobOutcome::Encoded {
            output,
            width,
            height,
            bytes,
            rounds,
        } => {
            let mut line = format!(
                "{}: {}x{}, {}",
                output.display(),
                width,
                height,
                format_size(*bytes)
            );
            if let Some(n) = rounds {
                line.push_str(&format!(", {} round{}", n, if *n == 1 { "" } else { "s" }));
            }
            line
        }
        JobOutcome::Stripped { output, removed: 0 } => {
            format!("{}: nothing to strip", output.display())
        }
        JobOutcome::Stripped { output, removed } => {
            format!("{}: {} tag(s) removed", output.display(), removed)
        }
        JobOutcome::Tagged {
            output,
            attempts: 1,
        } => format!("{}: tagged", output.display()),
        JobOutcome::Tagged { output, attempts } => {
            format!("{}: tagged after {} attempts", output.display(), attempts)
        }
    }
}

/// Format one finished job. Each job is a single indented line.
pub fn format_job_event(event: &JobEvent) -> Vec<String> {
    let line = match event {
        JobEvent::Done { outcome, .. } => outcome_line(outcome),
        JobEvent::Failed { source, error } => {
            format!("FAILED {}: {}", source.display(), error)
        }
    };
    vec![format!("{INDENT}{line}")]
}

pub fn print_job_event(event: &JobEvent) {
    for line in format_job_event(event) {
        println!("{}", line);
    }
}

pub fn format_run_summary(summary: &RunSummary) -> String {
    if summary.all_succeeded() {
        format!("Done: {} images", summary.total)
    } else {
        format!(
            "Done: {} of {} images, {} failed",
            summary.succeeded, summary.total, summary.failed
        )
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("{}", format_run_summary(summary));
}
