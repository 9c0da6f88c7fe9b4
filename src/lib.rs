//! # imgmirror
//!
//! Mirror a directory tree while transforming the images in it. Directories
//! and non-image files come through unchanged; every image is handed to one
//! transform: shrink to a byte budget, cap its dimensions, distort it to an
//! aspect ratio, crop its black borders, or strip or set EXIF tags.
//!
//! # Architecture: Two Phases
//!
//! ```text
//! 1. Scan   src/  →  dst/src/ skeleton + copies + job list   (sequential, BFS)
//! 2. Pool   jobs  →  transformed files in dst/src/           (parallel, rayon)
//! ```
//!
//! The scan finishes before any image is touched, so directory creation and
//! collision checks happen in a deterministic order and the pool only ever
//! writes into directories that already exist. Jobs share nothing mutable:
//! each reads its own source and writes its own output, opened with
//! `create_new` so nothing is ever overwritten.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Phase 1: breadth-first mirror of the tree, copies, job collection |
//! | [`pool`] | Phase 2: runs the jobs on a per-run rayon pool |
//! | [`transform`] | The transform registry and one module per transform |
//! | [`imaging`] | Pixel backend, dimension math, budget-converging JPEG encoder |
//! | [`exif`] | EXIF container: JPEG APP1 segments, TIFF IFD parsing and writing, tag table |
//! | [`sanitizer`] | Tag stripping and the self-healing tag writer |
//! | [`config`] | Stock defaults, TOML merging, validation |
//! | [`output`] | CLI progress and summary lines |
//! | [`fsutil`] | No-clobber file writes |
//!
//! # Design Decisions
//!
//! ## Closed Transform Set
//!
//! Transforms are a closed enum, [`transform::Transform`]. Names are looked up
//! once, at the CLI boundary; inside the pipeline a bad name cannot exist.
//!
//! ## Quality Is Fixed, Dimensions Shrink
//!
//! Budget-driven encoding keeps the configured JPEG quality and shrinks the
//! longer side by 10% per round instead. See
//! [`imaging::SizeConvergenceEncoder`].
//!
//! ## Metadata Without Re-Encoding
//!
//! EXIF edits rewrite only the APP1 segment; the compressed scan data is
//! copied through untouched. A container that cannot be updated is thrown
//! away and rebuilt, a bounded number of times.

pub mod config;
pub mod exif;
pub mod fsutil;
pub mod imaging;
pub mod output;
pub mod pool;
pub mod sanitizer;
pub mod scan;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
