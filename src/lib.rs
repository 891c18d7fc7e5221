//! # scanvec
//!
//! Software vector-graphics rasterization: the path-to-pixels pipeline
//! beneath a vector drawing API.
//!
//! Given geometric paths (lines, quadratic/cubic Beziers, elliptical arcs),
//! scanvec produces antialiased per-scanline pixel coverage, subject to an
//! affine transform, a fill or stroke style and a rectangular clip box.
//! Paint evaluation and pixel compositing stay outside: coverage is handed
//! to the caller through a per-scanline callback.
//!
//! ## Pipeline
//!
//! 1. **Curve flattening** - adaptive closed-form subdivision of Beziers
//!    and elliptical arcs into polylines within a squared-chordal-distance
//!    tolerance ("deviation").
//! 2. **Flatten cache** - each path keeps a handful of flattenings, every
//!    one valid over a geometric range of deviations, so repeated draws at
//!    similar transforms never re-flatten.
//! 3. **Stroke generation** - cap/join/dash conversion of a flattening into
//!    closed outline contours, filled under the nonzero rule.
//! 4. **Scanline rasterization** - Liang-Barsky polygon clipping into
//!    fixed-point surface space, then one of three quality tiers: an exact
//!    antialiased Bentley-Ottmann sweep, a fast two-sample sweep, or
//!    non-antialiased binary coverage.
//!
//! ## Concurrency
//!
//! Everything is single-threaded and synchronous. All scratch buffers
//! belong to an [`Engine`] (or its [`Rasterizer`]); one engine per thread,
//! passed by exclusive reference into each draw call. Scratch grows during
//! drawing bursts and shrinks only through the explicit memory-recovery
//! entry points.

// Foundation types and math
pub mod basics;
pub mod error;
pub mod integration;
pub mod intersect;
pub mod math;
pub mod trans_affine;

// Curves and paths
pub mod curves;
pub mod ellipse;
pub mod path;

// Stroke generation
pub mod stroke;

// Scanline rasterizer
pub mod fixedpoint;
pub mod raster_clip;
pub mod rasterizer;
mod raster_better;
mod raster_faster;
mod raster_noaa;

// Front-end
pub mod engine;

pub use basics::{AaQuality, FillRule, PointD, RectI};
pub use curves::{Bezier2, Bezier3, FlattenParams};
pub use ellipse::EllipseArc;
pub use engine::Engine;
pub use error::{Error, Result};
pub use path::Path;
pub use rasterizer::{coverage_spans, Rasterizer, ScanlineFiller};
pub use stroke::{CapStyle, JoinStyle, StrokeGenerator, StrokeStyle};
pub use trans_affine::TransAffine;
