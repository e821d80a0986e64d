//! Placement solver.
//!
//! Each element is solved independently of the others: scale (for coverage
//! specs), then pin the referring anchor of the scaled element onto the
//! reference anchor of the canvas and shift by the pixel offset. All
//! floating-point work is rounded once (half away from zero) before the
//! integer placement arithmetic, so identical inputs give identical output.

use serde::{Deserialize, Serialize};

use mf_core::{Dimension, Error, Result};

use crate::anchor::{AnchorOffset, AnchorPoint};
use crate::spec::{AbsolutePositionLayoutSpec, HorizontalCoverageLayoutSpec, LayoutSpec};

/// Top-left pixel of a placed element. May be negative or past the canvas
/// edge when an offset pushes the element out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Resolved rectangle for one composited element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacedShape {
    pub position: Position,
    pub dimension: Dimension,
}

/// Canvas plus one placed shape per input element, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiShapeLayout {
    pub canvas: Dimension,
    pub shapes: Vec<PlacedShape>,
}

impl MultiShapeLayout {
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Solve a list of coverage-scaled elements.
pub fn multi_shape_layout(
    canvas: Dimension,
    elements: &[(Dimension, HorizontalCoverageLayoutSpec)],
) -> Result<MultiShapeLayout> {
    solve(canvas, elements.iter().map(|(d, s)| (*d, LayoutSpec::from(*s))))
}

/// Solve a list of unscaled, anchor-positioned elements.
pub fn absolute_multi_shape_layout(
    canvas: Dimension,
    elements: &[(Dimension, AbsolutePositionLayoutSpec)],
) -> Result<MultiShapeLayout> {
    solve(canvas, elements.iter().map(|(d, s)| (*d, LayoutSpec::from(*s))))
}

/// Solve a mixed list of elements.
pub fn layout(canvas: Dimension, elements: &[(Dimension, LayoutSpec)]) -> Result<MultiShapeLayout> {
    solve(canvas, elements.iter().copied())
}

fn solve(
    canvas: Dimension,
    elements: impl Iterator<Item = (Dimension, LayoutSpec)>,
) -> Result<MultiShapeLayout> {
    check_canvas(canvas)?;
    let shapes = elements
        .enumerate()
        .map(|(i, (dim, spec))| {
            place(canvas, dim, &spec)
                .map_err(|e| Error::invalid_layout(format!("element {i}: {}", layout_message(e))))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(MultiShapeLayout { canvas, shapes })
}

/// Place a single element on `canvas`.
pub fn layout_shape(canvas: Dimension, element: Dimension, spec: &LayoutSpec) -> Result<PlacedShape> {
    check_canvas(canvas)?;
    place(canvas, element, spec)
}

fn check_canvas(canvas: Dimension) -> Result<()> {
    if canvas.is_empty() {
        return Err(Error::invalid_layout(format!("canvas {canvas} has zero area")));
    }
    Ok(())
}

fn layout_message(err: Error) -> String {
    match err {
        Error::InvalidLayoutSpec(msg) => msg,
        other => other.to_string(),
    }
}

fn place(canvas: Dimension, element: Dimension, spec: &LayoutSpec) -> Result<PlacedShape> {
    if element.is_empty() {
        return Err(Error::invalid_layout(format!("element {element} has zero area")));
    }
    spec.validate()?;

    let dimension = match spec {
        LayoutSpec::HorizontalCoverage(s) => scaled(canvas, element, s.horizontal_coverage)?,
        LayoutSpec::AbsolutePosition(_) => element,
    };
    let position = anchor(canvas, dimension, spec.anchor_offset())?;
    Ok(PlacedShape {
        position,
        dimension,
    })
}

fn scaled(canvas: Dimension, element: Dimension, coverage: f64) -> Result<Dimension> {
    let canvas_w = f64::from(canvas.width);
    // Never wider than the canvas, never collapsed to nothing.
    let width = (coverage * canvas_w).round().clamp(1.0, canvas_w);
    let scale = coverage * canvas_w / f64::from(element.width);
    let height = (f64::from(element.height) * scale).round().max(1.0);
    if height > f64::from(u32::MAX) {
        return Err(Error::invalid_layout(format!(
            "scaled height of {element} overflows"
        )));
    }
    // Both values are integral and within u32 range here.
    Ok(Dimension::new(width as u32, height as u32))
}

fn anchor(canvas: Dimension, placed: Dimension, ao: &AnchorOffset) -> Result<Position> {
    let (ref_x, ref_y) = resolve(ao.reference, canvas);
    let (refer_x, refer_y) = resolve(ao.referring, placed);
    let x = ref_x - refer_x + i64::from(ao.offset.x);
    let y = ref_y - refer_y + i64::from(ao.offset.y);
    let cast = |v: i64| {
        i32::try_from(v).map_err(|_| Error::invalid_layout(format!("position {v} out of range")))
    };
    Ok(Position::new(cast(x)?, cast(y)?))
}

/// Anchor ⊙ dimension, rounded to whole pixels.
fn resolve(point: AnchorPoint, dim: Dimension) -> (i64, i64) {
    let x = (point.left * f64::from(dim.width)).round() as i64;
    let y = (point.top * f64::from(dim.height)).round() as i64;
    (x, y)
}
