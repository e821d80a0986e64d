//! Anchors and offsets.
//!
//! An [`AnchorPoint`] is a normalized point on a rectangle: `(0, 0)` is the
//! top-left corner, `(1, 1)` the bottom-right one. The wire form uses
//! `left`/`top` keys.

use serde::{Deserialize, Serialize};

use mf_core::{Error, Result};

/// Normalized point on a rectangle, both coordinates in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub left: f64,
    pub top: f64,
}

impl AnchorPoint {
    pub const TOP_LEFT: AnchorPoint = AnchorPoint::new(0.0, 0.0);
    pub const TOP_CENTER: AnchorPoint = AnchorPoint::new(0.5, 0.0);
    pub const TOP_RIGHT: AnchorPoint = AnchorPoint::new(1.0, 0.0);
    pub const LEFT_CENTER: AnchorPoint = AnchorPoint::new(0.0, 0.5);
    pub const CENTER: AnchorPoint = AnchorPoint::new(0.5, 0.5);
    pub const RIGHT_CENTER: AnchorPoint = AnchorPoint::new(1.0, 0.5);
    pub const BOTTOM_LEFT: AnchorPoint = AnchorPoint::new(0.0, 1.0);
    pub const BOTTOM_CENTER: AnchorPoint = AnchorPoint::new(0.5, 1.0);
    pub const BOTTOM_RIGHT: AnchorPoint = AnchorPoint::new(1.0, 1.0);

    pub const fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }

    /// Look up a named anchor such as `top-left` or `CENTER`.
    pub fn named(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let anchor = match key.as_str() {
            "top-left" => Self::TOP_LEFT,
            "top-center" => Self::TOP_CENTER,
            "top-right" => Self::TOP_RIGHT,
            "left-center" => Self::LEFT_CENTER,
            "center" => Self::CENTER,
            "right-center" => Self::RIGHT_CENTER,
            "bottom-left" => Self::BOTTOM_LEFT,
            "bottom-center" => Self::BOTTOM_CENTER,
            "bottom-right" => Self::BOTTOM_RIGHT,
            _ => return None,
        };
        Some(anchor)
    }

    /// Reject coordinates outside `[0, 1]` (NaN included).
    pub fn validate(&self, what: &str) -> Result<()> {
        for (axis, v) in [("left", self.left), ("top", self.top)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::invalid_layout(format!(
                    "{what} anchor {axis}={v} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Pixel displacement applied after anchoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Ties a point on the placed (referring) element to a point on the
/// containing (reference) canvas, displaced by `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorOffset {
    pub referring: AnchorPoint,
    pub reference: AnchorPoint,
    #[serde(default)]
    pub offset: Offset,
}

impl AnchorOffset {
    pub const fn new(referring: AnchorPoint, reference: AnchorPoint, offset: Offset) -> Self {
        Self {
            referring,
            reference,
            offset,
        }
    }

    /// Same anchor on both sides, e.g. bottom-right of the element on the
    /// bottom-right of the canvas.
    pub const fn aligned(anchor: AnchorPoint, offset: Offset) -> Self {
        Self::new(anchor, anchor, offset)
    }

    pub fn validate(&self) -> Result<()> {
        self.referring.validate("referring")?;
        self.reference.validate("reference")
    }
}
