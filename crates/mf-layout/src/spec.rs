//! Declarative placement rules.

use serde::{Deserialize, Serialize};

use mf_core::{Error, Result};

use crate::anchor::AnchorOffset;

/// Scale the element so it covers `horizontal_coverage` of the canvas width
/// (aspect ratio preserved), then anchor it.
///
/// Wire form:
/// `{"horizontalCoverage":0.2,"anchorOffset":{"referring":{..},"reference":{..},"offset":{..}}}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizontalCoverageLayoutSpec {
    pub horizontal_coverage: f64,
    pub anchor_offset: AnchorOffset,
}

impl HorizontalCoverageLayoutSpec {
    /// Create a validated spec.
    pub fn new(horizontal_coverage: f64, anchor_offset: AnchorOffset) -> Result<Self> {
        let spec = Self {
            horizontal_coverage,
            anchor_offset,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Parse the JSON wire form. Malformed input is an [`Error::InvalidLayoutSpec`].
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)
            .map_err(|e| Error::invalid_layout(format!("malformed layout spec: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Coverage must lie in `(0, 1]`; anchors in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let c = self.horizontal_coverage;
        if !(c > 0.0 && c <= 1.0) {
            return Err(Error::invalid_layout(format!(
                "horizontal coverage {c} outside (0, 1]"
            )));
        }
        self.anchor_offset.validate()
    }
}

/// Keep the element at its own size and only anchor it.
///
/// Unknown fields are rejected so a coverage spec with a bad
/// `horizontalCoverage` never parses as an unscaled placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AbsolutePositionLayoutSpec {
    pub anchor_offset: AnchorOffset,
}

impl AbsolutePositionLayoutSpec {
    pub fn new(anchor_offset: AnchorOffset) -> Result<Self> {
        anchor_offset.validate()?;
        Ok(Self { anchor_offset })
    }
}

/// Either placement rule. Deserializes from whichever wire form is given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutSpec {
    HorizontalCoverage(HorizontalCoverageLayoutSpec),
    AbsolutePosition(AbsolutePositionLayoutSpec),
}

impl LayoutSpec {
    pub fn anchor_offset(&self) -> &AnchorOffset {
        match self {
            LayoutSpec::HorizontalCoverage(s) => &s.anchor_offset,
            LayoutSpec::AbsolutePosition(s) => &s.anchor_offset,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            LayoutSpec::HorizontalCoverage(s) => s.validate(),
            LayoutSpec::AbsolutePosition(s) => s.anchor_offset.validate(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)
            .map_err(|e| Error::invalid_layout(format!("malformed layout spec: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }
}

impl From<HorizontalCoverageLayoutSpec> for LayoutSpec {
    fn from(spec: HorizontalCoverageLayoutSpec) -> Self {
        LayoutSpec::HorizontalCoverage(spec)
    }
}

impl From<AbsolutePositionLayoutSpec> for LayoutSpec {
    fn from(spec: AbsolutePositionLayoutSpec) -> Self {
        LayoutSpec::AbsolutePosition(spec)
    }
}
