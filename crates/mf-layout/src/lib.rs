//! # mf-layout
//!
//! Pure geometry for composite output: given a canvas and an ordered list of
//! elements, each with a placement rule, compute one pixel rectangle per
//! element.
//!
//! - **[`AnchorOffset`]** -- a point on the placed element, a point on the
//!   canvas, and a pixel offset between them.
//! - **[`HorizontalCoverageLayoutSpec`]** -- scale the element to cover a
//!   fraction of the canvas width, then anchor it.
//! - **[`AbsolutePositionLayoutSpec`]** -- anchor the element at its own size.
//! - **[`multi_shape_layout`]** / **[`layout`]** -- the solver.
//!
//! The solver has no state and no I/O. Identical inputs yield identical
//! outputs, and output order always matches input order.

pub mod anchor;
pub mod solver;
pub mod spec;

pub use anchor::{AnchorOffset, AnchorPoint, Offset};
pub use solver::{
    absolute_multi_shape_layout, layout, layout_shape, multi_shape_layout, MultiShapeLayout,
    PlacedShape, Position,
};
pub use spec::{AbsolutePositionLayoutSpec, HorizontalCoverageLayoutSpec, LayoutSpec};
