//! # Path Specifications
//!
//! The data model for addressing data inside nested storage layers.
//!
//! ## Overview
//!
//! A [`PathSpec`] describes one layer and owns the chain of layers below it.
//! Each layer type has a [`PathSpecKind`] that decides at construction time
//! whether the layer is well formed. The [`Factory`] maps type indicators to
//! kinds, so chains can be built and deserialized generically.
//!
//! ```text
//! JSON ──▶ Factory ──▶ PathSpecKind::new_path_spec ──▶ PathSpec chain
//! ```

mod factory;
mod kinds;
pub(crate) mod spec;

pub use factory::Factory;
pub use kinds::{AttributeRule, AttributeType, LayerKind, PathSpecKind};
pub use spec::{Chain, PathSpec};
