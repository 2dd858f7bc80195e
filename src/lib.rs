//! Series expansions for fast Gaussian kernel summation
//!
//! The crate provides the expansion engine of a fast-multipole style kernel summation: a
//! [multi-index catalog](multi_index::MultiIndexCatalog) shared by all expansions,
//! [kernel bundles](kernel::KernelAux) that supply bandwidth scaling and derivative tables,
//! [far-field](far_field::FarFieldExpansion) and [local](local::LocalExpansion) expansions, and
//! the translation operators between them. Tree construction and traversal are left to the
//! caller, which only hands in region [bounds](bound::HRectBound), centers and points.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;

pub mod bound;
pub(crate) mod common;
pub mod far_field;
pub mod kernel;
pub mod local;
pub mod multi_index;
pub mod types;
