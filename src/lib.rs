//! Index microscope images by filename and stage them for slide generation.
//!
//! Filenames such as `NiCoCr_48h_0001_2_UD.tif` or `Co K_alpha_1 Map Data 3.tif`
//! carry a numeric group key and an acquisition type. [`data::parser`] reads
//! both, [`data::index::ImageIndex`] files images into numbered groups, and
//! [`slides`] turns the groups into a slide plan.

pub mod config;
pub mod data;
pub mod error;
pub mod slides;
pub mod state;

pub use error::{IndexError, Result};
