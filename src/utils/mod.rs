//! Utility functions for strip processing
//!
//! - Binarization (global threshold and Otsu)
//! - Morphology (dilation used for noise repair)
//! - The cooperative per-file deadline

pub mod binarization;
pub mod deadline;
pub mod morphology;
