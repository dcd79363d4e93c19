//! Loss functions and their evaluation-side counterparts.

pub mod dice;

pub use dice::*;
