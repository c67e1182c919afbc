//! Display encoding: tone reproduction curves and the gamma transfer.

pub mod tonemap;
pub mod transfer;

pub use tonemap::*;
pub use transfer::*;
