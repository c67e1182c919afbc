//! Weight computation and weighted merging of normalized exposures.
//!
//! Weight maps are computed independently per exposure; the merge divides
//! out the per-pixel weight sum.

pub mod fuse;
pub mod weights;

pub use fuse::*;
pub use weights::*;
