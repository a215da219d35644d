pub mod cache;
pub mod feature;
pub mod index;
pub mod polygon;

pub use cache::*;
pub use feature::*;
pub use index::*;
