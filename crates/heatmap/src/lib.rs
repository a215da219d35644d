pub mod builder;
pub mod kernel;
pub mod packed;
pub mod raster;

// Route density rasters: packed route input, Gaussian splatting, background build.
pub use builder::*;
pub use kernel::*;
pub use packed::*;
pub use raster::*;
