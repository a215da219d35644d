pub mod airports;
pub mod grid;
pub mod point;
pub mod rng;
pub mod route;
pub mod routes;
pub mod traffic;

pub use airports::*;
pub use point::*;
pub use route::*;
pub use routes::*;
pub use traffic::*;
