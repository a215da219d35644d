pub mod budget;
pub mod metrics;
pub mod worker;

pub use budget::*;
pub use metrics::*;
pub use worker::*;
