pub mod indicator;
pub mod period;
pub mod entry;
pub mod dataset;
pub mod config;

pub use indicator::*;
pub use period::*;
pub use entry::*;
pub use dataset::*;
pub use config::*;
