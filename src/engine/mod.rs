pub mod exposure;
pub mod flip;
pub mod gamma;
pub mod result;
pub mod sanitize;

pub use exposure::ExposureAggregator;
pub use flip::locate_flip;
pub use result::ResultBuilder;
pub use sanitize::{CleanResult, Sanitize};
