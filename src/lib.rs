pub mod beat;
pub mod chart;
pub mod edit;
pub mod error;
pub mod play;
pub mod traits;
pub mod util;

pub use error::ChartError;
