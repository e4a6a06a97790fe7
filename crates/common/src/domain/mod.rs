mod bus;
mod error;
mod pipeline_settings;
mod sink;
mod weather;

pub use bus::*;
pub use error::*;
pub use pipeline_settings::*;
pub use sink::*;
pub use weather::*;
