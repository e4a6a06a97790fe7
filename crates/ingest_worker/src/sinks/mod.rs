mod archive_sink;
mod csv_rows;
mod live_view_sink;
mod warehouse_sink;

pub use archive_sink::*;
pub use csv_rows::*;
pub use live_view_sink::*;
pub use warehouse_sink::*;
