pub mod clickhouse;
pub mod domain;
pub mod ingest_worker;
pub mod sinks;

pub use clickhouse::*;
pub use domain::*;
pub use ingest_worker::*;
pub use sinks::*;
