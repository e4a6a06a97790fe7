pub mod clickhouse;
pub mod domain;
pub mod nats;
pub mod telemetry;

pub use clickhouse::*;
pub use domain::*;
pub use nats::*;
pub use telemetry::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockBusSubscriber;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockBusSubscription;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockWarehouseRepository;
