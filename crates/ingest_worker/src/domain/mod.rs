mod batch_accumulator;
mod classifier;
mod pipeline_controller;
mod record_transformer;
mod sink_router;
#[cfg(test)]
pub(crate) mod test_support;
mod unit_converter;

pub use batch_accumulator::*;
pub use classifier::*;
pub use pipeline_controller::*;
pub use record_transformer::*;
pub use sink_router::*;
pub use unit_converter::*;
