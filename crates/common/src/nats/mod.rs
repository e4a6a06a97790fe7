mod client;
mod subscriber;

pub use client::*;
pub use subscriber::*;
