pub mod catalog;
pub mod contract;
pub mod core;
pub mod factory;
pub mod runtimes;
pub mod transport;

pub use crate::core::types::*;
pub use factory::{FactoryConfig, FactoryOptions, RuntimeFactory};
