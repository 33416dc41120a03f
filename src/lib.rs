pub mod clearnode;
pub mod core;
pub mod lending;

pub use clearnode::ClearNodeClient;
pub use core::{
    config::ClearNodeConfig,
    errors::{ClearNodeError, LendingError},
    traits::ClearNodeRpc,
    types::*,
};
pub use lending::LendingService;
