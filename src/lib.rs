pub mod client;
pub mod core;

pub use crate::client::{ApiCall, ApiResponse, FacebookClient};
pub use crate::core::{
    config::ClientConfig,
    errors::ClientError,
    kernel::{CallPool, PendingCall},
    types::*,
};
