//! gRPC clients for collaborating services.

pub mod user_client;

pub use user_client::{GrpcUserClient, UserClient};
