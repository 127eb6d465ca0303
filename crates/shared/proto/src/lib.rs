//! gRPC protocol buffer definitions.
//!
//! This crate contains the generated gRPC service definitions for:
//! - PostService: Post management (create, get, list, update, delete)
//! - UserService: User profile lookup (client only)

/// Post service definitions.
pub mod post {
    tonic::include_proto!("post");
}

/// User service definitions.
pub mod user {
    tonic::include_proto!("user");
}

// Re-export commonly used items
pub use post::post_service_server::{PostService, PostServiceServer};
pub use user::user_service_client::UserServiceClient;
