//! Inbound gRPC layer.

pub mod post_grpc;

pub use post_grpc::PostGrpcService;
