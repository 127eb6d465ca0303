//! gRPC client for the user service.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::debug;

use common::{AppError, AppResult, GrpcClientConfig};
use domain::User;
use proto::user::{
    user_service_client::UserServiceClient, GetUserByEmailRequest, GetUserByUsernameRequest,
    GetUserRequest, UserResponse,
};

#[cfg(test)]
use mockall::automock;

/// User lookup contract. Only `get_user` is exercised by the post
/// use-cases; the remaining lookups mirror the remote surface.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserClient: Send + Sync {
    async fn get_user(&self, id: i64) -> AppResult<User>;
    async fn get_user_by_username(&self, username: &str) -> AppResult<User>;
    async fn get_user_by_email(&self, email: &str) -> AppResult<User>;
}

/// Tonic-backed user client over one long-lived multiplexed channel.
pub struct GrpcUserClient {
    client: UserServiceClient<Channel>,
}

impl GrpcUserClient {
    /// Connect to the user service.
    pub async fn connect(config: &GrpcClientConfig) -> Result<Self, tonic::transport::Error> {
        debug!(endpoint = %config.endpoint, "connecting to user service");
        let channel = Endpoint::from_shared(config.endpoint.clone())?
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect()
            .await?;
        Ok(Self {
            client: UserServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl UserClient for GrpcUserClient {
    async fn get_user(&self, id: i64) -> AppResult<User> {
        let request = tonic::Request::new(GetUserRequest { id });

        let mut client = self.client.clone();
        let response = client.get_user(request).await.map_err(status_to_error)?;
        Ok(proto_to_user(response.into_inner()))
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        let request = tonic::Request::new(GetUserByUsernameRequest {
            username: username.to_string(),
        });

        let mut client = self.client.clone();
        let response = client
            .get_user_by_username(request)
            .await
            .map_err(status_to_error)?;
        Ok(proto_to_user(response.into_inner()))
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<User> {
        let request = tonic::Request::new(GetUserByEmailRequest {
            email: email.to_string(),
        });

        let mut client = self.client.clone();
        let response = client
            .get_user_by_email(request)
            .await
            .map_err(status_to_error)?;
        Ok(proto_to_user(response.into_inner()))
    }
}

/// Classify a user-service failure: a NotFound status is the
/// `UserNotFound` sentinel, everything else is an opaque transport error.
fn status_to_error(status: Status) -> AppError {
    match status.code() {
        Code::NotFound => AppError::UserNotFound,
        _ => {
            tracing::warn!(code = ?status.code(), message = status.message(), "user service call failed");
            AppError::ExternalService
        }
    }
}

/// Convert proto UserResponse to domain User.
fn proto_to_user(proto: UserResponse) -> User {
    User {
        id: proto.id,
        username: proto.username,
        name: (!proto.name.is_empty()).then_some(proto.name),
        avatar_url: (!proto.avatar_url.is_empty()).then_some(proto.avatar_url),
    }
}
