//! Unified error handling for the post service.
//!
//! Error kinds are stable, transport-agnostic identifiers. Inner
//! collaborators return specific kinds; the core either passes them
//! through or promotes them to a coarser kind when composing. The inbound
//! gRPC layer is the one place that translates kind -> wire status.

use thiserror::Error;
use tonic::Status;

/// Application error kinds.
///
/// Messages are terse and stable; internal error text is never echoed to
/// clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    // Post errors
    #[error("post not found")]
    PostNotFound,

    #[error("post validation failed")]
    PostValidation,

    #[error("invalid input")]
    InvalidInput,

    #[error("forbidden")]
    Forbidden,

    // External collaborators
    #[error("external service error")]
    ExternalService,

    #[error("user not found")]
    UserNotFound,

    // Store errors
    #[error("database query failed")]
    DatabaseQuery,

    #[error("no rows to update")]
    NoUpdateRows,

    // Media errors
    #[error("failed to attach media")]
    MediaAttachFailed,

    #[error("failed to detach media")]
    MediaDetachFailed,

    #[error("media query failed")]
    MediaQueryFailed,

    #[error("media batch query failed")]
    MediaBatchQueryFailed,

    #[error("failed to reorder media")]
    MediaReorderFailed,

    #[error("media not found")]
    MediaNotFound,

    // Tag errors
    #[error("tag query failed")]
    TagQueryFailed,

    #[error("failed to scan tag row")]
    TagScanFailed,

    #[error("failed to create tag")]
    TagCreateFailed,

    #[error("failed to delete tag")]
    TagDeleteFailed,

    #[error("failed to verify post for tagging")]
    TagVerifyPostFailed,

    #[error("tag not found")]
    TagNotFound,

    #[error("tags not found")]
    TagsNotFound,

    #[error("failed to tag post")]
    TagPost,

    #[error("tag already exists")]
    TagAlreadyExists,

    #[error("unknown tag error")]
    UnknownTag,

    // Cache
    #[error("cache miss")]
    CacheMiss,

    // Internal
    #[error("internal service error")]
    Internal,
}

impl AppError {
    /// Stable identifier used in logs and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::PostNotFound => "POST_NOT_FOUND",
            AppError::PostValidation => "POST_VALIDATION",
            AppError::InvalidInput => "INVALID_INPUT",
            AppError::Forbidden => "FORBIDDEN",
            AppError::ExternalService => "EXTERNAL_SERVICE_ERROR",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::DatabaseQuery => "DATABASE_QUERY",
            AppError::NoUpdateRows => "NO_UPDATE_ROWS",
            AppError::MediaAttachFailed => "MEDIA_ATTACH_FAILED",
            AppError::MediaDetachFailed => "MEDIA_DETACH_FAILED",
            AppError::MediaQueryFailed => "MEDIA_QUERY_FAILED",
            AppError::MediaBatchQueryFailed => "MEDIA_BATCH_QUERY_FAILED",
            AppError::MediaReorderFailed => "MEDIA_REORDER_FAILED",
            AppError::MediaNotFound => "MEDIA_NOT_FOUND",
            AppError::TagQueryFailed => "TAG_QUERY_FAILED",
            AppError::TagScanFailed => "TAG_SCAN_FAILED",
            AppError::TagCreateFailed => "TAG_CREATE_FAILED",
            AppError::TagDeleteFailed => "TAG_DELETE_FAILED",
            AppError::TagVerifyPostFailed => "TAG_VERIFY_POST_FAILED",
            AppError::TagNotFound => "TAG_NOT_FOUND",
            AppError::TagsNotFound => "TAGS_NOT_FOUND",
            AppError::TagPost => "TAG_POST",
            AppError::TagAlreadyExists => "TAG_ALREADY_EXISTS",
            AppError::UnknownTag => "UNKNOWN_TAG_ERROR",
            AppError::CacheMiss => "CACHE_MISS",
            AppError::Internal => "INTERNAL_SERVICE_ERROR",
        }
    }
}

// =============================================================================
// gRPC Status (Tonic)
// =============================================================================

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::PostNotFound => tonic::Code::NotFound,
            AppError::PostValidation => tonic::Code::InvalidArgument,
            AppError::Forbidden => tonic::Code::PermissionDenied,
            // InvalidInput is what the core returns for a non-author update;
            // the gateway expects PermissionDenied for it.
            AppError::InvalidInput => tonic::Code::PermissionDenied,
            _ => tonic::Code::Internal,
        };

        Status::new(code, err.to_string())
    }
}

// =============================================================================
// Store errors
// =============================================================================

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        tracing::error!(error = %err, "database error");
        AppError::DatabaseQuery
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_post_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_post_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::PostNotFound)
    }
}
