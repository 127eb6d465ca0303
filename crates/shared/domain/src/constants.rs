//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// Posts
// =============================================================================

/// Minimum post title length
pub const MIN_TITLE_LENGTH: u64 = 3;

/// Maximum post title length
pub const MAX_TITLE_LENGTH: u64 = 255;

/// Minimum post content length when content is present
pub const MIN_CONTENT_LENGTH: u64 = 10;

// =============================================================================
// Media
// =============================================================================

/// Lowest valid media position within a post
pub const MIN_MEDIA_POSITION: i32 = 1;

/// Highest valid media position within a post
pub const MAX_MEDIA_POSITION: i32 = 9;

/// Maximum number of media attachments per post
pub const MAX_MEDIA_PER_POST: u64 = 9;

// =============================================================================
// Tags
// =============================================================================

/// Minimum tag name length
pub const MIN_TAG_LENGTH: u64 = 2;

/// Maximum tag name length
pub const MAX_TAG_LENGTH: u64 = 50;

// =============================================================================
// Listing
// =============================================================================

/// Maximum page size accepted by the list operation
pub const MAX_LIST_LIMIT: u64 = 100;
