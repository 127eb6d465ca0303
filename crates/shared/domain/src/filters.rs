//! Filters accepted by the list operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// List filters. All fields are optional; `tag_names` match
/// case-insensitively against stored tag names. The date bounds compare
/// strictly (`>` / `<`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostFilters {
    pub author_id: Option<i64>,
    #[serde(default)]
    pub tag_names: Vec<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}
