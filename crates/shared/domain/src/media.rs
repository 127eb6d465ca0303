//! Media attachments owned by a post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(format!("invalid media type: {other}")),
        }
    }
}

/// Media attachment persisted for a post. `(post_id, position)` is unique
/// and position stays within [1, 9].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMedia {
    pub id: i64,
    pub post_id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub position: i32,
    pub created_at: Option<DateTime<Utc>>,
}

/// Media attachment input as accepted by create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMediaInput {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_round_trips_through_str() {
        assert_eq!("image".parse::<MediaType>().unwrap(), MediaType::Image);
        assert_eq!("video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert_eq!(MediaType::Image.as_str(), "image");
        assert!("gif".parse::<MediaType>().is_err());
    }
}
