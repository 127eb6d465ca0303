//! SeaORM database entities.

pub mod post;
pub mod post_media;
pub mod post_tag;
pub mod tag;
