//! 领域实体模块

pub mod comment;
pub mod post;

pub use comment::Comment;
pub use post::{Author, Post};
