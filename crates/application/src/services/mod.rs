//! 用例服务

mod post_service;

pub use post_service::{
    AddCommentRequest, CreatePostRequest, DataSource, Pagination, PostDetail, PostListing,
    PostService, PostServiceDependencies, UpdatePostRequest,
};
