//! Reply-thread reconstruction and view-model building for stored social posts.
//!
//! Posts enter through [`Post::from_document`], seeds are chosen through a
//! [`PostSource`], each seed is walked back to its root by [`resolve_thread`],
//! and every resolved chain is turned into display-ready [`ThreadView`] values.

mod post;
mod query;
mod render;
mod thread;
mod view;

pub use post::{
    Author, MediaItem, MediaKind, Post, PostDocument, PostMetrics, ReferenceKind,
    ReferencedPost,
};
pub use query::{AuthorHandle, Limit, PostSource, SelectionMode, DEFAULT_LIMIT, MAX_LIMIT};
pub use render::{
    render_cycle, render_single, CachedLookup, CycleStats, RenderOptions, RenderOutput,
};
pub use thread::{
    resolve_thread, ResolveOptions, ResolvedThread, ThreadStop, DEFAULT_MAX_HOPS,
};
pub use view::{
    build_thread_view, build_view_model, escape_html, format_timestamp, sortable_timestamp,
    AdditionalDetails, AuthorDetails, AuthorView, MediaView, MetricValue, MetricsView, PostView,
    ReplyAnnotation, ThreadView, TimestampView, NOT_AVAILABLE, NOT_SPECIFIED, VIDEO_PLACEHOLDER,
};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ThreadError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("connectivity error: {0}")]
    Connectivity(String),
    #[error("post not found: {0}")]
    NotFound(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl ThreadError {
    /// Whether the error aborts a whole render cycle rather than one field or hop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Connectivity(_) | Self::Validation(_))
    }
}
