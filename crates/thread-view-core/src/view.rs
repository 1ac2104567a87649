use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};
use serde_json::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::{MediaKind, Post, ResolvedThread, ThreadError, ThreadStop};

pub const NOT_AVAILABLE: &str = "N/A";
pub const NOT_SPECIFIED: &str = "Not specified";
pub const VIDEO_PLACEHOLDER: &str = "Video content available (cannot be displayed directly)";

const UNKNOWN_NAME: &str = "Unknown";
const UNKNOWN_USERNAME: &str = "unknown";

static STORED_TIMESTAMP: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z");
static SORTABLE_TIMESTAMP: &[FormatItem<'_>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
);
static DISPLAY_TIMESTAMP: &[FormatItem<'_>] = format_description!(
    "[hour repr:12]:[minute] [period] · [month repr:short] [day], [year]"
);

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct AuthorView {
    pub name: String,
    pub username: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimestampView {
    Formatted { display: String },
    Unparsed { raw: String, error: String },
    Absent,
}

/// Counter that is either a number or the "N/A" sentinel.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MetricValue {
    Count(u64),
    NotAvailable,
}

impl From<Option<u64>> for MetricValue {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::NotAvailable, Self::Count)
    }
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(count) => serializer.serialize_u64(*count),
            Self::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct MetricsView {
    pub retweet_count: u64,
    pub reply_count: u64,
    pub like_count: u64,
    pub quote_count: u64,
    pub bookmark_count: MetricValue,
    pub impression_count: MetricValue,
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaView {
    Photo {
        url: String,
    },
    Video {
        notice: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        preview_image_url: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct ReplyAnnotation {
    pub username: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorDetails {
    pub id: String,
    pub created_at: String,
    pub description: String,
    pub location: String,
    pub verified: Value,
    pub verified_type: String,
    pub public_metrics: Value,
}

/// Secondary bundle shown on demand; absent fields carry fixed placeholders.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdditionalDetails {
    pub id: String,
    pub conversation_id: String,
    pub lang: String,
    pub possibly_sensitive: Value,
    pub reply_settings: String,
    pub edit_controls: Value,
    pub author_info: AuthorDetails,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostView {
    pub id: String,
    pub author: AuthorView,
    pub text: String,
    pub media: Vec<MediaView>,
    pub created_at: TimestampView,
    pub metrics: MetricsView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replying_to: Option<ReplyAnnotation>,
    pub details: AdditionalDetails,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThreadView {
    pub heading: String,
    pub posts: Vec<PostView>,
    pub stop: ThreadStop,
    pub format_errors: Vec<String>,
}

/// Replace the five markup-significant characters with HTML entities.
#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Render a stored `YYYY-MM-DDTHH:MM:SS.fffZ` timestamp as `03:04 PM · Jan 02, 2024`.
///
/// # Errors
/// Returns [`ThreadError::Format`] when `raw` does not match the stored format.
pub fn format_timestamp(raw: &str) -> Result<String, ThreadError> {
    let parsed = PrimitiveDateTime::parse(raw, STORED_TIMESTAMP)
        .map_err(|err| ThreadError::Format(format!("invalid created_at {raw:?}: {err}")))?;
    parsed
        .assume_utc()
        .format(DISPLAY_TIMESTAMP)
        .map_err(|err| ThreadError::Format(format!("cannot display created_at {raw:?}: {err}")))
}

/// Rewrite a stored timestamp with a fixed nine-digit fraction so that text order
/// matches time order and equal instants compare equal.
///
/// # Errors
/// Returns [`ThreadError::Format`] when `raw` does not match the stored format.
pub fn sortable_timestamp(raw: &str) -> Result<String, ThreadError> {
    PrimitiveDateTime::parse(raw, STORED_TIMESTAMP)
        .map_err(|err| ThreadError::Format(format!("invalid created_at {raw:?}: {err}")))?
        .format(SORTABLE_TIMESTAMP)
        .map_err(|err| ThreadError::Format(format!("cannot normalize created_at {raw:?}: {err}")))
}

/// Build the view of one post. `next` is the post that follows it in its thread.
///
/// Timestamp problems never abort the build; they are returned next to the view.
#[must_use]
pub fn build_view_model(post: &Post, next: Option<&Post>) -> (PostView, Vec<ThreadError>) {
    let mut errors = Vec::new();

    let created_at = match post.created_at.as_deref() {
        None | Some("") => TimestampView::Absent,
        Some(raw) => match format_timestamp(raw) {
            Ok(display) => TimestampView::Formatted { display },
            Err(err) => {
                tracing::debug!(post_id = %post.id, error = %err, "keeping raw timestamp");
                let view = TimestampView::Unparsed { raw: raw.to_string(), error: err.to_string() };
                errors.push(err);
                view
            }
        },
    };

    let replying_to = next.map(|next| {
        let username = escape_html(next.author.username.as_deref().unwrap_or(UNKNOWN_NAME));
        ReplyAnnotation { label: format!("Replying to @{username}"), username }
    });

    let view = PostView {
        id: post.id.clone(),
        author: author_view(post),
        text: escape_html(&post.text),
        media: media_views(post),
        created_at,
        metrics: MetricsView {
            retweet_count: post.metrics.retweet_count,
            reply_count: post.metrics.reply_count,
            like_count: post.metrics.like_count,
            quote_count: post.metrics.quote_count,
            bookmark_count: post.metrics.bookmark_count.into(),
            impression_count: post.metrics.impression_count.into(),
        },
        replying_to,
        details: additional_details(post),
    };

    (view, errors)
}

/// Build views for a whole resolved chain, annotating every post but the last.
#[must_use]
pub fn build_thread_view(heading: impl Into<String>, thread: &ResolvedThread) -> ThreadView {
    let mut posts = Vec::with_capacity(thread.posts.len());
    let mut format_errors = Vec::new();

    for (index, post) in thread.posts.iter().enumerate() {
        let (view, errors) = build_view_model(post, thread.posts.get(index + 1));
        format_errors.extend(errors.into_iter().map(|err| format!("post {}: {err}", post.id)));
        posts.push(view);
    }

    ThreadView { heading: heading.into(), posts, stop: thread.stop.clone(), format_errors }
}

fn author_view(post: &Post) -> AuthorView {
    let author = &post.author;
    AuthorView {
        name: escape_html(author.name.as_deref().unwrap_or(UNKNOWN_NAME)),
        username: escape_html(author.username.as_deref().unwrap_or(UNKNOWN_USERNAME)),
        profile_image_url: escape_html(author.profile_image_url.as_deref().unwrap_or_default()),
    }
}

fn media_views(post: &Post) -> Vec<MediaView> {
    post.media
        .iter()
        .filter_map(|item| match &item.kind {
            MediaKind::Photo => {
                Some(MediaView::Photo { url: item.url.clone().unwrap_or_default() })
            }
            MediaKind::Video => Some(MediaView::Video {
                notice: VIDEO_PLACEHOLDER.to_string(),
                preview_image_url: item.preview_image_url.clone(),
            }),
            MediaKind::Other(kind) => {
                tracing::debug!(post_id = %post.id, kind = %kind, "skipping unsupported media");
                None
            }
        })
        .collect()
}

fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    value.unwrap_or(placeholder).to_string()
}

fn additional_details(post: &Post) -> AdditionalDetails {
    let author = &post.author;
    AdditionalDetails {
        id: post.id.clone(),
        conversation_id: or_placeholder(post.conversation_id.as_deref(), ""),
        lang: or_placeholder(post.lang.as_deref(), ""),
        possibly_sensitive: post
            .possibly_sensitive
            .map_or_else(|| NOT_AVAILABLE.into(), Value::Bool),
        reply_settings: or_placeholder(post.reply_settings.as_deref(), NOT_AVAILABLE),
        edit_controls: post.edit_controls.clone().unwrap_or_else(|| NOT_AVAILABLE.into()),
        author_info: AuthorDetails {
            id: or_placeholder(author.id.as_deref(), ""),
            created_at: or_placeholder(author.created_at.as_deref(), ""),
            description: or_placeholder(author.description.as_deref(), NOT_AVAILABLE),
            location: or_placeholder(author.location.as_deref(), NOT_SPECIFIED),
            verified: author.verified.map_or_else(|| NOT_AVAILABLE.into(), Value::Bool),
            verified_type: or_placeholder(author.verified_type.as_deref(), NOT_SPECIFIED),
            public_metrics: author
                .public_metrics
                .clone()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        },
    }
}
