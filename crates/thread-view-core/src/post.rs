use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ThreadError;

/// Raw stored document as it comes out of the store, before any defaults apply.
///
/// Every field is held as loose JSON so a value of the wrong shape degrades that
/// one field instead of rejecting the whole post. Only `id` is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostDocument {
    pub id: Option<Value>,
    pub text: Option<Value>,
    pub created_at: Option<Value>,
    pub author: Option<Value>,
    pub referenced_tweets: Option<Value>,
    pub media: Option<Value>,
    pub public_metrics: Option<Value>,
    pub conversation_id: Option<Value>,
    pub lang: Option<Value>,
    pub possibly_sensitive: Option<Value>,
    pub reply_settings: Option<Value>,
    pub edit_controls: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    RepliedTo,
    Quoted,
    Retweeted,
}

impl ReferenceKind {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "replied_to" => Some(Self::RepliedTo),
            "quoted" => Some(Self::Quoted),
            "retweeted" => Some(Self::Retweeted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct ReferencedPost {
    pub kind: ReferenceKind,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Other(String),
}

impl MediaKind {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "photo" => Self::Photo,
            "video" => Self::Video,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Author {
    pub id: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub verified: Option<bool>,
    pub verified_type: Option<String>,
    pub public_metrics: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PostMetrics {
    pub retweet_count: u64,
    pub reply_count: u64,
    pub like_count: u64,
    pub quote_count: u64,
    pub bookmark_count: Option<u64>,
    pub impression_count: Option<u64>,
}

/// Validated post record. Every later stage reads these fields directly.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub author: Author,
    pub text: String,
    pub created_at: Option<String>,
    pub referenced_posts: Vec<ReferencedPost>,
    pub media: Vec<MediaItem>,
    pub metrics: PostMetrics,
    pub conversation_id: Option<String>,
    pub lang: Option<String>,
    pub possibly_sensitive: Option<bool>,
    pub reply_settings: Option<String>,
    pub edit_controls: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ReferenceEntry {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaEntry {
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
    preview_image_url: Option<String>,
}

impl Post {
    /// Parse one stored JSON document into a validated post.
    ///
    /// # Errors
    /// Returns [`ThreadError::Format`] when the document is not an object of the
    /// expected shape or carries no usable `id`.
    pub fn from_document(value: Value) -> Result<Self, ThreadError> {
        let document: PostDocument = serde_json::from_value(value)
            .map_err(|err| ThreadError::Format(format!("malformed post document: {err}")))?;
        Self::try_from(document)
    }

    /// # Errors
    /// Same as [`Post::from_document`], plus invalid JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, ThreadError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| ThreadError::Format(format!("invalid post JSON: {err}")))?;
        Self::from_document(value)
    }

    /// Identifier of the first `replied_to` reference, if any.
    #[must_use]
    pub fn replied_to(&self) -> Option<&str> {
        self.referenced_posts
            .iter()
            .find(|reference| reference.kind == ReferenceKind::RepliedTo)
            .map(|reference| reference.id.as_str())
    }
}

impl TryFrom<PostDocument> for Post {
    type Error = ThreadError;

    fn try_from(document: PostDocument) -> Result<Self, Self::Error> {
        let id = match document.id {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            _ => return Err(ThreadError::Format("post document has no id".to_string())),
        };

        let author = parse_author(&id, document.author);
        let metrics = parse_metrics(&id, document.public_metrics);
        let references = array_field(&id, "referenced_tweets", document.referenced_tweets);
        let referenced_posts = parse_references(&id, references);
        let media = parse_media(&id, array_field(&id, "media", document.media));

        Ok(Self {
            author,
            text: lenient_field(&id, "text", document.text).unwrap_or_default(),
            created_at: lenient_field(&id, "created_at", document.created_at),
            referenced_posts,
            media,
            metrics,
            conversation_id: lenient_field(&id, "conversation_id", document.conversation_id),
            lang: lenient_field(&id, "lang", document.lang),
            possibly_sensitive: lenient_field(&id, "possibly_sensitive", document.possibly_sensitive),
            reply_settings: lenient_field(&id, "reply_settings", document.reply_settings),
            edit_controls: document.edit_controls.filter(|value| !value.is_null()),
            id,
        })
    }
}

/// Decode one field; a value of the wrong shape counts as absent.
fn lenient_field<T>(post_id: &str, field: &str, value: Option<Value>) -> Option<T>
where
    T: DeserializeOwned,
{
    let value = value.filter(|value| !value.is_null())?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(post_id, field, error = %err, "malformed field, treating as absent");
            None
        }
    }
}

fn object_field(post_id: &str, field: &str, value: Option<Value>) -> Map<String, Value> {
    match value {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(object)) => object,
        Some(_) => {
            tracing::warn!(post_id, field, "expected an object, using defaults");
            Map::new()
        }
    }
}

fn array_field(post_id: &str, field: &str, value: Option<Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            tracing::warn!(post_id, field, "expected an array, treating as empty");
            Vec::new()
        }
    }
}

fn parse_author(post_id: &str, value: Option<Value>) -> Author {
    let mut object = object_field(post_id, "author", value);
    let mut take = |name: &str| object.remove(name);
    Author {
        id: lenient_field(post_id, "author.id", take("id")),
        name: lenient_field(post_id, "author.name", take("name")),
        username: lenient_field(post_id, "author.username", take("username")),
        profile_image_url: lenient_field(
            post_id,
            "author.profile_image_url",
            take("profile_image_url"),
        ),
        created_at: lenient_field(post_id, "author.created_at", take("created_at")),
        description: lenient_field(post_id, "author.description", take("description")),
        location: lenient_field(post_id, "author.location", take("location")),
        verified: lenient_field(post_id, "author.verified", take("verified")),
        verified_type: lenient_field(post_id, "author.verified_type", take("verified_type")),
        public_metrics: take("public_metrics").filter(|value| !value.is_null()),
    }
}

fn parse_metrics(post_id: &str, value: Option<Value>) -> PostMetrics {
    let mut object = object_field(post_id, "public_metrics", value);
    let mut count = |name: &str| {
        lenient_field::<u64>(post_id, &format!("public_metrics.{name}"), object.remove(name))
    };
    PostMetrics {
        retweet_count: count("retweet_count").unwrap_or_default(),
        reply_count: count("reply_count").unwrap_or_default(),
        like_count: count("like_count").unwrap_or_default(),
        quote_count: count("quote_count").unwrap_or_default(),
        bookmark_count: count("bookmark_count"),
        impression_count: count("impression_count"),
    }
}

fn parse_references(post_id: &str, entries: Vec<Value>) -> Vec<ReferencedPost> {
    let mut references = Vec::with_capacity(entries.len());
    for entry in entries {
        let parsed = match serde_json::from_value::<ReferenceEntry>(entry) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(post_id, error = %err, "dropping malformed reference");
                continue;
            }
        };
        let Some(kind) = ReferenceKind::parse(&parsed.kind) else {
            tracing::warn!(post_id, kind = %parsed.kind, "dropping reference of unknown type");
            continue;
        };
        if parsed.id.trim().is_empty() {
            tracing::warn!(post_id, "dropping reference with empty id");
            continue;
        }
        let reference = ReferencedPost { kind, id: parsed.id };
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

fn parse_media(post_id: &str, entries: Vec<Value>) -> Vec<MediaItem> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<MediaEntry>(entry) {
            Ok(parsed) => Some(MediaItem {
                kind: MediaKind::parse(&parsed.kind),
                url: parsed.url,
                preview_image_url: parsed.preview_image_url,
            }),
            Err(err) => {
                tracing::warn!(post_id, error = %err, "dropping malformed media entry");
                None
            }
        })
        .collect()
}
