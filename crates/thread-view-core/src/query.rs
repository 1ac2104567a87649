use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{Post, ThreadError};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;
const MAX_HANDLE_LEN: usize = 15;

/// Row bound for the two range scans, validated before it reaches any query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(try_from = "u32", into = "u32")]
pub struct Limit(u32);

impl Limit {
    /// # Errors
    /// Returns [`ThreadError::Validation`] unless `1 <= value <= MAX_LIMIT`.
    pub fn new(value: u32) -> Result<Self, ThreadError> {
        if value == 0 || value > MAX_LIMIT {
            return Err(ThreadError::Validation(format!(
                "limit MUST be in [1, {MAX_LIMIT}], got {value}"
            )));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

impl TryFrom<u32> for Limit {
    type Error = ThreadError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Limit> for u32 {
    fn from(limit: Limit) -> Self {
        limit.0
    }
}

impl Display for Limit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account handle used by the newest-by-author scan.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct AuthorHandle(String);

impl AuthorHandle {
    /// Accepts `name` or `@name`; the stored form has no leading `@`.
    ///
    /// # Errors
    /// Returns [`ThreadError::Validation`] for empty, over-long, or non
    /// `[A-Za-z0-9_]` handles.
    pub fn parse(raw: &str) -> Result<Self, ThreadError> {
        let handle = raw.trim();
        let handle = handle.strip_prefix('@').unwrap_or(handle);
        if handle.is_empty() {
            return Err(ThreadError::Validation("author handle MUST be non-empty".to_string()));
        }
        if handle.chars().count() > MAX_HANDLE_LEN {
            return Err(ThreadError::Validation(format!(
                "author handle MUST be at most {MAX_HANDLE_LEN} characters"
            )));
        }
        if !handle.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(ThreadError::Validation(format!(
                "author handle MUST match [A-Za-z0-9_]: {handle}"
            )));
        }
        Ok(Self(handle.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AuthorHandle {
    type Error = ThreadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AuthorHandle> for String {
    fn from(handle: AuthorHandle) -> Self {
        handle.0
    }
}

impl Display for AuthorHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SelectionMode {
    /// Newest posts written by one designated account.
    Author { handle: AuthorHandle, limit: Limit },
    /// Newest posts from any account.
    Latest { limit: Limit },
}

impl SelectionMode {
    #[must_use]
    pub fn limit(&self) -> Limit {
        match self {
            Self::Author { limit, .. } | Self::Latest { limit } => *limit,
        }
    }

    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Author { handle, limit } => format!("Last {limit} Tweets by {handle}"),
            Self::Latest { .. } => "All Tweet Threads".to_string(),
        }
    }

    /// Heading for the `position`-th thread, counted from 1.
    #[must_use]
    pub fn heading(&self, position: usize) -> String {
        match self {
            Self::Author { .. } => format!("Tweet {position}"),
            Self::Latest { .. } => format!("Tweet Thread {position}"),
        }
    }
}

/// Read-only access to the post document store.
///
/// Both range scans order by `created_at` descending and break ties by `id`
/// ascending.
pub trait PostSource {
    /// Point lookup. `Ok(None)` means the post is absent.
    ///
    /// # Errors
    /// [`ThreadError::Validation`] for an empty id, [`ThreadError::Connectivity`]
    /// when the store cannot answer, [`ThreadError::Format`] when the stored
    /// document cannot be parsed.
    fn get_by_id(&self, id: &str) -> Result<Option<Post>, ThreadError>;

    /// # Errors
    /// [`ThreadError::Connectivity`] when the store cannot answer.
    fn latest(&self, limit: Limit) -> Result<Vec<Post>, ThreadError>;

    /// # Errors
    /// [`ThreadError::Connectivity`] when the store cannot answer.
    fn latest_by_author(&self, handle: &AuthorHandle, limit: Limit)
        -> Result<Vec<Post>, ThreadError>;
}

impl<S: PostSource + ?Sized> PostSource for &S {
    fn get_by_id(&self, id: &str) -> Result<Option<Post>, ThreadError> {
        (**self).get_by_id(id)
    }

    fn latest(&self, limit: Limit) -> Result<Vec<Post>, ThreadError> {
        (**self).latest(limit)
    }

    fn latest_by_author(
        &self,
        handle: &AuthorHandle,
        limit: Limit,
    ) -> Result<Vec<Post>, ThreadError> {
        (**self).latest_by_author(handle, limit)
    }
}
