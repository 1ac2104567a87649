use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{Post, ThreadError};

pub const DEFAULT_MAX_HOPS: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct ResolveOptions {
    /// Ancestor lookups allowed per thread, independent of the cycle guard.
    pub max_hops: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { max_hops: DEFAULT_MAX_HOPS }
    }
}

/// Why the walk towards the root ended.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ThreadStop {
    /// The earliest post replies to nothing.
    Root,
    /// The referenced parent is absent or its stored document is unusable.
    MissingAncestor { id: String },
    /// The referenced parent is already part of the chain.
    Cycle { id: String },
    /// The store failed while fetching the parent.
    LookupFailed { id: String, error: String },
    DepthLimit { max_hops: usize },
}

impl ThreadStop {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Root)
    }
}

/// Chain of posts, root first and seed last.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedThread {
    pub posts: Vec<Post>,
    pub stop: ThreadStop,
}

impl ResolvedThread {
    #[must_use]
    pub fn seed(&self) -> Option<&Post> {
        self.posts.last()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.posts.iter().map(|post| post.id.as_str()).collect()
    }
}

/// Walk `seed`'s reply ancestry backwards, one `lookup` per hop.
///
/// Never fails: a missing parent, a cycle, a store error or the hop ceiling
/// each bound the chain at the last post that resolved, and the reason is
/// recorded in [`ResolvedThread::stop`].
pub fn resolve_thread<F>(seed: Post, mut lookup: F, options: ResolveOptions) -> ResolvedThread
where
    F: FnMut(&str) -> Result<Option<Post>, ThreadError>,
{
    let mut visited = HashSet::from([seed.id.clone()]);
    let mut chain = VecDeque::from([seed]);
    let mut hops = 0_usize;

    let stop = loop {
        let Some(parent_id) = chain.front().and_then(Post::replied_to).map(str::to_string) else {
            break ThreadStop::Root;
        };

        if visited.contains(&parent_id) {
            tracing::warn!(post_id = %parent_id, "reply cycle detected, stopping thread walk");
            break ThreadStop::Cycle { id: parent_id };
        }

        if hops >= options.max_hops {
            tracing::warn!(max_hops = options.max_hops, "thread walk reached hop ceiling");
            break ThreadStop::DepthLimit { max_hops: options.max_hops };
        }
        hops += 1;

        match lookup(&parent_id) {
            Ok(Some(parent)) if parent.id != parent_id => {
                tracing::warn!(
                    requested = %parent_id,
                    returned = %parent.id,
                    "store returned a different post than requested"
                );
                break ThreadStop::MissingAncestor { id: parent_id };
            }
            Ok(Some(parent)) => {
                if !visited.insert(parent.id.clone()) {
                    break ThreadStop::Cycle { id: parent_id };
                }
                tracing::debug!(post_id = %parent.id, depth = chain.len(), "resolved ancestor");
                chain.push_front(parent);
            }
            Ok(None) | Err(ThreadError::NotFound(_)) => {
                tracing::debug!(post_id = %parent_id, "ancestor not found, truncating thread");
                break ThreadStop::MissingAncestor { id: parent_id };
            }
            Err(err) if err.is_fatal() => {
                tracing::warn!(post_id = %parent_id, error = %err, "ancestor lookup failed");
                break ThreadStop::LookupFailed { id: parent_id, error: err.to_string() };
            }
            Err(err) => {
                tracing::warn!(post_id = %parent_id, error = %err, "ancestor document unusable");
                break ThreadStop::MissingAncestor { id: parent_id };
            }
        }
    };

    ResolvedThread { posts: chain.into(), stop }
}
