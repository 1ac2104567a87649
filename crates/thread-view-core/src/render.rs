use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    build_thread_view, resolve_thread, Post, PostSource, ResolveOptions, SelectionMode,
    ThreadError, ThreadView,
};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct RenderOptions {
    pub resolve: ResolveOptions,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Eq, PartialEq)]
pub struct CycleStats {
    pub seeds: usize,
    pub store_lookups: usize,
    pub cache_hits: usize,
}

/// Everything one render cycle hands to the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderOutput {
    pub mode: SelectionMode,
    pub title: String,
    pub threads: Vec<ThreadView>,
    pub stats: CycleStats,
}

/// Point-lookup memo shared by every seed of one render cycle.
///
/// Successful answers, including "absent", are kept; store errors are not, so a
/// later hop may retry the same id.
pub struct CachedLookup<S> {
    source: S,
    posts: HashMap<String, Option<Post>>,
    store_lookups: usize,
    cache_hits: usize,
}

impl<S: PostSource> CachedLookup<S> {
    pub fn new(source: S) -> Self {
        Self { source, posts: HashMap::new(), store_lookups: 0, cache_hits: 0 }
    }

    /// Record a post that is already in hand, such as a seed from a range scan.
    pub fn prime(&mut self, post: &Post) {
        self.posts.entry(post.id.clone()).or_insert_with(|| Some(post.clone()));
    }

    /// # Errors
    /// Propagates the underlying [`PostSource::get_by_id`] error.
    pub fn get(&mut self, id: &str) -> Result<Option<Post>, ThreadError> {
        if let Some(cached) = self.posts.get(id) {
            self.cache_hits += 1;
            return Ok(cached.clone());
        }
        self.store_lookups += 1;
        let fetched = self.source.get_by_id(id)?;
        self.posts.insert(id.to_string(), fetched.clone());
        Ok(fetched)
    }

    #[must_use]
    pub fn store_lookups(&self) -> usize {
        self.store_lookups
    }

    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }
}

fn select_seeds<S: PostSource>(source: &S, mode: &SelectionMode) -> Result<Vec<Post>, ThreadError> {
    match mode {
        SelectionMode::Author { handle, limit } => source.latest_by_author(handle, *limit),
        SelectionMode::Latest { limit } => source.latest(*limit),
    }
}

/// Run one render cycle: pick seeds for `mode`, resolve each thread, build views.
///
/// # Errors
/// Returns the seed-selection error unchanged; per-thread trouble is reported
/// inside each [`ThreadView`] instead.
pub fn render_cycle<S: PostSource>(
    source: &S,
    mode: &SelectionMode,
    options: RenderOptions,
) -> Result<RenderOutput, ThreadError> {
    let seeds = select_seeds(source, mode)?;
    tracing::info!(title = %mode.title(), seeds = seeds.len(), "starting render cycle");

    let mut lookup = CachedLookup::new(source);
    for seed in &seeds {
        lookup.prime(seed);
    }

    let seed_count = seeds.len();
    let mut threads = Vec::with_capacity(seed_count);
    for (index, seed) in seeds.into_iter().enumerate() {
        let resolved = resolve_thread(seed, |id| lookup.get(id), options.resolve);
        threads.push(build_thread_view(mode.heading(index + 1), &resolved));
    }

    let stats = CycleStats {
        seeds: seed_count,
        store_lookups: lookup.store_lookups(),
        cache_hits: lookup.cache_hits(),
    };
    tracing::info!(
        threads = threads.len(),
        store_lookups = stats.store_lookups,
        cache_hits = stats.cache_hits,
        "render cycle finished"
    );

    Ok(RenderOutput { title: mode.title(), mode: mode.clone(), threads, stats })
}

/// Resolve and render the thread ending at one known post.
///
/// # Errors
/// [`ThreadError::NotFound`] when `id` is absent, otherwise the lookup error.
pub fn render_single<S: PostSource>(
    source: &S,
    id: &str,
    options: RenderOptions,
) -> Result<ThreadView, ThreadError> {
    let seed = source.get_by_id(id)?.ok_or_else(|| ThreadError::NotFound(id.to_string()))?;
    let resolved = resolve_thread(seed, |parent| source.get_by_id(parent), options.resolve);
    Ok(build_thread_view(format!("Tweet {id}"), &resolved))
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::fixtures::document;
    use crate::{AuthorHandle, Limit, ThreadStop};

    #[derive(Default)]
    struct MemorySource {
        posts: Vec<Post>,
        lookups: RefCell<Vec<String>>,
        fail_scans: Cell<bool>,
    }

    impl MemorySource {
        fn with(entries: &[(&str, &str, Option<&str>)]) -> Self {
            let posts = entries
                .iter()
                .map(|(id, created_at, parent)| {
                    match Post::from_document(document(id, created_at, *parent)) {
                        Ok(post) => post,
                        Err(err) => panic!("fixture {id} should parse: {err}"),
                    }
                })
                .collect();
            Self { posts, ..Self::default() }
        }

        fn newest(&self, limit: Limit, filter: impl Fn(&Post) -> bool) -> Vec<Post> {
            let mut selected = self.posts.iter().filter(|post| filter(post)).cloned().collect::<Vec<_>>();
            selected.sort_by(|lhs, rhs| {
                rhs.created_at.cmp(&lhs.created_at).then_with(|| lhs.id.cmp(&rhs.id))
            });
            selected.truncate(limit.get() as usize);
            selected
        }
    }

    impl PostSource for MemorySource {
        fn get_by_id(&self, id: &str) -> Result<Option<Post>, ThreadError> {
            self.lookups.borrow_mut().push(id.to_string());
            Ok(self.posts.iter().find(|post| post.id == id).cloned())
        }

        fn latest(&self, limit: Limit) -> Result<Vec<Post>, ThreadError> {
            if self.fail_scans.get() {
                return Err(ThreadError::Connectivity("store unreachable".to_string()));
            }
            Ok(self.newest(limit, |_| true))
        }

        fn latest_by_author(
            &self,
            handle: &AuthorHandle,
            limit: Limit,
        ) -> Result<Vec<Post>, ThreadError> {
            Ok(self.newest(limit, |post| post.author.username.as_deref() == Some(handle.as_str())))
        }
    }

    fn conversation() -> MemorySource {
        MemorySource::with(&[
            ("root", "2024-01-01T10:00:00.000Z", None),
            ("mid", "2024-01-01T11:00:00.000Z", Some("root")),
            ("left", "2024-01-01T12:00:00.000Z", Some("mid")),
            ("right", "2024-01-01T12:00:00.000Z", Some("mid")),
            ("orphan", "2024-01-01T09:00:00.000Z", Some("deleted")),
        ])
    }

    #[test]
    fn latest_mode_expands_every_seed_in_order() -> Result<(), ThreadError> {
        let source = conversation();
        let mode = SelectionMode::Latest { limit: Limit::new(5)? };
        let output = render_cycle(&source, &mode, RenderOptions::default())?;

        assert_eq!(output.title, "All Tweet Threads");
        let shapes = output
            .threads
            .iter()
            .map(|thread| {
                (
                    thread.heading.as_str(),
                    thread.posts.iter().map(|post| post.id.as_str()).collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            shapes,
            vec![
                ("Tweet Thread 1", vec!["root", "mid", "left"]),
                ("Tweet Thread 2", vec!["root", "mid", "right"]),
                ("Tweet Thread 3", vec!["root", "mid"]),
                ("Tweet Thread 4", vec!["root"]),
                ("Tweet Thread 5", vec!["orphan"]),
            ]
        );
        assert_eq!(output.threads[4].stop, ThreadStop::MissingAncestor { id: "deleted".to_string() });
        Ok(())
    }

    #[test]
    fn shared_ancestors_are_fetched_once_per_cycle() -> Result<(), ThreadError> {
        let source = conversation();
        let mode = SelectionMode::Latest { limit: Limit::new(2)? };
        let output = render_cycle(&source, &mode, RenderOptions::default())?;

        assert_eq!(*source.lookups.borrow(), vec!["mid".to_string(), "root".to_string()]);
        assert_eq!(output.stats, CycleStats { seeds: 2, store_lookups: 2, cache_hits: 2 });
        Ok(())
    }

    #[test]
    fn seeds_prime_the_cache() -> Result<(), ThreadError> {
        let source = conversation();
        let mode = SelectionMode::Latest { limit: Limit::new(4)? };
        render_cycle(&source, &mode, RenderOptions::default())?;

        assert!(source.lookups.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn cache_does_not_outlive_a_cycle() -> Result<(), ThreadError> {
        let source = conversation();
        let mode = SelectionMode::Latest { limit: Limit::new(1)? };
        render_cycle(&source, &mode, RenderOptions::default())?;
        render_cycle(&source, &mode, RenderOptions::default())?;

        assert_eq!(source.lookups.borrow().len(), 4);
        Ok(())
    }

    #[test]
    fn author_mode_filters_and_titles() -> Result<(), ThreadError> {
        let source = conversation();
        let mode = SelectionMode::Author { handle: AuthorHandle::parse("@user_mid")?, limit: Limit::default() };
        let output = render_cycle(&source, &mode, RenderOptions::default())?;

        assert_eq!(output.title, "Last 10 Tweets by @user_mid");
        assert_eq!(output.threads.len(), 1);
        assert_eq!(output.threads[0].heading, "Tweet 1");
        assert_eq!(output.threads[0].posts.len(), 2);
        Ok(())
    }

    #[test]
    fn seed_scan_failure_is_fatal() -> Result<(), ThreadError> {
        let source = conversation();
        source.fail_scans.set(true);
        let mode = SelectionMode::Latest { limit: Limit::default() };

        assert!(matches!(
            render_cycle(&source, &mode, RenderOptions::default()),
            Err(ThreadError::Connectivity(_))
        ));
        Ok(())
    }

    #[test]
    fn single_thread_render_and_missing_seed() -> Result<(), ThreadError> {
        let source = conversation();
        let view = render_single(&source, "left", RenderOptions::default())?;

        assert_eq!(view.heading, "Tweet left");
        assert_eq!(view.posts.iter().map(|post| post.id.as_str()).collect::<Vec<_>>(), vec!["root", "mid", "left"]);
        assert!(matches!(
            render_single(&source, "nope", RenderOptions::default()),
            Err(ThreadError::NotFound(id)) if id == "nope"
        ));
        Ok(())
    }
}
