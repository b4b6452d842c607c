//! Post content selection
//!
//! [`ContentProvider::select_content`] walks an ordered list of strategies and
//! returns the first non-empty text. Templated generation runs only when the
//! stored generation config enables it; the library pick avoids anything
//! posted in the recent history window. When both produce nothing the fixed
//! apology text is returned, so a caller always gets something to post.

pub mod templates;

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::Store;
use crate::types::{GenerationConfig, HistoryLog, RECENT_WINDOW};
use templates::{hashtags_for, TemplateSet};

pub use templates::{Placeholder, Template, TemplateError};

/// Returned when no strategy yields content
pub const FALLBACK_TEXT: &str = "Something went wrong, but I'm still here! 🤖";

/// Content sources in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Templated,
    Library,
}

impl Strategy {
    pub const ORDER: [Strategy; 2] = [Strategy::Templated, Strategy::Library];
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Templated => write!(f, "templated"),
            Strategy::Library => write!(f, "library"),
        }
    }
}

pub struct ContentProvider {
    store: Arc<Store>,
    templates: TemplateSet,
    rng: Mutex<StdRng>,
}

impl ContentProvider {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Deterministic provider for tests
    pub fn with_seed(store: Arc<Store>, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<Store>, rng: StdRng) -> Self {
        Self {
            store,
            templates: TemplateSet::builtin(),
            rng: Mutex::new(rng),
        }
    }

    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    /// Text for the next post; never fails
    pub async fn select_content(&self) -> String {
        for strategy in Strategy::ORDER {
            let text = match strategy {
                Strategy::Templated => self.generate().await,
                Strategy::Library => self.pick_from_library().await,
            };
            match text {
                Some(text) if !text.trim().is_empty() => {
                    debug!(strategy = %strategy, "Selected content");
                    return text;
                }
                _ => debug!(strategy = %strategy, "Strategy produced nothing"),
            }
        }

        warn!("No content available, using fallback text");
        FALLBACK_TEXT.to_string()
    }

    /// Templated generation under the current stored config
    ///
    /// `None` when generation is disabled, the config cannot be read, or the
    /// config leaves nothing to generate from.
    pub async fn generate(&self) -> Option<String> {
        let config = match self.store.generation_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!("Could not read generation config: {}", e);
                return None;
            }
        };
        if !config.enabled {
            return None;
        }

        let mut rng = self.rng.lock().ok()?;
        generate_templated(&config, &self.templates, &mut *rng)
    }

    /// A library entry not among the recent posts
    ///
    /// Falls back to the whole library once every entry was posted recently.
    pub async fn pick_from_library(&self) -> Option<String> {
        let library = match self.store.library().await {
            Ok(library) => library,
            Err(e) => {
                warn!("Could not read content library: {}", e);
                return None;
            }
        };
        let history = match self.store.history().await {
            Ok(history) => history,
            Err(StoreError::NotFound(_)) => HistoryLog::default(),
            Err(e) => {
                warn!("Could not read history, not filtering repeats: {}", e);
                HistoryLog::default()
            }
        };

        let mut rng = self.rng.lock().ok()?;
        pick_unposted(&library.tweets, &history, &mut *rng).map(String::from)
    }
}

/// Fill a random template for a random topic, append hashtags, and fit the
/// result into `config.max_length` characters
pub fn generate_templated<R: Rng + ?Sized>(
    config: &GenerationConfig,
    templates: &TemplateSet,
    rng: &mut R,
) -> Option<String> {
    let topic = config.topics.choose(rng)?;
    let template = templates.templates().choose(rng)?;

    let mut text = template.render(topic);
    if config.include_hashtags && config.hashtag_count > 0 {
        let tags: Vec<String> = hashtags_for(topic)
            .into_iter()
            .take(config.hashtag_count)
            .collect();
        if !tags.is_empty() {
            text.push(' ');
            text.push_str(&tags.join(" "));
        }
    }

    Some(truncate_with_ellipsis(&text, config.max_length))
}

/// Choose uniformly among library entries absent from the recent history
pub fn pick_unposted<'a, R: Rng + ?Sized>(
    library: &'a [String],
    history: &HistoryLog,
    rng: &mut R,
) -> Option<&'a str> {
    let recent = history.recent_texts(RECENT_WINDOW);
    let fresh: Vec<&String> = library
        .iter()
        .filter(|t| !recent.contains(&t.as_str()))
        .collect();

    if fresh.is_empty() {
        debug!("Every library entry posted recently, picking from the full library");
        return library.choose(rng).map(String::as_str);
    }
    fresh.choose(rng).map(|t| t.as_str())
}

/// Cut `text` to at most `max` characters, marking the cut with "..."
///
/// Text that already fits is returned unchanged. Limits below the marker
/// width keep the first `max` characters.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max < 3 {
        return text.chars().take(max).collect();
    }
    let mut cut: String = text.chars().take(max - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentLibrary, PostRecord};
    use crate::store::{CONTENT_KEY, GENERATION_KEY};

    fn library(texts: &[&str]) -> ContentLibrary {
        ContentLibrary {
            tweets: texts.iter().map(|t| t.to_string()).collect(),
            schedules: Vec::new(),
        }
    }

    fn disabled() -> GenerationConfig {
        GenerationConfig {
            enabled: false,
            ..GenerationConfig::default()
        }
    }

    async fn provider(texts: &[&str], posted: &[&str], config: GenerationConfig) -> ContentProvider {
        let store = Arc::new(Store::in_memory());
        store.save(CONTENT_KEY, &library(texts)).await.unwrap();
        store.save(GENERATION_KEY, &config).await.unwrap();
        for text in posted {
            store
                .append_history(PostRecord::new(text.to_string(), "1".to_string()))
                .await
                .unwrap();
        }
        ContentProvider::with_seed(store, 7)
    }

    #[tokio::test]
    async fn test_library_skips_recent_posts() {
        let provider = provider(&["A", "B"], &["A"], disabled()).await;
        for _ in 0..20 {
            assert_eq!(provider.select_content().await, "B");
        }
    }

    #[tokio::test]
    async fn test_exhausted_library_falls_back_to_full_library() {
        let provider = provider(&["A", "B"], &["A", "B"], disabled()).await;
        let text = provider.select_content().await;
        assert!(text == "A" || text == "B");
    }

    #[tokio::test]
    async fn test_only_recent_window_is_filtered() {
        let mut posted = vec!["old"];
        let filler: Vec<String> = (0..RECENT_WINDOW).map(|n| format!("filler {}", n)).collect();
        posted.extend(filler.iter().map(String::as_str));

        let provider = provider(&["old"], &posted, disabled()).await;
        // "old" fell out of the recent window and is eligible again
        assert_eq!(provider.pick_from_library().await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_empty_library_and_disabled_generation_uses_fallback() {
        let provider = provider(&[], &[], disabled()).await;
        assert_eq!(provider.select_content().await, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn test_missing_documents_use_fallback() {
        let provider = ContentProvider::with_seed(Arc::new(Store::in_memory()), 1);
        assert_eq!(provider.select_content().await, FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn test_enabled_generation_wins_over_library() {
        let provider = provider(&["library text"], &[], GenerationConfig::default()).await;
        let text = provider.select_content().await;
        assert_ne!(text, "library text");
        assert!(text.chars().count() <= 280);
    }

    #[tokio::test]
    async fn test_generation_without_topics_falls_through() {
        let config = GenerationConfig {
            topics: Vec::new(),
            ..GenerationConfig::default()
        };
        let provider = provider(&["library text"], &[], config).await;
        assert_eq!(provider.select_content().await, "library text");
    }

    #[tokio::test]
    async fn test_generation_without_templates_falls_through() {
        let provider = provider(&["library text"], &[], GenerationConfig::default())
            .await
            .with_templates(TemplateSet::default());
        assert_eq!(provider.select_content().await, "library text");
    }

    #[test]
    fn test_generated_text_respects_max_length() {
        let templates = TemplateSet::builtin();
        let mut rng = StdRng::seed_from_u64(42);
        for max_length in [20, 60, 280] {
            let config = GenerationConfig {
                max_length,
                ..GenerationConfig::default()
            };
            for _ in 0..50 {
                let text = generate_templated(&config, &templates, &mut rng).unwrap();
                let len = text.chars().count();
                assert!(len <= max_length, "{} > {}: {}", len, max_length, text);
                assert!(!text.contains('{'), "{}", text);
                if max_length == 20 {
                    assert!(text.ends_with("..."));
                    assert_eq!(len, 20);
                }
            }
        }
    }

    #[test]
    fn test_hashtags_follow_count() {
        let templates = TemplateSet::from_sources(["{topic} post"]);
        let mut rng = StdRng::seed_from_u64(3);
        let config = GenerationConfig {
            topics: vec!["Programming".to_string()],
            hashtag_count: 2,
            ..GenerationConfig::default()
        };
        assert_eq!(
            generate_templated(&config, &templates, &mut rng).unwrap(),
            "Programming post #Programming #Tech"
        );

        let config = GenerationConfig {
            include_hashtags: false,
            ..config
        };
        assert_eq!(
            generate_templated(&config, &templates, &mut rng).unwrap(),
            "Programming post"
        );
    }

    #[test]
    fn test_generation_empty_inputs() {
        let mut rng = StdRng::seed_from_u64(0);
        let no_topics = GenerationConfig {
            topics: Vec::new(),
            ..GenerationConfig::default()
        };
        assert!(generate_templated(&no_topics, &TemplateSet::builtin(), &mut rng).is_none());
        assert!(
            generate_templated(&GenerationConfig::default(), &TemplateSet::default(), &mut rng)
                .is_none()
        );
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_with_ellipsis("hello world", 8), "hello...");
        assert_eq!(truncate_with_ellipsis("hello", 2), "he");
        assert_eq!(truncate_with_ellipsis("hello", 3), "...");
        assert_eq!(truncate_with_ellipsis("", 0), "");

        let long = "x".repeat(300);
        let cut = truncate_with_ellipsis(&long, 280);
        assert_eq!(cut.chars().count(), 280);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_truncate_counts_characters() {
        let emoji = "🤖".repeat(10);
        let cut = truncate_with_ellipsis(&emoji, 5);
        assert_eq!(cut, "🤖🤖...");
    }
}
