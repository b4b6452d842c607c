//! Core types for Chirpcast

use serde::{Deserialize, Serialize};

/// History entries kept on disk
pub const HISTORY_CAP: usize = 100;

/// History entries consulted when filtering out recent repeats
pub const RECENT_WINDOW: usize = 50;

/// A record of one successful publish
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRecord {
    pub text: String,
    /// Platform-assigned post id
    pub id: String,
    /// RFC 3339 timestamp of the publish
    pub timestamp: String,
}

impl PostRecord {
    pub fn new(text: String, id: String) -> Self {
        Self {
            text,
            id,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Capped log of posted records, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryLog {
    pub posted: Vec<PostRecord>,
}

impl HistoryLog {
    /// Append a record, evicting the oldest entries beyond [`HISTORY_CAP`]
    pub fn push(&mut self, record: PostRecord) {
        self.posted.push(record);
        if self.posted.len() > HISTORY_CAP {
            let excess = self.posted.len() - HISTORY_CAP;
            self.posted.drain(..excess);
        }
    }

    /// Texts of the most recent `window` records
    pub fn recent_texts(&self, window: usize) -> Vec<&str> {
        let start = self.posted.len().saturating_sub(window);
        self.posted[start..].iter().map(|r| r.text.as_str()).collect()
    }

    pub fn last(&self) -> Option<&PostRecord> {
        self.posted.last()
    }

    pub fn len(&self) -> usize {
        self.posted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posted.is_empty()
    }
}

/// A daily posting slot, informational to the core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSlot {
    /// Local time as "HH:MM"
    pub time: String,
    pub timezone: String,
}

/// Pre-written posts plus the informational schedule list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentLibrary {
    pub tweets: Vec<String>,
    #[serde(default)]
    pub schedules: Vec<ScheduleSlot>,
}

impl ContentLibrary {
    /// Append a text unless the library already holds it
    ///
    /// Returns `false` when the text was already present.
    pub fn add(&mut self, text: String) -> bool {
        if self.tweets.iter().any(|t| *t == text) {
            return false;
        }
        self.tweets.push(text);
        true
    }

    /// The library seeded on first start
    pub fn starter() -> Self {
        let tweets = [
            "Just implemented a custom loss function that's more complex than my dating life 📊 #MachineLearning #QuantFinance",
            "When your neural network converges faster than your career goals 🧠 #AI #DeepLearning",
            "The real alpha isn't in the market, it's in the data preprocessing pipeline 📈 #QuantTrading #DataScience",
            "My portfolio's Sharpe ratio is higher than my social skills 📊 #Finance #Quantitative",
            "Backtesting: where hindsight bias meets overfitting anxiety 📉 #Trading #MachineLearning",
            "Feature engineering is like cooking - the right ingredients make all the difference 🍳 #ML #DataScience",
            "When your model predicts market crashes better than it predicts my life decisions 📊 #QuantFinance #AI",
            "The only thing more volatile than crypto is my attention span during meetings 📈 #Trading #Tech",
            "Gradient descent: the algorithm that descends faster than my motivation on Mondays 📉 #DeepLearning #ML",
            "Cross-validation is like dating multiple people to avoid overfitting your heart 💔 #MachineLearning #Humor",
            "My risk management is better than my life management 📊 #QuantTrading #Finance",
            "When your ensemble model is more diverse than your friend group 🤖 #AI #MachineLearning",
            "The market is efficient, but my code is not 🐛 #QuantFinance #Programming",
            "Feature importance: where SHAP values reveal more than therapy sessions 📊 #ML #DataScience",
            "My backtest results are more impressive than my LinkedIn profile 📈 #Quantitative #Trading",
        ];

        let schedules = ["09:00", "14:30", "19:00"]
            .into_iter()
            .map(|time| ScheduleSlot {
                time: time.to_string(),
                timezone: "America/New_York".to_string(),
            })
            .collect();

        Self {
            tweets: tweets.into_iter().map(String::from).collect(),
            schedules,
        }
    }
}

/// Settings for templated post generation
///
/// Read from the store before every generation attempt so edits apply to the
/// next cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub enabled: bool,
    #[serde(default = "default_service")]
    pub service: String,
    /// Free-form hint for an external generator; not used by the templates
    #[serde(rename = "prompt", default)]
    pub prompt_hint: String,
    pub max_length: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    pub include_hashtags: bool,
    pub hashtag_count: usize,
    pub topics: Vec<String>,
    #[serde(default)]
    pub style: String,
}

fn default_service() -> String {
    "openai".to_string()
}

fn default_temperature() -> f64 {
    0.8
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service: default_service(),
            prompt_hint: "Generate a witty, technical tweet about AI, machine learning, quantitative finance, or trading. Make it humorous but sophisticated, targeting AI/ML/Quant professionals. Include technical terms like 'neural networks', 'backtesting', 'Sharpe ratio', 'feature engineering', 'gradient descent', etc. Keep it under 280 characters and include relevant emojis and hashtags.".to_string(),
            max_length: 280,
            temperature: default_temperature(),
            include_hashtags: true,
            hashtag_count: 3,
            topics: [
                "AI",
                "MachineLearning",
                "QuantFinance",
                "Trading",
                "DataScience",
                "DeepLearning",
                "Quantitative",
                "Programming",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            style: "technical, witty, and sophisticated".to_string(),
        }
    }
}

/// Snapshot reported by the `stats` command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BotStats {
    pub total_tweets: usize,
    pub posted_tweets: usize,
    pub last_posted: Option<PostRecord>,
    pub scheduled_times: Vec<ScheduleSlot>,
    pub ai_enabled: bool,
}

/// Supported image MIME types for media uploads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Detect the image type from its leading bytes, defaulting to JPEG
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            [0x89, b'P', b'N', b'G', ..] => Self::Png,
            [b'G', b'I', b'F', b'8', ..] => Self::Gif,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Self::WebP,
            _ => Self::Jpeg,
        }
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Get the typical file extension for this MIME type
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
