//! Typed post templates
//!
//! A template is parsed once into literal segments and placeholder slots.
//! Rendering fills each slot from a per-topic phrase table, or from the
//! placeholder's generic default when the topic has no entry. Templates that
//! name an unknown placeholder are rejected when the set is built, so raw
//! `{...}` text never reaches a post.

use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),
}

/// Slot kinds a template may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Topic,
    FunnyObservation,
    RelatableSituation,
    WittyInsight,
    FunnyRealization,
    RelatableProblem,
    TechnicalObservation,
    FunnyBehavior,
    TechnicalComparison,
}

impl Placeholder {
    pub const ALL: [Placeholder; 9] = [
        Placeholder::Topic,
        Placeholder::FunnyObservation,
        Placeholder::RelatableSituation,
        Placeholder::WittyInsight,
        Placeholder::FunnyRealization,
        Placeholder::RelatableProblem,
        Placeholder::TechnicalObservation,
        Placeholder::FunnyBehavior,
        Placeholder::TechnicalComparison,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Topic => "topic",
            Placeholder::FunnyObservation => "funny_observation",
            Placeholder::RelatableSituation => "relatable_situation",
            Placeholder::WittyInsight => "witty_insight",
            Placeholder::FunnyRealization => "funny_realization",
            Placeholder::RelatableProblem => "relatable_problem",
            Placeholder::TechnicalObservation => "technical_observation",
            Placeholder::FunnyBehavior => "funny_behavior",
            Placeholder::TechnicalComparison => "technical_comparison",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Phrase used when the topic has no table entry
    pub fn default_phrase(&self) -> &'static str {
        match self {
            Placeholder::Topic => "tech",
            Placeholder::FunnyObservation => "surprisingly complex",
            Placeholder::RelatableSituation => "reality hits hard",
            Placeholder::WittyInsight => "life is what happens while you're making other plans",
            Placeholder::FunnyRealization => "we're all just winging it",
            Placeholder::RelatableProblem => "things don't go as planned",
            Placeholder::TechnicalObservation => "behaves unexpectedly",
            Placeholder::FunnyBehavior => "does weird things",
            Placeholder::TechnicalComparison => "more advanced than expected",
        }
    }

    fn table(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Placeholder::Topic => &[],
            Placeholder::FunnyObservation => OBSERVATIONS,
            Placeholder::RelatableSituation => SITUATIONS,
            Placeholder::WittyInsight => INSIGHTS,
            Placeholder::FunnyRealization => REALIZATIONS,
            Placeholder::RelatableProblem => PROBLEMS,
            Placeholder::TechnicalObservation => TECHNICAL_OBSERVATIONS,
            Placeholder::FunnyBehavior => FUNNY_BEHAVIORS,
            Placeholder::TechnicalComparison => TECHNICAL_COMPARISONS,
        }
    }

    /// The substitution for this slot under `topic`
    pub fn resolve<'a>(&self, topic: &'a str) -> &'a str {
        if *self == Placeholder::Topic {
            return topic;
        }
        self.table()
            .iter()
            .find(|(t, _)| *t == topic)
            .map(|(_, phrase)| *phrase)
            .unwrap_or_else(|| self.default_phrase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Placeholder),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or(TemplateError::Unclosed(offset + open))?;
            let name = &after[..close];
            let slot = Placeholder::from_name(name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
            segments.push(Segment::Slot(slot));

            let consumed = open + 1 + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, topic: &str) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Slot(slot) => slot.resolve(topic),
            })
            .collect()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }
}

/// The validated set of templates generation draws from
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Vec<Template>,
}

impl TemplateSet {
    /// Parse `sources`, dropping (and logging) any that fail validation
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a str>) -> Self {
        let templates = sources
            .into_iter()
            .filter_map(|source| match Template::parse(source) {
                Ok(template) => Some(template),
                Err(e) => {
                    warn!("Skipping template {:?}: {}", source, e);
                    None
                }
            })
            .collect();
        Self { templates }
    }

    pub fn builtin() -> Self {
        Self::from_sources(BUILTIN_TEMPLATES.iter().copied())
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Hashtags for a topic, `[#<topic>, #Tech, #AI]` when it has no entry
pub fn hashtags_for(topic: &str) -> Vec<String> {
    HASHTAGS
        .iter()
        .find(|(t, _)| *t == topic)
        .map(|(_, tags)| tags.iter().map(|t| t.to_string()).collect())
        .unwrap_or_else(|| vec![format!("#{}", topic), "#Tech".to_string(), "#AI".to_string()])
}

const BUILTIN_TEMPLATES: &[&str] = &[
    "Just discovered that {topic} is actually {funny_observation}. Mind = blown 🤯",
    "The real {topic} problem is {relatable_situation}. Can anyone else relate? 😅",
    "Today's {topic} lesson: {witty_insight}. Life is full of surprises! ✨",
    "Plot twist: {topic} is not what we thought. {funny_realization} 😂",
    "The {topic} struggle is real when {relatable_problem}. Anyone else? 🙋‍♂️",
    "When your {topic} model {technical_observation} 📊",
    "The {topic} algorithm that {funny_behavior} 🧠",
    "My {topic} implementation is {technical_comparison} 📈",
];

const OBSERVATIONS: &[(&str, &str)] = &[
    ("AI", "more complex than my dating algorithm"),
    ("MachineLearning", "converging faster than my career goals"),
    ("QuantFinance", "generating more alpha than my social skills"),
    ("Trading", "more volatile than my attention span"),
    ("DataScience", "preprocessing more data than my life decisions"),
    ("DeepLearning", "deeper than my understanding of taxes"),
    ("Quantitative", "more quantitative than my dating prospects"),
    ("Programming", "debugging more bugs than my life choices"),
];

const SITUATIONS: &[(&str, &str)] = &[
    ("AI", "your neural network overfits more than your dating profile"),
    ("MachineLearning", "your model predicts market crashes better than your life"),
    ("QuantFinance", "your Sharpe ratio is higher than your social skills"),
    ("Trading", "your backtest results are more impressive than your LinkedIn"),
    ("DataScience", "your feature engineering is better than your cooking"),
    ("DeepLearning", "your gradient descent is smoother than your dating life"),
    ("Quantitative", "your risk management is better than your life management"),
    ("Programming", "your code is more efficient than your morning routine"),
];

const INSIGHTS: &[(&str, &str)] = &[
    ("AI", "sometimes the best feature is the off button"),
    ("MachineLearning", "the best models are the ones you never deploy"),
    ("QuantFinance", "the real alpha is in the data preprocessing"),
    ("Trading", "the market is efficient, but your code is not"),
    ("DataScience", "feature importance reveals more than therapy"),
    ("DeepLearning", "neural networks are just fancy regression"),
    ("Quantitative", "cross-validation prevents overfitting your heart"),
    ("Programming", "the best code is the code you don't write"),
];

const REALIZATIONS: &[(&str, &str)] = &[
    ("AI", "we're all just training on biased data"),
    ("MachineLearning", "your model is only as good as your data"),
    ("QuantFinance", "the market is more random than your code"),
    ("Trading", "your strategy works until it doesn't"),
    ("DataScience", "correlation doesn't imply causation, but it's fun to pretend"),
    ("DeepLearning", "deep learning is just statistics with better marketing"),
    ("Quantitative", "quantitative finance is just applied statistics"),
    ("Programming", "programming is just debugging with extra steps"),
];

const PROBLEMS: &[(&str, &str)] = &[
    ("AI", "your model works in production but not in your life"),
    ("MachineLearning", "your predictions are better than your life choices"),
    ("QuantFinance", "your portfolio outperforms your dating life"),
    ("Trading", "your algorithm trades better than you date"),
    ("DataScience", "your data pipeline is cleaner than your room"),
    ("DeepLearning", "your neural network learns faster than you do"),
    ("Quantitative", "your models are more sophisticated than your conversations"),
    ("Programming", "your code is more organized than your thoughts"),
];

const TECHNICAL_OBSERVATIONS: &[(&str, &str)] = &[
    ("AI", "converges faster than my dating algorithm"),
    ("MachineLearning", "overfits more than my dating profile"),
    ("QuantFinance", "generates more alpha than my social skills"),
    ("Trading", "backtests better than my life decisions"),
    ("DataScience", "preprocesses data better than my life"),
    ("DeepLearning", "learns patterns faster than I learn from mistakes"),
    ("Quantitative", "calculates risk better than I assess situations"),
    ("Programming", "debugs faster than I solve problems"),
];

const FUNNY_BEHAVIORS: &[(&str, &str)] = &[
    ("AI", "hallucinates more than my dating stories"),
    ("MachineLearning", "overfits more than my dating profile"),
    ("QuantFinance", "generates more alpha than my social skills"),
    ("Trading", "trades more than I date"),
    ("DataScience", "cleans data better than I clean my room"),
    ("DeepLearning", "learns deeper than my understanding of taxes"),
    ("Quantitative", "calculates more than I think"),
    ("Programming", "loops more than my dating conversations"),
];

const TECHNICAL_COMPARISONS: &[(&str, &str)] = &[
    ("AI", "more sophisticated than my dating algorithm"),
    ("MachineLearning", "more accurate than my life predictions"),
    ("QuantFinance", "more profitable than my dating life"),
    ("Trading", "more successful than my relationships"),
    ("DataScience", "more organized than my thoughts"),
    ("DeepLearning", "deeper than my understanding of relationships"),
    ("Quantitative", "more precise than my life calculations"),
    ("Programming", "more logical than my decision making"),
];

const HASHTAGS: &[(&str, &[&str])] = &[
    ("AI", &["#AI", "#MachineLearning", "#Tech"]),
    ("MachineLearning", &["#ML", "#DataScience", "#AI"]),
    ("QuantFinance", &["#QuantFinance", "#Trading", "#Finance"]),
    ("Trading", &["#Trading", "#Quantitative", "#Finance"]),
    ("DataScience", &["#DataScience", "#ML", "#Analytics"]),
    ("DeepLearning", &["#DeepLearning", "#AI", "#NeuralNetworks"]),
    ("Quantitative", &["#Quantitative", "#Finance", "#Trading"]),
    ("Programming", &["#Programming", "#Tech", "#Coding"]),
];
