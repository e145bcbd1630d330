//! Candidate scorer
//!
//! Deterministic, pure scoring of one search candidate against a query.
//! Every adjustment is appended to a [`ScoreTrace`] so a ranking can be
//! explained after the fact; the trace never feeds back into scoring.
//!
//! # Evaluation order
//! 1. Clean title (ASCII only, no punctuation, lower case)
//! 2. "official" bonus, word removed from the working title
//! 3. "music" bonus, word removed from the working title
//! 4. Damped text similarity between query and working title
//! 5. In-order word overlap bonus
//! 6. Per-occurrence keyword penalties
//! 7. Per-occurrence penalties skipped when the query asks for the same thing
//! 8. One-time keyword bonuses
//! 9. Channel name bonus, matched against the full cleaned title
//! 10. Duration window bonus / implausible duration penalty
//! 11. "behind the scenes" penalty
//! 12. View count bonuses
//! 13. Publication age bonus
//! 14. `<song> - <artist> (official ...)` title format bonus
//! 15. Upper clamp
//!
//! Keyword families (steps 6-8) are a table of [`KeywordRule`]s evaluated by
//! one loop.

use crate::error::{AcquireError, AcquireResult};
use crate::models::CandidateRecord;
use crate::services::normalizer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tunegrab_common::config::ScoringConfig;

/// Upper bound of every returned score
pub const MAX_SCORE: f64 = 100.0;

static OFFICIAL_RE: Lazy<Regex> = Lazy::new(|| whole_word_pattern(&["official"]));
static MUSIC_RE: Lazy<Regex> = Lazy::new(|| whole_word_pattern(&["music"]));
static BEHIND_THE_SCENES_RE: Lazy<Regex> =
    Lazy::new(|| whole_word_pattern(&["behind the scenes"]));

/// `<song> - <artist> (<tag containing "official">)`, 1-6 word song, 0-2 word artist
static TITLE_FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\w+(?:\s+\w+){0,5}\s*-\s*(?:\w+(?:\s+\w+)?)?\s*\([^)]*official[^)]*\)\s*$")
        .expect("valid title format regex")
});

static FAMILY_PATTERNS: Lazy<HashMap<KeywordFamily, Regex>> = Lazy::new(|| {
    KeywordFamily::ALL
        .into_iter()
        .map(|family| (family, whole_word_pattern(family.terms())))
        .collect()
});

fn whole_word_pattern(terms: &[&str]) -> Regex {
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("valid keyword regex")
}

// ============================================================================
// Keyword table
// ============================================================================

/// Keyword family scanned in the working title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeywordFamily {
    Performance,
    Reaction,
    Slowed,
    Album,
    Cover,
    Live,
    Lyrics,
    Uncensored,
}

impl KeywordFamily {
    pub const ALL: [KeywordFamily; 8] = [
        KeywordFamily::Performance,
        KeywordFamily::Reaction,
        KeywordFamily::Slowed,
        KeywordFamily::Album,
        KeywordFamily::Cover,
        KeywordFamily::Live,
        KeywordFamily::Lyrics,
        KeywordFamily::Uncensored,
    ];

    pub fn terms(self) -> &'static [&'static str] {
        match self {
            KeywordFamily::Performance => &["performance", "instrumental", "karaoke"],
            KeywordFamily::Reaction => &["reaction", "reacts", "reacting", "analysis", "review", "breakdown"],
            KeywordFamily::Slowed => &["slowed", "reverb", "sped up", "nightcore"],
            KeywordFamily::Album => &["album", "ep"],
            KeywordFamily::Cover => &["cover", "covers", "rendition", "remake", "tribute"],
            KeywordFamily::Live => &["live", "concert", "session", "sessions", "tour"],
            KeywordFamily::Lyrics => &["lyrics", "lyric"],
            KeywordFamily::Uncensored => &["uncensored", "explicit"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KeywordFamily::Performance => "performance",
            KeywordFamily::Reaction => "reaction",
            KeywordFamily::Slowed => "slowed",
            KeywordFamily::Album => "album",
            KeywordFamily::Cover => "cover",
            KeywordFamily::Live => "live",
            KeywordFamily::Lyrics => "lyrics",
            KeywordFamily::Uncensored => "uncensored",
        }
    }

    /// Whole-word, case-insensitive occurrence count
    pub fn count_in(self, text: &str) -> usize {
        FAMILY_PATTERNS
            .get(&self)
            .map(|re| re.find_iter(text).count())
            .unwrap_or(0)
    }
}

/// One row of the keyword table
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRule {
    pub family: KeywordFamily,
    /// Signed adjustment applied per match (or once)
    pub magnitude: f64,
    pub per_occurrence: bool,
    /// Skip the rule when the query itself contains the family
    pub requires_absent_from_query: bool,
}

// ============================================================================
// Weights
// ============================================================================

/// Inclusive duration window in seconds; `min <= max` is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationWindow {
    min_secs: u64,
    max_secs: u64,
}

impl DurationWindow {
    pub fn new(min_secs: u64, max_secs: u64) -> AcquireResult<Self> {
        if min_secs > max_secs {
            return Err(AcquireError::MalformedInput(format!(
                "duration window lower bound {}s exceeds upper bound {}s",
                min_secs, max_secs
            )));
        }
        Ok(Self { min_secs, max_secs })
    }

    pub fn min_secs(&self) -> u64 {
        self.min_secs
    }

    pub fn max_secs(&self) -> u64 {
        self.max_secs
    }

    pub fn contains(&self, secs: u64) -> bool {
        self.min_secs <= secs && secs <= self.max_secs
    }
}

/// Scorer magnitudes and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub official_bonus: f64,
    pub music_bonus: f64,
    pub similarity_damping: f64,
    pub word_order_bonus: f64,
    pub performance_penalty: f64,
    pub reaction_penalty: f64,
    pub slowed_penalty: f64,
    pub album_penalty: f64,
    pub cover_penalty: f64,
    pub live_penalty: f64,
    pub lyrics_bonus: f64,
    pub uncensored_bonus: f64,
    pub channel_bonus: f64,
    pub duration_bonus: f64,
    pub preferred_duration: DurationWindow,
    pub implausible_penalty: f64,
    /// Durations outside this window get `implausible_penalty`
    pub plausible_duration: DurationWindow,
    pub view_threshold: u64,
    pub view_bonus: f64,
    pub per_10000_views: f64,
    pub max_view_volume_bonus: f64,
    pub per_year_bonus: f64,
    pub title_format_bonus: f64,
    /// Selector only picks candidates scoring strictly above this
    pub min_viable_score: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            official_bonus: 10.0,
            music_bonus: 5.0,
            similarity_damping: 0.9,
            word_order_bonus: 1.0,
            performance_penalty: -10.0,
            reaction_penalty: -100.0,
            slowed_penalty: -10.0,
            album_penalty: -10.0,
            cover_penalty: -30.0,
            live_penalty: -40.0,
            lyrics_bonus: 10.0,
            uncensored_bonus: 10.0,
            channel_bonus: 20.0,
            duration_bonus: 5.0,
            preferred_duration: DurationWindow {
                min_secs: 120,
                max_secs: 600,
            },
            implausible_penalty: -100.0,
            plausible_duration: DurationWindow {
                min_secs: 60,
                max_secs: 1200,
            },
            view_threshold: 1000,
            view_bonus: 5.0,
            per_10000_views: 0.01,
            max_view_volume_bonus: 10.0,
            per_year_bonus: 0.5,
            title_format_bonus: 15.0,
            min_viable_score: 0.0,
        }
    }
}

impl ScoreWeights {
    /// Defaults with TOML overrides applied
    pub fn from_config(config: &ScoringConfig) -> AcquireResult<Self> {
        let d = Self::default();
        let pick = |v: Option<f64>, default: f64| v.unwrap_or(default);

        let preferred_duration = DurationWindow::new(
            config.preferred_min_secs.unwrap_or(d.preferred_duration.min_secs),
            config.preferred_max_secs.unwrap_or(d.preferred_duration.max_secs),
        )?;
        let plausible_duration = DurationWindow::new(
            config.plausible_min_secs.unwrap_or(d.plausible_duration.min_secs),
            config.plausible_max_secs.unwrap_or(d.plausible_duration.max_secs),
        )?;

        Ok(Self {
            official_bonus: pick(config.official_bonus, d.official_bonus),
            music_bonus: pick(config.music_bonus, d.music_bonus),
            similarity_damping: pick(config.similarity_damping, d.similarity_damping),
            word_order_bonus: pick(config.word_order_bonus, d.word_order_bonus),
            performance_penalty: pick(config.performance_penalty, d.performance_penalty),
            reaction_penalty: pick(config.reaction_penalty, d.reaction_penalty),
            slowed_penalty: pick(config.slowed_penalty, d.slowed_penalty),
            album_penalty: pick(config.album_penalty, d.album_penalty),
            cover_penalty: pick(config.cover_penalty, d.cover_penalty),
            live_penalty: pick(config.live_penalty, d.live_penalty),
            lyrics_bonus: pick(config.lyrics_bonus, d.lyrics_bonus),
            uncensored_bonus: pick(config.uncensored_bonus, d.uncensored_bonus),
            channel_bonus: pick(config.channel_bonus, d.channel_bonus),
            duration_bonus: pick(config.duration_bonus, d.duration_bonus),
            preferred_duration,
            implausible_penalty: pick(config.implausible_penalty, d.implausible_penalty),
            plausible_duration,
            view_threshold: config.view_threshold.unwrap_or(d.view_threshold),
            view_bonus: pick(config.view_bonus, d.view_bonus),
            per_10000_views: pick(config.per_10000_views, d.per_10000_views),
            max_view_volume_bonus: pick(config.max_view_volume_bonus, d.max_view_volume_bonus),
            per_year_bonus: pick(config.per_year_bonus, d.per_year_bonus),
            title_format_bonus: pick(config.title_format_bonus, d.title_format_bonus),
            min_viable_score: pick(config.min_viable_score, d.min_viable_score),
        })
    }

    /// Keyword table in evaluation order (steps 6, 7, 8)
    pub fn keyword_rules(&self) -> Vec<KeywordRule> {
        let rule = |family, magnitude, per_occurrence, requires_absent_from_query| KeywordRule {
            family,
            magnitude,
            per_occurrence,
            requires_absent_from_query,
        };
        vec![
            rule(KeywordFamily::Performance, self.performance_penalty, true, false),
            rule(KeywordFamily::Reaction, self.reaction_penalty, true, false),
            rule(KeywordFamily::Slowed, self.slowed_penalty, true, false),
            rule(KeywordFamily::Album, self.album_penalty, true, false),
            rule(KeywordFamily::Cover, self.cover_penalty, true, true),
            rule(KeywordFamily::Live, self.live_penalty, true, true),
            rule(KeywordFamily::Lyrics, self.lyrics_bonus, false, false),
            rule(KeywordFamily::Uncensored, self.uncensored_bonus, false, false),
        ]
    }
}

// ============================================================================
// Trace
// ============================================================================

/// One applied adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStep {
    pub description: String,
    pub delta: f64,
    /// Running total after this step
    pub total: f64,
}

/// Ordered, append-only record of one scoring call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTrace {
    steps: Vec<ScoreStep>,
}

impl ScoreTrace {
    pub fn steps(&self) -> &[ScoreStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.description.as_str())
    }
}

/// Running score that records every adjustment
struct ScoreBuilder {
    total: f64,
    trace: ScoreTrace,
}

impl ScoreBuilder {
    fn new() -> Self {
        Self {
            total: 0.0,
            trace: ScoreTrace::default(),
        }
    }

    fn apply(&mut self, description: impl Into<String>, delta: f64) {
        self.total += delta;
        self.trace.steps.push(ScoreStep {
            description: description.into(),
            delta,
            total: self.total,
        });
    }
}

/// Result of scoring one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub score: f64,
    pub cleaned_title: String,
    pub trace: ScoreTrace,
}

// ============================================================================
// Scoring
// ============================================================================

/// Keep ASCII alphanumerics and whitespace, lower-case, collapse spaces
pub fn clean_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    collapse_whitespace(&kept)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fraction of query words found in order in the title, and title/query length ratio
///
/// An empty query yields `(0.0, 1.0)`.
pub fn in_order_overlap(query_words: &[&str], title_words: &[&str]) -> (f64, f64) {
    if query_words.is_empty() {
        return (0.0, 1.0);
    }

    let (mut qi, mut ti, mut matched) = (0usize, 0usize, 0usize);
    while qi < query_words.len() && ti < title_words.len() {
        if query_words[qi] == title_words[ti] {
            matched += 1;
            qi += 1;
        }
        ti += 1;
    }

    let fraction = matched as f64 / query_words.len() as f64;
    let length_ratio = title_words.len() as f64 / query_words.len() as f64;
    (fraction, length_ratio)
}

/// Score `candidate` against `query`
pub fn score(query: &str, candidate: &CandidateRecord, weights: &ScoreWeights) -> ScoreOutcome {
    let mut s = ScoreBuilder::new();

    // Step 1
    let cleaned_title = clean_text(&candidate.title);
    let mut working = cleaned_title.clone();
    let query_lower = query.trim().to_lowercase();
    let query_clean = clean_text(query);

    // Steps 2-3
    if OFFICIAL_RE.is_match(&working) {
        s.apply("Title contains 'official'", weights.official_bonus);
        working = collapse_whitespace(&OFFICIAL_RE.replace_all(&working, " "));
    }
    if MUSIC_RE.is_match(&working) {
        s.apply("Title contains 'music'", weights.music_bonus);
        working = collapse_whitespace(&MUSIC_RE.replace_all(&working, " "));
    }

    // Step 4
    let similarity = strsim::normalized_levenshtein(&query_lower, &working) * 100.0;
    s.apply(
        format!(
            "Text similarity {:.2} x {:.2}",
            similarity, weights.similarity_damping
        ),
        similarity * weights.similarity_damping,
    );

    // Step 5
    let query_words: Vec<&str> = query_clean.split_whitespace().collect();
    let title_words: Vec<&str> = working.split_whitespace().collect();
    let (fraction, length_ratio) = in_order_overlap(&query_words, &title_words);
    if fraction >= 0.5 && (0.7..=1.3).contains(&length_ratio) {
        s.apply(
            format!(
                "In-order word match {:.0}% (length ratio {:.2})",
                fraction * 100.0,
                length_ratio
            ),
            weights.word_order_bonus,
        );
    }

    // Steps 6-8
    for rule in weights.keyword_rules() {
        let count = rule.family.count_in(&working);
        if count == 0 {
            continue;
        }
        if rule.requires_absent_from_query && rule.family.count_in(&query_clean) > 0 {
            continue;
        }
        if rule.per_occurrence {
            s.apply(
                format!("{} keyword x{}", rule.family.label(), count),
                rule.magnitude * count as f64,
            );
        } else {
            s.apply(format!("{} keyword", rule.family.label()), rule.magnitude);
        }
    }

    // Step 9
    let channel_clean = clean_text(&candidate.channel);
    let channel_words: HashSet<&str> = channel_clean.split_whitespace().collect();
    if cleaned_title.split_whitespace().any(|w| channel_words.contains(w)) {
        s.apply("Title word found in channel name", weights.channel_bonus);
    }

    // Step 10
    let duration = normalizer::to_seconds_or_zero(&candidate.duration);
    let preferred = &weights.preferred_duration;
    if preferred.contains(duration) {
        s.apply(
            format!(
                "Duration {}s within preferred window {}-{}s",
                duration, preferred.min_secs, preferred.max_secs
            ),
            weights.duration_bonus,
        );
    }
    let plausible = &weights.plausible_duration;
    if !plausible.contains(duration) {
        s.apply(
            format!(
                "Duration {}s outside plausible window {}-{}s",
                duration, plausible.min_secs, plausible.max_secs
            ),
            weights.implausible_penalty,
        );
    }

    // Step 11
    if BEHIND_THE_SCENES_RE.is_match(&working) {
        s.apply("Title contains 'behind the scenes'", weights.cover_penalty);
    }

    // Step 12
    let views = normalizer::to_view_count(&candidate.view_count);
    if views > weights.view_threshold {
        s.apply(
            format!("Views {} above threshold {}", views, weights.view_threshold),
            weights.view_bonus,
        );
    }
    let volume = (views as f64 / 10_000.0 * weights.per_10000_views)
        .min(weights.max_view_volume_bonus);
    if volume > 0.0 {
        s.apply(format!("View volume bonus for {} views", views), volume);
    }

    // Step 13
    if let Some(years) = candidate.published.as_deref().and_then(normalizer::age_years) {
        if years > 0 {
            s.apply(
                format!("Published {} year(s) ago", years),
                f64::from(years) * weights.per_year_bonus,
            );
        }
    }

    // Step 14
    if TITLE_FORMAT_RE.is_match(&candidate.title) {
        s.apply(
            "Title matches '<song> - <artist> (official ...)' format",
            weights.title_format_bonus,
        );
    }

    // Step 15
    if s.total > MAX_SCORE {
        let excess = MAX_SCORE - s.total;
        s.apply(format!("Clamped to {:.0}", MAX_SCORE), excess);
        s.total = MAX_SCORE;
    }

    ScoreOutcome {
        score: s.total,
        cleaned_title,
        trace: s.trace,
    }
}
