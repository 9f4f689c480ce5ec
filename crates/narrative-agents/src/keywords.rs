//! Keyword tables and the text classifiers built on them.
//!
//! Matching is case-insensitive substring matching: crude, cheap and
//! predictable, which is all a scan of a few dozen posts needs.

use narrative_types::{Polarity, SentimentReading};

/// Keywords that tie content to Victor Hawthorne.
pub const VICTOR_KEYWORDS: [&str; 5] = [
    "victor",
    "hawthorne",
    "victor hawthorne",
    "economic growth",
    "business friendly",
];

/// Keywords that tie content to Marina.
pub const MARINA_KEYWORDS: [&str; 4] =
    ["marina", "progressive", "social justice", "climate action"];

/// Election vocabulary.
pub const ELECTION_KEYWORDS: [&str; 5] = ["vote", "election", "candidate", "campaign", "ballot"];

/// Policy issues.
pub const ISSUE_KEYWORDS: [&str; 5] = ["economy", "healthcare", "education", "environment", "jobs"];

/// Supportive wording.
pub const POSITIVE_KEYWORDS: [&str; 7] = [
    "great",
    "excellent",
    "amazing",
    "support",
    "endorse",
    "love",
    "fantastic",
];

/// Critical wording.
pub const NEGATIVE_KEYWORDS: [&str; 6] = [
    "terrible",
    "awful",
    "hate",
    "disappointed",
    "against",
    "oppose",
];

/// Words that make a post worth engaging with in the political phase, and
/// that make a reply prompt carry the campaign stance.
pub const POLITICAL_KEYWORDS: [&str; 5] = ["vote", "election", "candidate", "policy", "politics"];

/// Interest categories and the words that reveal them.
pub const INTEREST_KEYWORDS: [(&str, &[&str]); 5] = [
    ("technology", &["tech", "ai", "computer", "software", "innovation"]),
    ("politics", &["vote", "election", "government", "policy"]),
    ("sports", &["game", "team", "player", "score", "match"]),
    ("local", &["kingston", "community", "local", "downtown"]),
    ("business", &["work", "job", "career", "company", "economy"]),
];

/// Markers of trend- or news-driven content.
pub const TRENDING_MARKERS: [&str; 3] = ["#", "trending", "news"];

fn hits(lowered: &str, keywords: &[&str]) -> u32 {
    let count = keywords.iter().filter(|k| lowered.contains(*k)).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Whether content matches any candidate, election or issue keyword.
pub fn is_political(content: &str) -> bool {
    let lowered = content.to_lowercase();
    [
        VICTOR_KEYWORDS.as_slice(),
        MARINA_KEYWORDS.as_slice(),
        ELECTION_KEYWORDS.as_slice(),
        ISSUE_KEYWORDS.as_slice(),
    ]
    .iter()
    .any(|set| hits(&lowered, set) > 0)
}

/// Whether non-political content rides a trend or the news.
pub fn is_trending(content: &str) -> bool {
    hits(&content.to_lowercase(), &TRENDING_MARKERS) > 0
}

/// Interest categories detected in content, in table order.
pub fn interests_in(content: &str) -> Vec<String> {
    let lowered = content.to_lowercase();
    INTEREST_KEYWORDS
        .iter()
        .filter(|(_, words)| hits(&lowered, words) > 0)
        .map(|(interest, _)| (*interest).to_owned())
        .collect()
}

/// Score the sentiment of one piece of content.
///
/// Content is attributed to the candidate with more keyword hits when
/// positive wording outweighs negative wording; otherwise negative wording
/// makes it a candidate-less negative reading, and anything else is neutral.
#[allow(clippy::cast_precision_loss)]
pub fn sentiment_of(content: &str) -> SentimentReading {
    let lowered = content.to_lowercase();
    let victor = hits(&lowered, &VICTOR_KEYWORDS);
    let marina = hits(&lowered, &MARINA_KEYWORDS);
    let positive = hits(&lowered, &POSITIVE_KEYWORDS);
    let negative = hits(&lowered, &NEGATIVE_KEYWORDS);

    let supported = if positive > negative {
        if victor > marina {
            Some(("victor", victor))
        } else if marina > victor {
            Some(("marina", marina))
        } else {
            None
        }
    } else {
        None
    };

    if let Some((candidate, matches)) = supported {
        return SentimentReading {
            candidate: Some(candidate.to_owned()),
            polarity: Polarity::Positive,
            strength: (f64::from(matches.saturating_add(positive)) / 5.0).min(1.0),
        };
    }
    if negative > positive {
        return SentimentReading {
            candidate: None,
            polarity: Polarity::Negative,
            strength: (f64::from(negative) / 3.0).min(1.0),
        };
    }
    SentimentReading::default()
}
