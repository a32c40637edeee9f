use serde::{ Serialize, Deserialize };

const NEGATIVE_KEYWORDS: &[&str] = &["sad", "upset", "depressed", "angry"];
const POSITIVE_KEYWORDS: &[&str] = &["happy", "excited", "great", "good"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Positive,
    Neutral,
}

/// Keyword classifier over the lowercased text. Negative keywords are checked first.
pub fn detect_sentiment(text: &str) -> Sentiment {
    let lowered = text.to_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|w| lowered.contains(w)) {
        Sentiment::Negative
    } else if POSITIVE_KEYWORDS.iter().any(|w| lowered.contains(w)) {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}
