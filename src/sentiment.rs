use serde::{Deserialize, Serialize};

/// Fixed positive lexicon (policy / business tone).
const POSITIVE: &[&str] = &["利好", "增长", "提升", "获批", "推进", "改善", "成功", "满意"];

/// Fixed negative lexicon (complaints, risk, penalties).
const NEGATIVE: &[&str] = &[
    "投诉", "舆情", "风险", "下滑", "事故", "处罚", "违规", "失信", "负面",
];

/// Score at or beyond which a text stops being neutral.
const POLARITY_THRESHOLD: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    #[serde(rename = "正面")]
    Positive,
    #[serde(rename = "负面")]
    Negative,
    #[serde(rename = "中性")]
    Neutral,
}

impl Sentiment {
    /// Map a free-form label (Chinese or English) back to a class.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "正面" | "positive" => Some(Sentiment::Positive),
            "负面" | "negative" => Some(Sentiment::Negative),
            "中性" | "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

/// Lexicon score: each lexicon word present counts once, positive minus negative.
pub fn lexicon_score(text: &str) -> i32 {
    let pos = POSITIVE.iter().filter(|w| text.contains(**w)).count() as i32;
    let neg = NEGATIVE.iter().filter(|w| text.contains(**w)).count() as i32;
    pos - neg
}

pub fn classify(text: &str) -> Sentiment {
    let score = lexicon_score(text);
    if score >= POLARITY_THRESHOLD {
        Sentiment::Positive
    } else if score <= -POLARITY_THRESHOLD {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}
