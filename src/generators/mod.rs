pub mod gemini;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Witty,
    Storytelling,
    Motivational,
}

impl Tone {
    pub const ALL: [Tone; 4] = [
        Tone::Professional,
        Tone::Witty,
        Tone::Storytelling,
        Tone::Motivational,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Witty => "witty",
            Tone::Storytelling => "storytelling",
            Tone::Motivational => "motivational",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Tone::ALL
            .into_iter()
            .find(|tone| tone.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown tone '{}', expected one of: professional, witty, storytelling, motivational",
                    s
                )
            })
    }
}

/// Produces raw thread text for a topic. The text still needs normalizing.
#[async_trait]
pub trait ThreadGenerator: Send + Sync {
    async fn generate(&self, topic: &str, tone: Tone) -> Result<String>;
}

/// Instructions sent to the model. Asks for unnumbered, line-separated tweets
/// so there is less for the normalizer to clean up.
pub fn build_prompt(topic: &str, tone: Tone, tweet_count: usize) -> String {
    format!(
        r#"You are an expert social media content creator. Write a {count}-tweet thread on the topic "{topic}" in a {tone} tone.

IMPORTANT FORMATTING RULES:
- Each tweet should be engaging and concise (under 280 characters)
- Separate each tweet with a line break
- Do NOT include any numbering like "1/5", "**1/5**", "Tweet 1:", etc.
- Do NOT include thread indicators or counters
- Just write the content of each tweet naturally
- Each tweet should stand alone but flow together as a cohesive thread

Focus on creating valuable, engaging content without any formatting markers or numbering."#,
        count = tweet_count,
        topic = topic.trim(),
        tone = tone,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_parses_case_insensitively() {
        assert_eq!("Witty".parse::<Tone>().unwrap(), Tone::Witty);
        assert_eq!(" STORYTELLING ".parse::<Tone>().unwrap(), Tone::Storytelling);
        assert!("sarcastic".parse::<Tone>().is_err());
    }

    #[test]
    fn test_tone_serde_is_lowercase() {
        let json = serde_json::to_string(&Tone::Motivational).unwrap();
        assert_eq!(json, "\"motivational\"");
    }

    #[test]
    fn test_prompt_mentions_topic_tone_and_count() {
        let prompt = build_prompt("  Rust async  ", Tone::Professional, 7);
        assert!(prompt.contains("Write a 7-tweet thread on the topic \"Rust async\""));
        assert!(prompt.contains("in a professional tone"));
        assert!(prompt.contains("Do NOT include any numbering"));
    }
}
