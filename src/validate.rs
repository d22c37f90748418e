use serde::Serialize;

pub const MAX_TWEET_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TweetValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// A draft entry that failed validation, by position in the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidTweet {
    pub index: usize,
    pub errors: Vec<String>,
}

/// Check one tweet against the posting limits. Length is measured in
/// Unicode scalar values.
pub fn validate_tweet(text: &str) -> TweetValidation {
    let mut errors = Vec::new();

    if text.trim().is_empty() {
        errors.push("Tweet cannot be empty".to_string());
    }

    let length = text.chars().count();
    if length > MAX_TWEET_CHARS {
        errors.push(format!(
            "Tweet is too long ({}/{} characters)",
            length, MAX_TWEET_CHARS
        ));
    }

    TweetValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Validate every tweet of a draft, returning the offending indexes.
pub fn validate_thread<S: AsRef<str>>(tweets: &[S]) -> Vec<InvalidTweet> {
    tweets
        .iter()
        .enumerate()
        .filter_map(|(index, tweet)| {
            let validation = validate_tweet(tweet.as_ref());
            if validation.valid {
                None
            } else {
                Some(InvalidTweet {
                    index,
                    errors: validation.errors,
                })
            }
        })
        .collect()
}
