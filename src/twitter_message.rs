use serde::{Deserialize, Serialize};

use crate::error::PostFailure;

/// A tweet the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedTweet {
    pub id: String,
    pub text: String,
    /// Parent id when this tweet was posted as a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

pub type PostResult = Result<PostedTweet, PostFailure>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    Succeeded,
    Failed { index: usize },
    /// The caller stopped before every tweet was attempted.
    Cancelled { posted: usize },
}

/// One result per attempted tweet, in thread order. Stops at the first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPostOutcome {
    pub total: usize,
    pub results: Vec<PostResult>,
}

impl ThreadPostOutcome {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            results: Vec::with_capacity(total),
        }
    }

    pub fn status(&self) -> PublishStatus {
        if let Some(index) = self.results.iter().position(Result::is_err) {
            PublishStatus::Failed { index }
        } else if self.results.len() == self.total {
            PublishStatus::Succeeded
        } else {
            PublishStatus::Cancelled {
                posted: self.results.len(),
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == PublishStatus::Succeeded
    }

    /// Tweets that are live on the provider, including a partial prefix.
    pub fn posted(&self) -> Vec<&PostedTweet> {
        self.results.iter().filter_map(|r| r.as_ref().ok()).collect()
    }

    pub fn failure(&self) -> Option<(usize, &PostFailure)> {
        self.results
            .iter()
            .enumerate()
            .find_map(|(index, r)| r.as_ref().err().map(|e| (index, e)))
    }
}

/// Progress of a thread post, one pair of events per attempted tweet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    /// About to send tweet `index` (0-based) of `total`.
    Attempting { index: usize, total: usize },
    /// The request for `index` settled; `outcome` holds everything so far.
    Settled {
        index: usize,
        total: usize,
        outcome: ThreadPostOutcome,
    },
}

impl PublishEvent {
    pub fn index(&self) -> usize {
        match self {
            Self::Attempting { index, .. } | Self::Settled { index, .. } => *index,
        }
    }

    /// "Posting tweet i+1 of N" style label.
    pub fn progress_label(&self) -> String {
        match self {
            Self::Attempting { index, total } => {
                format!("Posting tweet {} of {}", index + 1, total)
            }
            Self::Settled {
                index,
                total,
                outcome,
            } => match outcome.results.get(*index) {
                Some(Ok(_)) => format!("Posted tweet {} of {}", index + 1, total),
                _ => format!("Failed to post tweet {} of {}", index + 1, total),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PostErrorKind, PostFailure};

    fn posted(id: &str) -> PostResult {
        Ok(PostedTweet {
            id: id.into(),
            text: format!("tweet {id}"),
            reply_to: None,
        })
    }

    #[test]
    fn test_status_transitions() {
        let mut outcome = ThreadPostOutcome::new(2);
        assert_eq!(outcome.status(), PublishStatus::Cancelled { posted: 0 });

        outcome.results.push(posted("1"));
        assert_eq!(outcome.status(), PublishStatus::Cancelled { posted: 1 });

        outcome.results.push(posted("2"));
        assert!(outcome.is_complete());
        assert_eq!(outcome.posted().len(), 2);
        assert!(outcome.failure().is_none());
    }

    #[test]
    fn test_failed_outcome_keeps_prefix() {
        let mut outcome = ThreadPostOutcome::new(3);
        outcome.results.push(posted("1"));
        outcome
            .results
            .push(Err(PostFailure::classify(Some(403), "duplicate content")));

        assert_eq!(outcome.status(), PublishStatus::Failed { index: 1 });
        assert_eq!(outcome.posted().len(), 1);
        let (index, failure) = outcome.failure().unwrap();
        assert_eq!(index, 1);
        assert_eq!(failure.kind, PostErrorKind::DuplicateContent);
    }

    #[test]
    fn test_progress_label() {
        let event = PublishEvent::Attempting { index: 1, total: 5 };
        assert_eq!(event.progress_label(), "Posting tweet 2 of 5");
        assert_eq!(event.index(), 1);
    }
}
