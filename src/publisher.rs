//! Sequential reply-chain publishing.
//!
//! Tweets go out strictly in draft order with a pause between requests; each
//! reply points at the id of the tweet before it. A failure stops the chain
//! and whatever was posted stays posted.

use std::pin::pin;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{PostFailure, PublishError};
use crate::twitter::{CreateTweetRequest, TweetTransport};
use crate::twitter_message::{PostedTweet, PublishEvent, ThreadPostOutcome};
use crate::validate::{validate_thread, validate_tweet, InvalidTweet};

pub const DEFAULT_POST_DELAY: Duration = Duration::from_secs(3);

/// Appended by [`make_thread_unique`], picked by `index % 5`. The empty slot
/// leaves every fifth tweet, starting with the first, unchanged.
pub const UNIQUE_MARKERS: [&str; 5] = ["", "🧵", "👇", "💭", "✨"];

pub struct ThreadPublisher<T> {
    transport: T,
    post_delay: Duration,
}

impl<T: TweetTransport> ThreadPublisher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            post_delay: DEFAULT_POST_DELAY,
        }
    }

    pub fn with_post_delay(mut self, post_delay: Duration) -> Self {
        self.post_delay = post_delay;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Post one standalone tweet.
    pub async fn post_single(
        &self,
        credential: &str,
        text: &str,
    ) -> Result<PostedTweet, PublishError> {
        let credential = require_credential(credential)?;

        let validation = validate_tweet(text);
        if !validation.valid {
            return Err(PublishError::Invalid(vec![InvalidTweet {
                index: 0,
                errors: validation.errors,
            }]));
        }

        let created = self
            .transport
            .create_tweet(credential, &CreateTweetRequest::new(text))
            .await
            .map_err(|e| {
                let failure = PostFailure::from(e);
                warn!(kind = %failure.kind, message = %failure.message, "Tweet was rejected");
                failure
            })?;

        info!(id = %created.id, "Posted tweet");
        Ok(PostedTweet {
            id: created.id,
            text: created.text,
            reply_to: None,
        })
    }

    /// Post a whole thread, returning once it completes or fails.
    pub async fn post_thread(
        &self,
        credential: &str,
        tweets: &[String],
    ) -> Result<ThreadPostOutcome, PublishError> {
        let mut events = pin!(self.post_thread_events(credential, tweets)?);
        let mut outcome = ThreadPostOutcome::new(tweets.len());

        while let Some(event) = events.next().await {
            if let PublishEvent::Settled { outcome: so_far, .. } = event {
                outcome = so_far;
            }
        }

        Ok(outcome)
    }

    /// Post a thread as a stream of progress events.
    ///
    /// Nothing is sent until the stream is polled. Every tweet is validated
    /// first; if any fails no request is made at all. The pause between
    /// tweets happens before `Attempting` is yielded, so dropping the stream
    /// on any event means no further request is sent.
    pub fn post_thread_events<'a>(
        &'a self,
        credential: &'a str,
        tweets: &'a [String],
    ) -> Result<impl Stream<Item = PublishEvent> + 'a, PublishError> {
        let credential = require_credential(credential)?;
        if tweets.is_empty() {
            return Err(PublishError::EmptyThread);
        }

        let invalid = validate_thread(tweets);
        if !invalid.is_empty() {
            return Err(PublishError::Invalid(invalid));
        }

        let run = ThreadRun {
            publisher: self,
            credential,
            tweets,
            cursor: 0,
            parent: None,
            outcome: ThreadPostOutcome::new(tweets.len()),
            phase: Phase::Announce,
        };

        Ok(stream::unfold(run, |mut run| async move {
            match run.phase {
                Phase::Done => None,
                Phase::Announce if run.cursor >= run.tweets.len() => None,
                Phase::Announce => {
                    if run.cursor > 0 {
                        run.pace().await;
                    }
                    run.phase = Phase::Send;
                    let event = PublishEvent::Attempting {
                        index: run.cursor,
                        total: run.tweets.len(),
                    };
                    Some((event, run))
                }
                Phase::Send => {
                    let event = run.send_current().await;
                    Some((event, run))
                }
            }
        }))
    }
}

enum Phase {
    Announce,
    Send,
    Done,
}

struct ThreadRun<'a, T> {
    publisher: &'a ThreadPublisher<T>,
    credential: &'a str,
    tweets: &'a [String],
    cursor: usize,
    parent: Option<String>,
    outcome: ThreadPostOutcome,
    phase: Phase,
}

impl<T: TweetTransport> ThreadRun<'_, T> {
    async fn pace(&self) {
        debug!(delay_ms = self.publisher.post_delay.as_millis(), "Pacing before next tweet");
        tokio::time::sleep(self.publisher.post_delay).await;
    }

    async fn send_current(&mut self) -> PublishEvent {
        let index = self.cursor;
        let total = self.tweets.len();

        let mut request = CreateTweetRequest::new(self.tweets[index].as_str());
        if let Some(parent) = &self.parent {
            request = request.in_reply_to(parent.as_str());
        }

        match self
            .publisher
            .transport
            .create_tweet(self.credential, &request)
            .await
        {
            Ok(created) => {
                info!(index, total, id = %created.id, "Posted thread tweet");
                self.parent = Some(created.id.clone());
                self.outcome.results.push(Ok(PostedTweet {
                    id: created.id,
                    text: created.text,
                    reply_to: request.reply_to_id().map(str::to_string),
                }));
                self.cursor += 1;
                self.phase = Phase::Announce;
            }
            Err(e) => {
                let failure = PostFailure::from(e);
                warn!(
                    index,
                    total,
                    kind = %failure.kind,
                    message = %failure.message,
                    "Thread stopped at failed tweet"
                );
                self.outcome.results.push(Err(failure));
                self.phase = Phase::Done;
            }
        }

        PublishEvent::Settled {
            index,
            total,
            outcome: self.outcome.clone(),
        }
    }
}

fn require_credential(credential: &str) -> Result<&str, PublishError> {
    let credential = credential.trim();
    if credential.is_empty() {
        Err(PublishError::NotConnected)
    } else {
        Ok(credential)
    }
}

/// Marker appended to the tweet at `index` by [`make_thread_unique`].
pub fn unique_marker(index: usize) -> Option<&'static str> {
    let marker = UNIQUE_MARKERS[index % UNIQUE_MARKERS.len()];
    (!marker.is_empty()).then_some(marker)
}

/// Append a rotating marker to each tweet so a re-post is not rejected as a
/// duplicate. Tweets that already contain their marker are left alone.
///
/// This changes what users see, so it is never applied automatically.
pub fn make_thread_unique(tweets: &[String]) -> Vec<String> {
    tweets
        .iter()
        .enumerate()
        .map(|(index, tweet)| match unique_marker(index) {
            Some(marker) if !tweet.contains(marker) => format!("{tweet} {marker}"),
            _ => tweet.clone(),
        })
        .collect()
}

/// Prefix every tweet after the first with `N/ `.
pub fn number_thread(tweets: &[String]) -> Vec<String> {
    tweets
        .iter()
        .enumerate()
        .map(|(index, tweet)| {
            if index == 0 {
                tweet.clone()
            } else {
                format!("{}/ {}", index + 1, tweet)
            }
        })
        .collect()
}
