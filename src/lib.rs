//! Generate Twitter/X threads with a language model, clean up the numbering
//! models like to add, and publish the result as a reply chain.

pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod generators;
pub mod logging;
pub mod publisher;
pub mod thread_parser;
pub mod twitter;
pub mod twitter_message;
pub mod validate;

pub use error::{PostErrorKind, PostFailure, PublishError, TwitterError};
pub use publisher::{make_thread_unique, ThreadPublisher};
pub use thread_parser::parse_thread;
pub use twitter::{TweetTransport, TwitterClient};
pub use twitter_message::{PostedTweet, PublishEvent, ThreadPostOutcome};
pub use validate::validate_tweet;
