use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::warn;

use autothread::auth::{generate_state, AuthorizationCallback, Pkce, Session, TwitterAuth};
use autothread::config::Config;
use autothread::error::{PostFailure, PublishError};
use autothread::export::{
    export_filename, format_csv, format_txt, ExportFormat, ExportOptions, ThreadExport,
};
use autothread::generators::{GeminiGenerator, ThreadGenerator, Tone};
use autothread::publisher::{make_thread_unique, number_thread, ThreadPublisher};
use autothread::thread_parser::{parse_thread_with_report, NormalizedThread};
use autothread::twitter::TwitterClient;
use autothread::twitter_message::{PublishEvent, PublishStatus, ThreadPostOutcome};
use autothread::validate::{validate_tweet, MAX_TWEET_CHARS};

#[derive(Parser)]
#[command(name = "autothread")]
#[command(author, version, about = "Generate, edit and post Twitter/X threads", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a thread for a topic
    Generate {
        #[arg(short, long)]
        topic: String,
        /// professional, witty, storytelling or motivational
        #[arg(long, default_value = "professional")]
        tone: Tone,
        /// Write the cleaned tweets to a draft file (JSON array)
        #[arg(short, long)]
        save: Option<PathBuf>,
        /// Also print the model output before cleanup
        #[arg(long)]
        raw: bool,
    },
    /// Clean raw thread text (file or stdin) into a JSON draft
    Normalize { input: Option<PathBuf> },
    /// Check every tweet in a draft
    Validate { draft: PathBuf },
    /// Post a draft as a thread, or one tweet of it
    Post {
        draft: PathBuf,
        /// Post only this tweet (1-based) as a standalone tweet
        #[arg(long)]
        single: Option<usize>,
        /// Prefix tweets after the first with "N/ "
        #[arg(long)]
        number: bool,
        /// Append rotating markers so a re-post is not a duplicate
        #[arg(long)]
        unique: bool,
        /// Bearer token (defaults to config / TWITTER_ACCESS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
    /// Show the account behind the access token
    Whoami {
        #[arg(long)]
        token: Option<String>,
    },
    /// Sign in with OAuth 2.0 and print the tokens
    Login,
    /// Exchange a refresh token for a new access token
    Refresh {
        #[arg(long)]
        refresh_token: String,
    },
    /// Export a draft as TXT or CSV
    Export {
        draft: PathBuf,
        #[arg(short, long)]
        topic: String,
        #[arg(long, default_value = "professional")]
        tone: Tone,
        #[arg(short, long, default_value = "txt")]
        format: ExportFormat,
        #[arg(long)]
        no_metadata: bool,
        #[arg(long)]
        no_numbering: bool,
        /// Per-tweet counts in TXT output (CSV always has them)
        #[arg(long)]
        stats: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?.with_env();

    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    autothread::logging::init(level, config.logging.file.as_deref())?;

    match cli.command {
        Command::Generate {
            topic,
            tone,
            save,
            raw,
        } => generate(&config, &topic, tone, save.as_deref(), raw).await,
        Command::Normalize { input } => normalize(input.as_deref()),
        Command::Validate { draft } => validate(&draft),
        Command::Post {
            draft,
            single,
            number,
            unique,
            token,
        } => post(&config, &draft, single, number, unique, token).await,
        Command::Whoami { token } => whoami(&config, token).await,
        Command::Login => login(&config).await,
        Command::Refresh { refresh_token } => refresh(&config, &refresh_token).await,
        Command::Export {
            draft,
            topic,
            tone,
            format,
            no_metadata,
            no_numbering,
            stats,
            output,
        } => {
            let options = ExportOptions {
                include_metadata: !no_metadata,
                include_numbering: !no_numbering,
                include_stats: stats,
            };
            export(&draft, topic, tone, format, options, output)
        }
    }
}

async fn generate(
    config: &Config,
    topic: &str,
    tone: Tone,
    save: Option<&Path>,
    raw: bool,
) -> Result<()> {
    let api_key = config
        .generator
        .api_key
        .clone()
        .context("GEMINI_API_KEY is not set")?;
    let generator = GeminiGenerator::new(api_key, &config.generator)?;

    let text = generator.generate(topic, tone).await?;
    if raw {
        println!("{text}\n");
    }

    let thread = parse_thread_with_report(&text);
    warn_ambiguous(&thread);
    print_tweets(&thread.tweets);

    if let Some(path) = save {
        write_draft(path, &thread.tweets)?;
        println!("Saved draft to {}", path.display());
    }
    Ok(())
}

fn normalize(input: Option<&Path>) -> Result<()> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let thread = parse_thread_with_report(&text);
    warn_ambiguous(&thread);
    println!("{}", serde_json::to_string_pretty(&thread.tweets)?);
    Ok(())
}

fn validate(draft: &Path) -> Result<()> {
    let tweets = read_draft(draft)?;
    let mut failures = 0;

    for (index, tweet) in tweets.iter().enumerate() {
        let result = validate_tweet(tweet);
        if result.valid {
            println!("{:>2}. ok ({}/{})", index + 1, tweet.chars().count(), MAX_TWEET_CHARS);
        } else {
            failures += 1;
            println!("{:>2}. {}", index + 1, result.errors.join(", "));
        }
    }

    if failures > 0 {
        bail!("{failures} of {} tweets are invalid", tweets.len());
    }
    Ok(())
}

async fn post(
    config: &Config,
    draft: &Path,
    single: Option<usize>,
    number: bool,
    unique: bool,
    token: Option<String>,
) -> Result<()> {
    let session = Session {
        bearer_token: token.or_else(|| config.twitter.access_token.clone()),
        ..Session::default()
    };
    let credential = session.credential()?;

    let mut tweets = read_draft(draft)?;
    if number {
        tweets = number_thread(&tweets);
    }
    if unique {
        tweets = make_thread_unique(&tweets);
    }

    let client = TwitterClient::new(&config.twitter)?;
    let publisher = ThreadPublisher::new(client).with_post_delay(config.twitter.post_delay());

    if let Some(position) = single {
        let text = position
            .checked_sub(1)
            .and_then(|i| tweets.get(i))
            .with_context(|| format!("draft has no tweet {position}"))?;

        return match publisher.post_single(credential, text).await {
            Ok(posted) => {
                println!("Tweet posted successfully! {}", tweet_url(&posted.id));
                Ok(())
            }
            Err(PublishError::Post(failure)) => {
                print_failure_hint(&failure);
                Err(failure.into())
            }
            Err(e) => Err(e.into()),
        };
    }

    // Ctrl-C stops the chain; a request already in flight still settles.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut events = pin!(publisher.post_thread_events(credential, &tweets)?);
    let mut outcome = ThreadPostOutcome::new(tweets.len());

    while let Some(event) = events.next().await {
        if matches!(event, PublishEvent::Attempting { .. }) && stop.load(Ordering::SeqCst) {
            warn!("Interrupted, not posting the remaining tweets");
            break;
        }
        eprintln!("{}", event.progress_label());
        if let PublishEvent::Settled { outcome: so_far, .. } = event {
            outcome = so_far;
            if stop.load(Ordering::SeqCst) {
                warn!("Interrupted, not posting the remaining tweets");
                break;
            }
        }
    }

    for posted in outcome.posted() {
        println!("{}", tweet_url(&posted.id));
    }

    match outcome.status() {
        PublishStatus::Succeeded => {
            println!("Thread with {} tweets posted successfully!", tweets.len());
            Ok(())
        }
        PublishStatus::Failed { index } => {
            let failure = outcome
                .failure()
                .map(|(_, f)| f.clone())
                .context("failed outcome without a failure")?;
            print_failure_hint(&failure);
            if unique && failure.is_retryable_with_unique() {
                eprintln!("The draft was already made unique; edit the tweets before retrying.");
            }
            bail!(
                "Failed to post tweet {}: {} ({} already live)",
                index + 1,
                failure,
                outcome.posted().len()
            )
        }
        PublishStatus::Cancelled { posted } => {
            bail!("Stopped after {posted} of {} tweets", tweets.len())
        }
    }
}

async fn whoami(config: &Config, token: Option<String>) -> Result<()> {
    let token = token
        .or_else(|| config.twitter.access_token.clone())
        .ok_or(PublishError::NotConnected)?;

    let client = TwitterClient::new(&config.twitter)?;
    let user = client
        .get_me(&token)
        .await
        .context("Failed to get Twitter user information")?;
    let session = Session::from_user(token, &user);

    println!(
        "{} (@{}) id {}",
        session.display_name,
        session.handle.as_deref().unwrap_or_default(),
        user.id
    );
    if let Some(image) = &user.profile_image_url {
        println!("{image}");
    }
    Ok(())
}

async fn login(config: &Config) -> Result<()> {
    let auth = TwitterAuth::new(config.oauth.clone())?;
    let pkce = Pkce::new();
    let state = generate_state();
    let url = auth.authorization_url(&state, &pkce);

    println!("Open this URL to authorize autothread:\n\n{url}\n");
    if let Err(e) = open::that(&url) {
        warn!(error = %e, "Could not open a browser");
    }

    print!("Paste the redirect URL (or the code): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    let callback = AuthorizationCallback::parse(&line)?;
    callback.verify_state(&state)?;
    let tokens = auth.exchange_code(&callback.code, &pkce).await?;

    let client = TwitterClient::new(&config.twitter)?;
    match client.get_me(&tokens.access_token).await {
        Ok(user) => println!("Signed in as {} (@{})", user.name, user.username),
        Err(e) => warn!(error = %e, "Signed in, but could not load the profile"),
    }

    println!("{}", serde_json::to_string_pretty(&tokens)?);
    println!("Set TWITTER_ACCESS_TOKEN to the access_token to post.");
    Ok(())
}

async fn refresh(config: &Config, refresh_token: &str) -> Result<()> {
    let auth = TwitterAuth::new(config.oauth.clone())?;
    let tokens = auth.refresh(refresh_token).await?;
    println!("{}", serde_json::to_string_pretty(&tokens)?);
    Ok(())
}

fn export(
    draft: &Path,
    topic: String,
    tone: Tone,
    format: ExportFormat,
    options: ExportOptions,
    output: Option<PathBuf>,
) -> Result<()> {
    let now = Utc::now();
    let thread = ThreadExport {
        topic,
        tone,
        tweets: read_draft(draft)?,
        generated_at: Some(now),
    };

    let content = match format {
        ExportFormat::Txt => format_txt(&thread, &options),
        ExportFormat::Csv => format_csv(&thread, true),
    };

    let path = output
        .unwrap_or_else(|| PathBuf::from(export_filename(&thread.topic, format, now.date_naive())));
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

fn read_draft(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read draft {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Draft {} is not a JSON array of strings", path.display()))
}

fn write_draft(path: &Path, tweets: &[String]) -> Result<()> {
    let json = serde_json::to_string_pretty(tweets)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_tweets(tweets: &[String]) {
    let options = textwrap::Options::new(78)
        .initial_indent("")
        .subsequent_indent("    ");

    for (index, tweet) in tweets.iter().enumerate() {
        let count = tweet.chars().count();
        let marker = if count > MAX_TWEET_CHARS { " !" } else { "" };
        println!("{:>2}. [{}/{}{}]", index + 1, count, MAX_TWEET_CHARS, marker);
        for line in textwrap::wrap(tweet, &options) {
            println!("    {line}");
        }
        println!();
    }
}

fn warn_ambiguous(thread: &NormalizedThread) {
    for strip in &thread.ambiguous {
        eprintln!(
            "warning: tweet {} was \"{}\" before numbering was removed; check it reads right",
            strip.index + 1,
            strip.original
        );
    }
}

fn print_failure_hint(failure: &PostFailure) {
    eprintln!("error: {failure}");
    if failure.is_retryable_with_unique() {
        eprintln!("hint: re-run with --unique to append markers and post again");
    }
    if let Some(cooldown) = failure.cooldown() {
        eprintln!(
            "hint: the rate limit resets in about {} minute(s)",
            cooldown.as_secs().div_ceil(60).max(1)
        );
    }
}

fn tweet_url(id: &str) -> String {
    format!("https://x.com/i/web/status/{id}")
}
