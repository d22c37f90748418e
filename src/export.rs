//! Plain-text and CSV renderings of a draft thread.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::generators::Tone;

const RULE_HEAVY: &str = "═══════════════════════════════════════";
const RULE_LIGHT: &str = "─────────────────────────────────────────";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadExport {
    pub topic: String,
    pub tone: Tone,
    pub tweets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub include_metadata: bool,
    pub include_numbering: bool,
    pub include_stats: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_numbering: true,
            include_stats: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            other => Err(format!("Unsupported format: {other}")),
        }
    }
}

/// Character and word counts.
pub fn text_stats(text: &str) -> (usize, usize) {
    (text.chars().count(), text.split_whitespace().count())
}

pub fn format_txt(thread: &ThreadExport, options: &ExportOptions) -> String {
    let mut out = String::new();

    if options.include_metadata {
        out.push_str(RULE_HEAVY);
        out.push('\n');
        out.push_str("           TWITTER THREAD\n");
        out.push_str(RULE_HEAVY);
        out.push_str("\n\n");
        out.push_str(&format!("📝 Topic: {}\n", thread.topic));
        out.push_str(&format!("🎯 Tone: {}\n", capitalize(thread.tone.as_str())));
        if let Some(at) = thread.generated_at {
            out.push_str(&format!("📅 Generated: {}\n", at.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        out.push_str(&format!("🧵 Thread Length: {} tweets\n\n", thread.tweets.len()));
        out.push_str(RULE_LIGHT);
        out.push_str("\n\n");
    }

    for (index, tweet) in thread.tweets.iter().enumerate() {
        if options.include_numbering {
            out.push_str(&format!("{}/ {}\n\n", index + 1, tweet));
        } else {
            out.push_str(&format!("{}\n\n", tweet));
        }

        if options.include_stats {
            let (chars, words) = text_stats(tweet);
            out.push_str(&format!("   📊 {} chars, {} words\n\n", chars, words));
        }
    }

    if options.include_stats && options.include_metadata && !thread.tweets.is_empty() {
        let (total_chars, total_words) = thread
            .tweets
            .iter()
            .map(|t| text_stats(t))
            .fold((0, 0), |(c, w), (tc, tw)| (c + tc, w + tw));
        let count = thread.tweets.len() as f64;

        out.push_str(RULE_LIGHT);
        out.push('\n');
        out.push_str("📈 THREAD STATISTICS\n");
        out.push_str(RULE_LIGHT);
        out.push('\n');
        out.push_str(&format!("Total Characters: {}\n", total_chars));
        out.push_str(&format!("Total Words: {}\n", total_words));
        out.push_str(&format!(
            "Average Characters per Tweet: {}\n",
            (total_chars as f64 / count).round()
        ));
        out.push_str(&format!(
            "Average Words per Tweet: {}\n",
            (total_words as f64 / count).round()
        ));
    }

    out
}

/// CSV with `#` comment rows for metadata. `include_stats` adds count columns.
pub fn format_csv(thread: &ThreadExport, include_stats: bool) -> String {
    let mut headers = vec!["Tweet Number", "Content"];
    if include_stats {
        headers.extend(["Character Count", "Word Count"]);
    }

    let mut out = headers.join(",");
    out.push('\n');
    out.push_str(&format!("# Topic: {}\n", thread.topic));
    out.push_str(&format!("# Tone: {}\n", thread.tone));
    if let Some(at) = thread.generated_at {
        out.push_str(&format!("# Generated: {}\n", at.to_rfc3339()));
    }
    out.push_str(&format!("# Total Tweets: {}\n", thread.tweets.len()));

    for (index, tweet) in thread.tweets.iter().enumerate() {
        let mut row = vec![(index + 1).to_string(), escape_csv(tweet)];
        if include_stats {
            let (chars, words) = text_stats(tweet);
            row.push(chars.to_string());
            row.push(words.to_string());
        }
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

fn escape_csv(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase, dash-separated, safe for any filesystem.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// `twitter-thread-{topic}-{YYYY-MM-DD}.{ext}`, topic cut to 30 characters.
pub fn export_filename(topic: &str, format: ExportFormat, date: NaiveDate) -> String {
    let topic: String = topic.chars().take(30).collect();
    format!(
        "twitter-thread-{}-{}.{}",
        sanitize_filename(&topic),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ThreadExport {
        ThreadExport {
            topic: "Rust, async & you".into(),
            tone: Tone::Witty,
            tweets: vec!["Hello world".into(), "Second, with \"quotes\"".into()],
            generated_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_txt_with_metadata_and_numbering() {
        let txt = format_txt(&sample(), &ExportOptions::default());
        assert!(txt.contains("TWITTER THREAD"));
        assert!(txt.contains("📝 Topic: Rust, async & you\n"));
        assert!(txt.contains("🎯 Tone: Witty\n"));
        assert!(txt.contains("📅 Generated: 2025-03-01 12:30:00 UTC\n"));
        assert!(txt.contains("🧵 Thread Length: 2 tweets"));
        assert!(txt.contains("1/ Hello world\n\n2/ Second"));
        assert!(!txt.contains("📊"));
    }

    #[test]
    fn test_txt_bare() {
        let options = ExportOptions {
            include_metadata: false,
            include_numbering: false,
            include_stats: false,
        };
        let txt = format_txt(&sample(), &options);
        assert_eq!(txt, "Hello world\n\nSecond, with \"quotes\"\n\n");
    }

    #[test]
    fn test_txt_stats_summary() {
        let options = ExportOptions {
            include_stats: true,
            ..ExportOptions::default()
        };
        let txt = format_txt(&sample(), &options);
        assert!(txt.contains("   📊 11 chars, 2 words\n"));
        assert!(txt.contains("Total Characters: 32\n"));
        assert!(txt.contains("Total Words: 5\n"));
        assert!(txt.contains("Average Characters per Tweet: 16\n"));
        assert!(txt.contains("Average Words per Tweet: 3\n"));
    }

    #[test]
    fn test_csv_escapes_and_stats() {
        let csv = format_csv(&sample(), true);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Tweet Number,Content,Character Count,Word Count");
        assert_eq!(lines[1], "# Topic: Rust, async & you");
        assert_eq!(lines[2], "# Tone: witty");
        assert_eq!(lines[3], "# Generated: 2025-03-01T12:30:00+00:00");
        assert_eq!(lines[4], "# Total Tweets: 2");
        assert_eq!(lines[5], "1,Hello world,11,2");
        assert_eq!(lines[6], "2,\"Second, with \"\"quotes\"\"\",21,3");
    }

    #[test]
    fn test_csv_without_stats() {
        let csv = format_csv(&sample(), false);
        assert!(csv.starts_with("Tweet Number,Content\n"));
        assert!(csv.contains("\n1,Hello world\n"));
    }

    #[test]
    fn test_csv_quotes_carriage_returns() {
        assert_eq!(escape_csv("line one\r\nline two"), "\"line one\r\nline two\"");
        assert_eq!(escape_csv("bare\rreturn"), "\"bare\rreturn\"");
        assert_eq!(escape_csv("plain"), "plain");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("  Rust, async & YOU!! "), "rust-async-you");
        assert_eq!(sanitize_filename("***"), "");
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let name = export_filename(
            "The future of systems programming languages",
            ExportFormat::Csv,
            date,
        );
        assert_eq!(name, "twitter-thread-the-future-of-systems-programm-2025-03-01.csv");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
