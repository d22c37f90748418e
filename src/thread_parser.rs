use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Numbering and markup prefixes, tried in order. Each one may fire once per line.
static PREFIX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // **Tweet 1:** / **Tweet 1/5** / **Tweet 1**:
        Regex::new(r"^\*\*(?i:tweet)\s*\d{1,2}(?:/\d{1,2})?\s*[:.\-]?\*\*\s*[:.\-]?\s*").unwrap(),
        // **1/5** / **1/** / **1.** / **1)** / **1/5**:
        Regex::new(r"^\*\*\d{1,2}(?:/\d{1,2})?[/.):]?\*\*\s*[:.\-–—]?\s*").unwrap(),
        // Tweet 1: / Tweet 1/5 -
        Regex::new(r"^(?i:tweet)\s*\d{1,2}(?:/\d{1,2})?\s*[:.\-]\s*").unwrap(),
        // Thread 1: / thread 1 -
        Regex::new(r"^(?i:thread)\s+\d{1,2}(?:/\d{1,2})?\s*[:\-]\s*").unwrap(),
        // (1/5) / [1/5]
        Regex::new(r"^[(\[]\d{1,2}/\d{1,2}[)\]]\s*").unwrap(),
        // 1/5 - / 1/5: / 1/5 —
        Regex::new(r"^\d{1,2}/\d{1,2}\s*[:\-–—]\s*").unwrap(),
    ]
});

/// `1/ ` `1. ` `1) ` `1: `. Whitespace after the punctuation is required so
/// "3.5 billion" and "24/7 support" survive.
static BARE_NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}[/.):]\s+").unwrap());

/// `1/5 Hello`, only stripped when it reads as position/total.
static POSITION_OF_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})\s+").unwrap());

static STANDALONE_THREAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*thread\s*$").unwrap());

static NUMBERING_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*{0,2}[(\[]?\d{1,2}(?:/\d{1,2})?[/.):]?[)\]]?\*{0,2}$").unwrap()
});

/// A bare-numbering strip that left very little behind. These are the lines
/// where leading digits might have been content rather than numbering.
const SHORT_REMAINDER_WORDS: usize = 3;

/// Which of the looser rules removed something from a line.
#[derive(Debug, Clone, Copy, Default)]
struct Strip {
    bare: bool,
    /// Total from an unseparated `N/M text` prefix.
    position_of: Option<u32>,
}

/// A line whose numbering strip may have eaten real content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousStrip {
    /// Position of the tweet in the normalized output.
    pub index: usize,
    pub original: String,
    pub stripped: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedThread {
    pub tweets: Vec<String>,
    pub ambiguous: Vec<AmbiguousStrip>,
}

/// Split raw generated text into clean tweets.
///
/// Blank lines, standalone "thread" headers and leftover numbering fragments
/// ("1/5", "**1/5**") are dropped; numbering prefixes are removed from the rest.
pub fn parse_thread(raw: &str) -> Vec<String> {
    parse_thread_with_report(raw).tweets
}

/// Same as [`parse_thread`], but also reports strips that look ambiguous.
///
/// An unseparated `N/M text` prefix counts as numbering only when another
/// line carries the same total; on its own ("1/2 cup of flour") it is
/// stripped but reported, since it may be a fraction.
pub fn parse_thread_with_report(raw: &str) -> NormalizedThread {
    let mut thread = NormalizedThread::default();
    let mut positioned: Vec<(u32, AmbiguousStrip)> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cleaned, strip) = strip_numbering(line);
        let cleaned = cleaned.trim();

        if cleaned.is_empty()
            || STANDALONE_THREAD.is_match(cleaned)
            || NUMBERING_FRAGMENT.is_match(cleaned)
        {
            debug!(line, "Dropping non-content line");
            continue;
        }

        let candidate = AmbiguousStrip {
            index: thread.tweets.len(),
            original: line.to_string(),
            stripped: cleaned.to_string(),
        };
        if strip.bare && cleaned.split_whitespace().count() <= SHORT_REMAINDER_WORDS {
            thread.ambiguous.push(candidate);
        } else if let Some(total) = strip.position_of {
            positioned.push((total, candidate));
        }

        thread.tweets.push(cleaned.to_string());
    }

    for (total, candidate) in &positioned {
        let shared = positioned.iter().filter(|(t, _)| t == total).count() > 1;
        if !shared {
            thread.ambiguous.push(candidate.clone());
        }
    }
    thread.ambiguous.sort_by_key(|a| a.index);

    thread
}

/// Remove numbering prefixes from one line, noting which loose rules fired.
fn strip_numbering(line: &str) -> (&str, Strip) {
    let mut rest = line;
    let mut strip = Strip::default();

    for pattern in PREFIX_PATTERNS.iter() {
        if let Some(m) = pattern.find(rest) {
            rest = &rest[m.end()..];
        }
    }

    if let Some(caps) = POSITION_OF_TOTAL.captures(rest) {
        let position: u32 = caps[1].parse().unwrap_or(0);
        let total: u32 = caps[2].parse().unwrap_or(0);
        if position >= 1 && position <= total {
            rest = &rest[caps[0].len()..];
            strip.position_of = Some(total);
        }
    }

    if let Some(m) = BARE_NUMBERING.find(rest) {
        rest = &rest[m.end()..];
        strip.bare = true;
    }

    (rest, strip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_every_numbering_convention() {
        let cases = [
            "1/ Hello",
            "1. Hello",
            "1) Hello",
            "1: Hello",
            "Thread 1: Hello",
            "thread 1 - Hello",
            "THREAD 2: Hello",
            "**1/5** Hello",
            "**1/** Hello",
            "**1.** Hello",
            "**Tweet 1:** Hello",
            "Tweet 1: Hello",
            "(1/5) Hello",
            "[1/5] Hello",
            "1/5 - Hello",
            "1/5: Hello",
            "1/5 Hello",
            "**1/5**: Hello",
            "**2.** - Hello",
            "1/5 — Hello",
            "1/5 – Hello",
        ];

        for case in cases {
            assert_eq!(parse_thread(case), vec!["Hello".to_string()], "input: {case}");
        }
    }

    #[test]
    fn test_preserves_order_and_count() {
        let input = "1/ First tweet\n2/ Second tweet\n\n3/ Third tweet\n";
        let tweets = parse_thread(input);
        assert_eq!(tweets, vec!["First tweet", "Second tweet", "Third tweet"]);
    }

    #[test]
    fn test_mixed_conventions_in_one_thread() {
        let input = "**Tweet 1:** Start here\n(2/3) Then this\n3. And finally this";
        assert_eq!(
            parse_thread(input),
            vec!["Start here", "Then this", "And finally this"]
        );
    }

    #[test]
    fn test_leading_year_is_kept() {
        let tweets = parse_thread("2024 was the year AI changed everything");
        assert_eq!(tweets, vec!["2024 was the year AI changed everything"]);
    }

    #[test]
    fn test_numbers_without_separator_space_are_kept() {
        let input = "3.5 billion people use social media\n24/7 support matters\n10:30 is standup";
        assert_eq!(
            parse_thread(input),
            vec![
                "3.5 billion people use social media",
                "24/7 support matters",
                "10:30 is standup",
            ]
        );
    }

    #[test]
    fn test_three_digit_numbers_are_not_numbering() {
        assert_eq!(
            parse_thread("100. That is how many days it took"),
            vec!["100. That is how many days it took"]
        );
    }

    #[test]
    fn test_drops_standalone_thread_and_fragments() {
        let input = "Thread\n  THREAD  \n1/ Real content\n3/5\n**3/5**\n(4/5)\nMore content";
        let tweets = parse_thread(input);
        assert_eq!(tweets, vec!["Real content", "More content"]);
        assert!(tweets.iter().all(|t| !t.is_empty()));
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(parse_thread("").is_empty());
        assert!(parse_thread("\n\n   \n\t\n").is_empty());
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        assert_eq!(parse_thread("   1.   Padded tweet   "), vec!["Padded tweet"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(parse_thread("1/ One\r\n2/ Two\r\n"), vec!["One", "Two"]);
    }

    #[test]
    fn test_reports_short_remainders_as_ambiguous() {
        let report = parse_thread_with_report("1/ A full first tweet with content\n3. Big wins");
        assert_eq!(report.tweets.len(), 2);
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.ambiguous[0].index, 1);
        assert_eq!(report.ambiguous[0].original, "3. Big wins");
        assert_eq!(report.ambiguous[0].stripped, "Big wins");
    }

    #[test]
    fn test_lone_fraction_opener_is_reported() {
        let report = parse_thread_with_report("1/2 cup of flour is enough");
        assert_eq!(report.tweets, vec!["cup of flour is enough"]);
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.ambiguous[0].original, "1/2 cup of flour is enough");
        assert_eq!(report.ambiguous[0].stripped, "cup of flour is enough");
    }

    #[test]
    fn test_position_of_total_with_shared_total_is_not_ambiguous() {
        let report = parse_thread_with_report(
            "1/3 Opening thought here\n2/3 The middle part\n3/3 And the close",
        );
        assert_eq!(
            report.tweets,
            vec!["Opening thought here", "The middle part", "And the close"]
        );
        assert!(report.ambiguous.is_empty());
    }

    #[test]
    fn test_ambiguous_entries_are_in_thread_order() {
        let report = parse_thread_with_report("1/2 cup of sugar goes in\n3. Big wins");
        let indexes: Vec<usize> = report.ambiguous.iter().map(|a| a.index).collect();
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn test_unnumbered_lines_are_not_ambiguous() {
        let report = parse_thread_with_report("Short one\nAnother");
        assert!(report.ambiguous.is_empty());
    }
}
