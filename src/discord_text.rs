use regex::Regex;
use std::sync::LazyLock;

static REMEMBER_AS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bremember\s+as\s+([A-Za-z0-9_\-]+)").expect("valid remember pattern")
});

static USING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\busing\s+([A-Za-z0-9_\-]+)").expect("valid using pattern"));

pub fn strip_bot_mentions(input: &str, bot_id: u64) -> String {
    let mention = format!("<@{}>", bot_id);
    let mention_nick = format!("<@!{}>", bot_id);

    input
        .replace(&mention, "")
        .replace(&mention_nick, "")
        .trim()
        .to_string()
}

/// Memory label named by `remember as <label>` or, failing that, `using <label>`.
pub fn parse_label(input: &str) -> Option<String> {
    REMEMBER_AS
        .captures(input)
        .or_else(|| USING.captures(input))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether the message asks to store its attachments.
pub fn wants_remember(input: &str) -> bool {
    REMEMBER_AS.is_match(input)
}

/// The question with the bot mention and memory control phrases removed.
pub fn clean_question(input: &str, bot_id: u64) -> String {
    let text = strip_bot_mentions(input, bot_id);
    let text = REMEMBER_AS.replace_all(&text, "");
    let text = USING.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits text into chunks of at most `limit` characters, breaking on lines
/// where possible and inside a line only when it alone exceeds the limit.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
        } else {
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(limit).map(|c| c.iter().collect::<String>()).peekable();
            while let Some(piece) = pieces.next() {
                if pieces.peek().is_some() {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("remember as project-docs please"), Some("project-docs".to_string()));
        assert_eq!(parse_label("what is in it? using notes_v2"), Some("notes_v2".to_string()));
        assert_eq!(
            parse_label("Remember As first then using second"),
            Some("first".to_string())
        );
        assert_eq!(parse_label("just a question"), None);
        assert!(wants_remember("<@1> REMEMBER as specs"));
        assert!(!wants_remember("using specs"));
    }

    #[test]
    fn test_clean_question() {
        assert_eq!(
            clean_question("<@42> what does it say? using notes", 42),
            "what does it say?"
        );
        assert_eq!(clean_question("<@!42>   remember as docs  ", 42), "");
        assert_eq!(clean_question("<@42>", 42), "");
        assert_eq!(
            clean_question("hey <@7> what is  $SOL", 42),
            "hey <@7> what is $SOL"
        );
    }

    #[test]
    fn test_split_message() {
        let text = "line one\nline two\nline three";
        assert_eq!(split_message(text, 100), vec![text.to_string()]);

        let chunks = split_message(text, 17);
        assert_eq!(chunks, vec!["line one\nline two", "line three"]);

        let long = "a".repeat(25);
        let chunks = split_message(&long, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), long);
    }
}
