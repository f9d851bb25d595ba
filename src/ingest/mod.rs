// src/ingest/mod.rs
pub mod discord;
pub mod types;

use crate::ingest::types::RawMessage;

/// Flatten a message into a single cleaned string: content first, then every
/// embed's title, description, field names/values and footer, in that order,
/// skipping empty parts. Pure; absent input yields the empty string.
pub fn message_text(msg: &RawMessage) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.push(&msg.content);
    for e in &msg.embeds {
        if let Some(t) = &e.title {
            parts.push(t);
        }
        if let Some(d) = &e.description {
            parts.push(d);
        }
        for f in &e.fields {
            parts.push(&f.name);
            parts.push(&f.value);
        }
        if let Some(footer) = &e.footer {
            if let Some(t) = &footer.text {
                parts.push(t);
            }
        }
    }
    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    clean_markdown(&joined)
}

/// Normalize chat markup to flat plain text: strip carriage returns, resolve
/// HTML entities, reduce `[label](target)` links to their label, drop
/// emphasis/code markers, collapse horizontal whitespace runs, trim each line
/// and the whole result. Applying it twice is a no-op.
pub fn clean_markdown(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let mut out = s.replace('\r', "");
    out = html_escape::decode_html_entities(&out).to_string();

    static RE_LINK: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_link = RE_LINK.get_or_init(|| regex::Regex::new(r"\[([^\]]+)\]\((?:[^)]+)\)").unwrap());
    out = re_link.replace_all(&out, "$1").to_string();

    static RE_MARK: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_mark = RE_MARK.get_or_init(|| regex::Regex::new(r"[*_`~]+").unwrap());
    out = re_mark.replace_all(&out, "").to_string();

    // Horizontal whitespace only; newlines are the line structure the
    // extractor's section rules depend on.
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[ \t\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out = out
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{Embed, EmbedField, EmbedFooter};

    #[test]
    fn markup_is_stripped_and_whitespace_collapsed() {
        let s = "**BTC/USDT**   LONG\r\n[chart](https://example.test/c)  &amp; more\t\u{00A0}text";
        let out = clean_markdown(s);
        assert_eq!(out, "BTC/USDT LONG\nchart & more text");
    }

    #[test]
    fn normalization_is_a_fixed_point() {
        let inputs = [
            "**ETH** SHORT Signal\nEntry: 1,234.5",
            "  Coin:  SOL \n Direction: LONG ",
            "plain text, nothing fancy",
            "",
        ];
        for s in inputs {
            let once = clean_markdown(s);
            assert_eq!(clean_markdown(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(clean_markdown(""), "");
    }

    #[test]
    fn embeds_flatten_in_fixed_order() {
        let msg = RawMessage {
            id: 1,
            content: "head".into(),
            embeds: vec![Embed {
                title: Some("**Alert**".into()),
                description: Some("desc".into()),
                fields: vec![EmbedField {
                    name: "Entry".into(),
                    value: "$ 50,000".into(),
                }],
                footer: Some(EmbedFooter {
                    text: Some("foot".into()),
                }),
            }],
        };
        assert_eq!(message_text(&msg), "head\nAlert\ndesc\nEntry\n$ 50,000\nfoot");
    }

    #[test]
    fn empty_parts_are_skipped() {
        let msg = RawMessage {
            id: 1,
            content: String::new(),
            embeds: vec![Embed {
                title: Some("only title".into()),
                description: None,
                fields: vec![],
                footer: None,
            }],
        };
        assert_eq!(message_text(&msg), "only title");
    }
}
