//! Text shaping for MarkdownV2 result bodies

use unicode_segmentation::UnicodeSegmentation;

/// Clusters kept in a card title
pub const TITLE_CLUSTERS: usize = 64;
/// Clusters kept in a quoted body
pub const BODY_CLUSTERS: usize = 2048;
/// Appended when text was cut
pub const ELLIPSIS: char = '…';

/// Characters MarkdownV2 treats as markup
pub const MARKDOWN_V2_RESERVED: [char; 18] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Keep at most `max` grapheme clusters, appending `…` when anything was dropped.
///
/// Never splits a cluster, so emoji sequences and combining marks survive intact.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + ELLIPSIS.len_utf8());
            truncated.push_str(&text[..cut]);
            truncated.push(ELLIPSIS);
            truncated
        }
        None => text.to_string(),
    }
}

/// Backslash-escape every MarkdownV2 reserved character.
///
/// A literal backslash is escaped too, otherwise it would swallow the next character.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || MARKDOWN_V2_RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render text as a MarkdownV2 expandable block quote
pub fn expandable_quote(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.len() - 1;

    let mut quote = String::with_capacity(text.len() + lines.len() * 2 + 4);
    for (i, line) in lines.iter().enumerate() {
        quote.push_str(if i == 0 { "**>" } else { ">" });
        quote.push_str(&escape_markdown_v2(line));
        if i == last {
            quote.push_str("||");
        } else {
            quote.push('\n');
        }
    }
    quote
}

/// Append a `[Via name](link)` attribution line
pub fn via_line(body: &str, full_name: &str, link: &str) -> String {
    format!("{}\n[Via {}]({})", body, escape_markdown_v2(full_name), link)
}
