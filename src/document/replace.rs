/// Placeholder insertion and replacement
use crate::{
    document::{Document, TextRange},
    error::{UploadError, UploadResult},
    links::{parse_links, MediaLink},
};

/// How far (in characters) to look for `|` on each side of a span
const TABLE_WINDOW: usize = 64;

/// Whether `range` sits between `|` characters on its own line, i.e. inside a table cell
pub fn in_table_context(text: &str, range: &TextRange) -> bool {
    let line_start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[range.end..]
        .find('\n')
        .map_or(text.len(), |i| range.end + i);

    let before = &text[line_start..range.start];
    let after = &text[range.end..line_end];

    before.chars().rev().take(TABLE_WINDOW).any(|c| c == '|')
        && after.chars().take(TABLE_WINDOW).any(|c| c == '|')
}

/// Make markup safe to place inside a table cell
fn escape_for_table(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut prev = None;
    for c in markup.chars() {
        match c {
            '|' if prev != Some('\\') => out.push_str("\\|"),
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
        prev = Some(c);
    }
    out
}

/// Insert text at the cursor and move the cursor past it
///
/// Inside a table row the trailing newline is dropped so the row stays intact.
pub fn insert_at_cursor(doc: &mut dyn Document, text: &str) -> UploadResult<TextRange> {
    let cursor = doc.cursor();
    let full = doc.text();
    let cursor = cursor.min(full.len());

    let insertion = if in_table_context(&full, &(cursor..cursor)) {
        text.trim_end_matches('\n')
    } else {
        text
    };

    doc.replace_range(cursor..cursor, insertion)?;
    doc.set_cursor(cursor + insertion.len());
    Ok(cursor..cursor + insertion.len())
}

/// Find `token` in the current text and replace it with `markup`
///
/// The position is looked up fresh on every call. A missing token yields
/// `PlaceholderNotFound`, which callers treat as "already resolved".
pub fn replace_placeholder(doc: &mut dyn Document, token: &str, markup: &str) -> UploadResult<()> {
    let token = token.trim();
    let Some(range) = doc.find(token) else {
        return Err(UploadError::PlaceholderNotFound(token.to_string()));
    };

    let text = doc.text();
    let replacement = if in_table_context(&text, &range) {
        escape_for_table(markup)
    } else {
        markup.to_string()
    };

    doc.replace_range(range, &replacement)
}

/// Replace every link in `doc` with the same syntax, embed flag and target as `link`
///
/// Spans come from the link parser, so `[[a.png]]` never matches inside
/// `![[a.png]]`. Replaces from the last match backwards so earlier spans stay
/// valid. Returns the number of links replaced.
pub fn replace_links(doc: &mut dyn Document, link: &MediaLink, replacement: &str) -> UploadResult<usize> {
    let spans: Vec<TextRange> = parse_links(&doc.text())
        .into_iter()
        .filter(|l| l.kind == link.kind && l.is_embed == link.is_embed && l.path == link.path)
        .map(|l| l.span)
        .collect();

    for span in spans.iter().rev() {
        let text = doc.text();
        let replacement = if in_table_context(&text, span) {
            escape_for_table(replacement)
        } else {
            replacement.to_string()
        };
        doc.replace_range(span.clone(), &replacement)?;
    }

    Ok(spans.len())
}
