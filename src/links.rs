/// Media link parser
///
/// Recognizes the two link syntaxes notes use to reference attachments:
/// - Wikilinks: `![[path]]`, `![[path|alt]]`, `[[path#heading|alt]]`
/// - Inline links: `![alt](path)`, `![alt](<path with spaces>)`, `![alt](path "title")`
///
/// Both produce a [`MediaLink`] with the same fields, so callers never match
/// on raw syntax themselves. Links inside code spans and fenced blocks are skipped.
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static WIKILINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[\[([^\]\n]+)\]\]").expect("wikilink regex"));

static INLINE_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]\n]*)\]\((?:<([^>\n]*)>|([^()\s]+))(?:\s+"[^"\n]*")?\)"#)
        .expect("inline link regex")
});

static CODE_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^```[\s\S]*?^```|`[^`\n]+`").expect("code block regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `[[path|alt]]`
    Wiki,
    /// `[alt](path)`
    Inline,
}

/// A link found in note text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLink {
    pub kind: LinkKind,
    /// Leading `!`
    pub is_embed: bool,
    /// Link target as written (angle brackets and `#fragment` stripped)
    pub path: String,
    /// Wikilink alias or inline alt text
    pub alt_text: Option<String>,
    /// Byte range of the whole link in the source text
    pub span: Range<usize>,
}

impl MediaLink {
    /// Whether the link points into the vault rather than at a URL
    pub fn is_local(&self) -> bool {
        !self.path.contains("://") && !self.path.starts_with("data:")
    }

    /// Target with percent-escapes decoded (inline links may encode spaces)
    pub fn decoded_path(&self) -> String {
        match self.kind {
            LinkKind::Inline => urlencoding::decode(&self.path)
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| self.path.clone()),
            LinkKind::Wiki => self.path.clone(),
        }
    }

    /// Source text of the link
    pub fn source<'a>(&self, text: &'a str) -> &'a str {
        &text[self.span.clone()]
    }

    /// Render this link with a different description, keeping its syntax
    pub fn render_with_alt(&self, alt: &str) -> String {
        let bang = if self.is_embed { "!" } else { "" };
        match self.kind {
            LinkKind::Wiki if alt.is_empty() => format!("{}[[{}]]", bang, self.path),
            LinkKind::Wiki => format!("{}[[{}|{}]]", bang, self.path, alt),
            LinkKind::Inline => {
                let dest = if self.path.contains([' ', '(', ')']) {
                    format!("<{}>", self.path)
                } else {
                    self.path.clone()
                };
                format!("{}[{}]({})", bang, alt, dest)
            }
        }
    }
}

fn code_ranges(text: &str) -> Vec<Range<usize>> {
    CODE_BLOCK_REGEX.find_iter(text).map(|m| m.range()).collect()
}

fn in_code(ranges: &[Range<usize>], offset: usize) -> bool {
    ranges.iter().any(|r| r.contains(&offset))
}

fn strip_fragment(target: &str) -> &str {
    target.split('#').next().unwrap_or(target).trim()
}

/// Parse every wikilink and inline link in `text`, ordered by position
pub fn parse_links(text: &str) -> Vec<MediaLink> {
    let code = code_ranges(text);
    let mut links = Vec::new();

    for cap in WIKILINK_REGEX.captures_iter(text) {
        let Some(whole) = cap.get(0) else { continue };
        if in_code(&code, whole.start()) {
            continue;
        }

        let inner = cap.get(2).map_or("", |m| m.as_str());
        let (target, alias) = match inner.split_once('|') {
            Some((target, alias)) => (target, Some(alias.trim().to_string())),
            None => (inner, None),
        };
        let path = strip_fragment(target);
        if path.is_empty() {
            continue;
        }

        links.push(MediaLink {
            kind: LinkKind::Wiki,
            is_embed: cap.get(1).is_some_and(|m| !m.as_str().is_empty()),
            path: path.to_string(),
            alt_text: alias,
            span: whole.range(),
        });
    }

    for cap in INLINE_LINK_REGEX.captures_iter(text) {
        let Some(whole) = cap.get(0) else { continue };
        if in_code(&code, whole.start()) {
            continue;
        }
        // `[[a]](b)` is a wikilink followed by text, not an inline link
        if links.iter().any(|l: &MediaLink| l.span.contains(&whole.start())) {
            continue;
        }

        let target = cap
            .get(3)
            .or_else(|| cap.get(4))
            .map_or("", |m| m.as_str());
        let path = strip_fragment(target);
        if path.is_empty() {
            continue;
        }

        let alt = cap.get(2).map_or("", |m| m.as_str());
        links.push(MediaLink {
            kind: LinkKind::Inline,
            is_embed: cap.get(1).is_some_and(|m| !m.as_str().is_empty()),
            path: path.to_string(),
            alt_text: if alt.is_empty() { None } else { Some(alt.to_string()) },
            span: whole.range(),
        });
    }

    links.sort_by_key(|l| l.span.start);
    links
}
