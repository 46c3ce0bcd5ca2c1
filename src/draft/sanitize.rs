//! Draft content sanitization.
//!
//! Every mutation path runs through [`sanitize`] before its result becomes
//! current draft content, so the engine never holds raw externally supplied
//! markup. The function is total (always returns a string) and idempotent:
//! re-sanitizing its own output is a fixed point. Idempotence is what lets
//! callers re-run it defensively on load, import, and restore without
//! degrading stored content.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use regex::{Captures, Regex};

/// Structural and inline tags that survive filtering.
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "b", "em", "i", "u", "h1", "h2", "h3", "h4", "ul", "ol", "li", "span",
];

/// Attributes that survive filtering: a style class plus the anchors for
/// evidence citations, inline comments, and tracked changes.
const ALLOWED_ATTRS: &[&str] = &["class", "data-citation-id", "data-comment-id", "data-change-id"];

/// Elements whose content is removed along with the tags themselves.
const DANGEROUS_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed", "noscript"];

// Input encodings of a non-breaking space. The `&nbsp;` entity is this
// module's own output form for indentation and must not appear here, or
// sanitizing twice would widen what sanitizing once produced.
static NBSP_FORMS: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(["\u{a0}", "&#160;", "&#xa0;"])
        .expect("nbsp patterns compile")
});

static BLOCK_MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(p|br|div|h[1-6]|ul|ol|li|blockquote)[\s/>]").expect("block markup pattern")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(-->|$)").expect("comment pattern"));

static DECLARATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[!?][^>]*>").expect("declaration pattern"));

static DANGEROUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = DANGEROUS_ELEMENTS
        .iter()
        .map(|tag| format!(r"<{tag}\b[^>]*>.*?</{tag}\s*>"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?is){alternation}")).expect("dangerous element pattern")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?P<close>/?)(?P<name>[A-Za-z][A-Za-z0-9]*)(?P<attrs>[^>]*)>")
        .expect("tag pattern")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<name>[A-Za-z][A-Za-z0-9-]*)\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'>]+))"#,
    )
    .expect("attribute pattern")
});

static PARAGRAPH_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n+").expect("paragraph split pattern"));

static SPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"  +").expect("space run pattern"));

/// Convert untrusted plain text or externally supplied HTML into the
/// restricted HTML subset the draft engine stores and renders.
pub fn sanitize(raw: &str) -> String {
    let normalized = NBSP_FORMS.replace_all(raw, &[" ", " ", " "]);
    let html = if BLOCK_MARKUP_RE.is_match(&normalized) {
        normalized
    } else {
        plain_text_to_html(&normalized)
    };
    let filtered = filter_markup(&html);
    // Filtering can strip every block container (a bare div wrapper, say)
    // and leave inline-only output; re-wrap it so the result renders as a
    // paragraph and a second pass classifies it the same way.
    if !filtered.is_empty() && !BLOCK_MARKUP_RE.is_match(&filtered) {
        format!("<p>{filtered}</p>")
    } else {
        filtered
    }
}

/// Escape metacharacters and re-shape plain text into paragraphs, line
/// breaks, and `&nbsp;` indentation runs so legal-document layout survives
/// rendering.
fn plain_text_to_html(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\t', "    ");
    let text = text.trim_matches('\n');
    if text.trim().is_empty() {
        return String::new();
    }

    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    let mut out = String::with_capacity(escaped.len() + 16);
    for paragraph in PARAGRAPH_SPLIT_RE.split(&escaped) {
        if paragraph.trim().is_empty() {
            continue;
        }
        out.push_str("<p>");
        let mut first = true;
        for line in paragraph.split('\n') {
            if !first {
                out.push_str("<br>");
            }
            first = false;
            out.push_str(&preserve_indentation(line));
        }
        out.push_str("</p>");
    }
    out
}

/// Leading spaces become `&nbsp;` runs; interior runs of two or more spaces
/// keep one breaking space and harden the rest.
fn preserve_indentation(line: &str) -> String {
    let lead = line.len() - line.trim_start_matches(' ').len();
    let (indent, rest) = line.split_at(lead);
    let mut out = "&nbsp;".repeat(indent.len());
    out.push_str(&SPACE_RUN_RE.replace_all(rest, |caps: &Captures<'_>| {
        let run = caps.get(0).map(|m| m.len()).unwrap_or(0);
        format!(" {}", "&nbsp;".repeat(run.saturating_sub(1)))
    }));
    out
}

/// Allowlist filter. Kept tags are re-emitted canonically (lowercase names,
/// double-quoted attributes in source order) so the filter is a fixed point
/// over its own output.
fn filter_markup(html: &str) -> String {
    let stripped = COMMENT_RE.replace_all(html, "");
    let stripped = DANGEROUS_RE.replace_all(&stripped, "");
    let stripped = DECLARATION_RE.replace_all(&stripped, "");
    let html: &str = &stripped;

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for caps in TAG_RE.captures_iter(html) {
        let whole = caps.get(0).expect("regex match");
        push_text_segment(&mut out, &html[last..whole.start()]);
        push_filtered_tag(&mut out, &caps);
        last = whole.end();
    }
    push_text_segment(&mut out, &html[last..]);
    out
}

/// Text between tags. Any angle bracket left here did not parse as a tag and
/// is escaped so it cannot open one downstream.
fn push_text_segment(out: &mut String, segment: &str) {
    if segment.contains(['<', '>']) {
        out.push_str(&segment.replace('<', "&lt;").replace('>', "&gt;"));
    } else {
        out.push_str(segment);
    }
}

fn push_filtered_tag(out: &mut String, caps: &Captures<'_>) {
    let name = caps["name"].to_ascii_lowercase();
    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return;
    }
    if !caps["close"].is_empty() {
        // Void element: a stray </br> has no meaning worth keeping.
        if name != "br" {
            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        }
        return;
    }

    out.push('<');
    out.push_str(&name);
    for attr in ATTR_RE.captures_iter(&caps["attrs"]) {
        let attr_name = attr["name"].to_ascii_lowercase();
        if !ALLOWED_ATTRS.contains(&attr_name.as_str()) {
            continue;
        }
        let value = attr
            .name("dq")
            .or_else(|| attr.name("sq"))
            .or_else(|| attr.name("bare"))
            .map(|m| m.as_str())
            .unwrap_or("");
        // Quote-safety by removal, not escaping: escaping would not be
        // stable under a second pass.
        let value: String = value
            .chars()
            .filter(|c| !matches!(c, '"' | '<' | '>'))
            .collect();
        out.push(' ');
        out.push_str(&attr_name);
        out.push_str("=\"");
        out.push_str(&value);
        out.push('"');
    }
    out.push('>');
}
