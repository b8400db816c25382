//! Removal of "Domain basic" sections from policy documents.
//!
//! A policy document is split into sections by top-level `##` headers. Sections
//! titled "Domain basic" describe the simulated environment rather than the
//! agent's obligations, so they are cut before the text is used as a rule corpus.
//!
//! The scan is a two-state line automaton. Header recognition is hand-written so
//! the result does not depend on the behavior of any particular regex engine.

/// Scanner state while walking a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Keeping,
    Skipping,
}

/// Classification of a single policy line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A top-level header titled "Domain basic".
    DomainBasicHeader,

    /// Any other top-level (`##`, not `###`) header.
    SectionHeader,

    /// Body text, including deeper headers.
    Body,
}

/// Classify a line (with or without its terminator).
pub fn classify_line(line: &str) -> LineKind {
    let Some(title) = line.strip_prefix("##") else {
        return LineKind::Body;
    };

    if title.starts_with('#') {
        return LineKind::Body;
    }

    if is_domain_basic_title(title) {
        LineKind::DomainBasicHeader
    } else {
        LineKind::SectionHeader
    }
}

/// Matches `\s*domain\s+basic\s*\b`, case-insensitively, at the start of `title`.
fn is_domain_basic_title(title: &str) -> bool {
    let Some(rest) = strip_prefix_ignore_case(title.trim_start(), "domain") else {
        return false;
    };

    let after_gap = rest.trim_start();
    if after_gap.len() == rest.len() {
        return false;
    }

    let Some(rest) = strip_prefix_ignore_case(after_gap, "basic") else {
        return false;
    };

    // "basic" must end on a word boundary: "Domain basics" is a different section.
    match rest.chars().next() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '_'),
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Whether `c` ends a line: `\n`, `\r`, vertical tab, form feed, the
/// file/group/record separators, NEL, and the Unicode line and paragraph
/// separators.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Lines of `text`, each keeping its terminator. `\r\n` is one terminator;
/// every other break character ends a line on its own.
fn lines_inclusive(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }

        let end = match rest.char_indices().find(|&(_, c)| is_line_break(c)) {
            Some((i, '\r')) if rest[i + 1..].starts_with('\n') => i + 2,
            Some((i, c)) => i + c.len_utf8(),
            None => rest.len(),
        };

        let (line, tail) = rest.split_at(end);
        rest = tail;
        Some(line)
    })
}

/// Remove every "Domain basic" section, header included.
///
/// A removed section extends up to, but not including, the next top-level
/// header; if none follows, it extends to the end of the document. Line endings
/// of kept lines are preserved exactly.
pub fn filter_domain_basic(text: &str) -> String {
    let mut state = ScanState::Keeping;
    let mut kept = String::with_capacity(text.len());
    let mut removed_lines = 0usize;

    for line in lines_inclusive(text) {
        state = match classify_line(line) {
            LineKind::DomainBasicHeader => ScanState::Skipping,
            LineKind::SectionHeader => ScanState::Keeping,
            LineKind::Body => state,
        };

        match state {
            ScanState::Keeping => kept.push_str(line),
            ScanState::Skipping => removed_lines += 1,
        }
    }

    if removed_lines > 0 {
        tracing::debug!(removed_lines, "Removed domain-basic policy sections");
    }

    kept
}

/// Whether the document contains at least one "Domain basic" header.
pub fn has_domain_basic(text: &str) -> bool {
    lines_inclusive(text).any(|line| classify_line(line) == LineKind::DomainBasicHeader)
}
