//! Heading-derived anchor ids.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::AnchorId;

/// Named or numeric character reference at the start of the input.
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^&(?:#([0-9]{1,7})|#[xX]([0-9A-Fa-f]{1,6})|([A-Za-z][A-Za-z0-9]{1,31}));").expect("valid regex");
});

/// Raw HTML tag at the start of the input.
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^</?[A-Za-z][^>]*>").expect("valid regex");
});

/// Matches an inline link or image so only its text survives slugging.
static INLINE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex");
});

/// Hands out unique anchor ids within one document, suffixing repeats
/// with `-1`, `-2`, ... in the order headings appear.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    /// How many times each base slug has been handed out.
    seen: HashMap<String, u32>,
}

impl AnchorRegistry {
    /// Return the unique id for the next heading with this base slug.
    pub fn assign(&mut self, slug: &str) -> AnchorId {
        let count = self.seen.entry(slug.to_string()).or_insert(0);
        let id = if *count == 0 {
            slug.to_string()
        } else {
            format!("{slug}-{count}")
        };
        *count = count.saturating_add(1);
        return AnchorId(id);
    }
}

/// A maximal run of identical emphasis delimiters, as glyph indices.
struct DelimiterRun {
    /// `*` or `_`.
    ch: char,
    /// One past the last glyph of the run.
    end: usize,
    /// First glyph of the run.
    start: usize,
}

impl DelimiterRun {
    /// Whether the run can open and whether it can close emphasis.
    fn flanking(&self, glyphs: &[Glyph]) -> (bool, bool) {
        let prev = self.start.checked_sub(1).and_then(|i| return glyphs.get(i)).map(|g| return g.ch);
        let next = glyphs.get(self.end).map(|g| return g.ch);

        let prev_space = prev.is_none_or(char::is_whitespace);
        let next_space = next.is_none_or(char::is_whitespace);
        let prev_punct = prev.is_some_and(|c| return c.is_ascii_punctuation());
        let next_punct = next.is_some_and(|c| return c.is_ascii_punctuation());

        let left = !next_space && (!next_punct || prev_space || prev_punct);
        let right = !prev_space && (!prev_punct || next_space || next_punct);
        if self.ch == '_' {
            return (left && (!right || prev_punct), right && (!left || next_punct));
        }
        return (left, right);
    }
}

/// One rendered character of heading text.
#[derive(Clone, Copy)]
struct Glyph {
    /// The character as it renders.
    ch: char,
    /// Unescaped `*` or `_` outside a code span.
    delimiter: bool,
}

impl Glyph {
    /// A character that can never delimit emphasis.
    const fn literal(ch: char) -> Self {
        return Self { ch, delimiter: false };
    }
}

/// Push the contents of a code span starting at `rest`, returning the bytes consumed.
/// An unclosed backtick run is literal text.
fn code_span(rest: &str, out: &mut Vec<Glyph>) -> usize {
    let ticks = rest.len().saturating_sub(rest.trim_start_matches('`').len());
    let after = rest.get(ticks..).unwrap_or("");

    let mut run_start = None;
    let sentinel = std::iter::once((after.len(), '\n'));
    for (i, c) in after.char_indices().chain(sentinel) {
        match (c == '`', run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) if i.saturating_sub(start) == ticks => {
                let content = after.get(..start).unwrap_or("");
                let trimmed = content
                    .strip_prefix(' ')
                    .and_then(|c| return c.strip_suffix(' '))
                    .filter(|c| return !c.trim().is_empty())
                    .unwrap_or(content);
                out.extend(trimmed.chars().map(Glyph::literal));
                return ticks.saturating_mul(2).saturating_add(start);
            },
            (false, Some(_)) => run_start = None,
            _ => {},
        }
    }

    out.extend(std::iter::repeat_n(Glyph::literal('`'), ticks));
    return ticks;
}

/// Decode a character reference at the start of `rest` into its character
/// and byte length.
fn decode_entity(rest: &str) -> Option<(char, usize)> {
    let caps = ENTITY.captures(rest)?;
    let len = caps.get(0)?.len();
    let ch = match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(dec), _, _) => dec.as_str().parse().ok().and_then(char::from_u32),
        (_, Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32),
        (_, _, Some(name)) => named_entity(name.as_str()),
        _ => None,
    }?;
    return Some((ch, len));
}

/// Group consecutive delimiter glyphs of the same character.
fn delimiter_runs(glyphs: &[Glyph]) -> Vec<DelimiterRun> {
    let mut runs: Vec<DelimiterRun> = Vec::new();
    for (i, glyph) in glyphs.iter().enumerate() {
        if !glyph.delimiter {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.end == i && run.ch == glyph.ch => run.end = i.saturating_add(1),
            _ => runs.push(DelimiterRun {
                ch: glyph.ch,
                end: i.saturating_add(1),
                start: i,
            }),
        }
    }
    return runs;
}

/// Resolve backslash escapes, code spans, HTML tags and character references.
fn glyphs(text: &str) -> Vec<Glyph> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let consumed = match c {
            '\\' => match rest.chars().nth(1) {
                Some(next) if next.is_ascii_punctuation() => {
                    out.push(Glyph::literal(next));
                    2
                },
                _ => {
                    out.push(Glyph::literal('\\'));
                    1
                },
            },
            '`' => code_span(rest, &mut out),
            '&' => match decode_entity(rest) {
                Some((decoded, len)) => {
                    out.push(Glyph::literal(decoded));
                    len
                },
                None => {
                    out.push(Glyph::literal('&'));
                    1
                },
            },
            '<' => match HTML_TAG.find(rest) {
                Some(tag) => tag.len(),
                None => {
                    out.push(Glyph::literal('<'));
                    1
                },
            },
            _ => {
                out.push(Glyph {
                    ch: c,
                    delimiter: c == '*' || c == '_',
                });
                c.len_utf8()
            },
        };
        rest = rest.get(consumed..).unwrap_or("");
    }
    return out;
}

/// Character for the named references headings commonly use.
fn named_entity(name: &str) -> Option<char> {
    let ch = match name {
        "amp" => '&',
        "apos" => '\'',
        "copy" => '©',
        "gt" => '>',
        "hellip" => '…',
        "larr" => '←',
        "lt" => '<',
        "mdash" => '—',
        "nbsp" => '\u{a0}',
        "ndash" => '–',
        "quot" => '"',
        "rarr" => '→',
        "reg" => '®',
        "times" => '×',
        "trade" => '™',
        _ => return None,
    };
    return Some(ch);
}

/// Reduce an id to lowercase alphanumerics so near-misses compare equal
/// (`async-await`, `Async_Await` and `asyncawait` all become `asyncawait`).
pub fn normalize_for_match(id: &str) -> String {
    return id
        .chars()
        .filter(|c| return c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
}

/// Heading source as it renders: links reduced to their text, tags dropped,
/// escapes and references resolved, and emphasis delimiters removed.
fn render_inline(text: &str) -> String {
    let without_links = INLINE_LINK.replace_all(text, "$1");
    let glyphs = glyphs(&without_links);
    let runs = delimiter_runs(&glyphs);

    let mut matched = vec![false; runs.len()];
    let mut openers: Vec<usize> = Vec::new();
    for (idx, run) in runs.iter().enumerate() {
        let (can_open, can_close) = run.flanking(&glyphs);
        let opener = openers
            .iter()
            .rposition(|&o| return runs.get(o).is_some_and(|r| return r.ch == run.ch))
            .filter(|_| return can_close);
        if let Some(pos) = opener {
            for paired in [openers.get(pos).copied(), Some(idx)].into_iter().flatten() {
                if let Some(flag) = matched.get_mut(paired) {
                    *flag = true;
                }
            }
            openers.truncate(pos);
        } else if can_open {
            openers.push(idx);
        }
    }

    let mut hidden = vec![false; glyphs.len()];
    for run in runs.iter().zip(&matched).filter(|(_, m)| return **m).map(|(r, _)| return r) {
        for flag in hidden.iter_mut().take(run.end).skip(run.start) {
            *flag = true;
        }
    }
    return glyphs
        .iter()
        .zip(&hidden)
        .filter(|(_, h)| return !**h)
        .map(|(g, _)| return g.ch)
        .collect();
}

/// Convert heading text to the anchor id GitHub would generate.
///
/// The heading is first reduced to its rendered text (see `render_inline`).
/// The rest is lowercased; alphanumerics, `-` and `_` are kept, each space
/// becomes `-`, and everything else is removed. Runs of hyphens are not
/// collapsed.
pub fn slugify(text: &str) -> String {
    let rendered = render_inline(text);

    let mut result = String::with_capacity(rendered.len());
    for c in rendered.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            result.push(c);
        } else if c == ' ' {
            result.push('-');
        }
    }
    return result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_heading() {
        assert_eq!(slugify("Promises"), "promises");
    }

    #[test]
    fn multi_word() {
        assert_eq!(slugify("The Event Loop"), "the-event-loop");
    }

    #[test]
    fn punctuation_is_dropped_not_hyphenated() {
        assert_eq!(slugify("Async/Await"), "asyncawait");
        assert_eq!(slugify("What's New?"), "whats-new");
    }

    #[test]
    fn hyphen_runs_are_kept() {
        assert_eq!(slugify("Call & Apply"), "call--apply");
    }

    #[test]
    fn inline_markup_is_stripped() {
        assert_eq!(slugify("`Array.prototype.map()`"), "arrayprototypemap");
        assert_eq!(slugify("See [MDN](https://developer.mozilla.org) docs"), "see-mdn-docs");
        assert_eq!(slugify("<code>this</code> binding"), "this-binding");
    }

    #[test]
    fn emphasis_delimiters_are_removed() {
        assert_eq!(slugify("The _this_ Keyword"), "the-this-keyword");
        assert_eq!(slugify("**Bold** move"), "bold-move");
        assert_eq!(slugify("__init__ method"), "init-method");
        assert_eq!(slugify("A *very* _long_ title"), "a-very-long-title");
    }

    #[test]
    fn literal_underscores_are_kept() {
        assert_eq!(slugify("snake_case helpers"), "snake_case-helpers");
        assert_eq!(slugify("`__init__` method"), "__init__-method");
        assert_eq!(slugify(r"snake\_case"), "snake_case");
        assert_eq!(slugify("_private fields"), "_private-fields");
        assert_eq!(slugify("a _ b"), "a-_-b");
    }

    #[test]
    fn entities_are_decoded_before_filtering() {
        assert_eq!(slugify("Call &amp; Apply"), "call--apply");
        assert_eq!(slugify("&lt;div&gt; wrapper"), "div-wrapper");
        assert_eq!(slugify("Caf&#233; &#x26; Bar"), "café--bar");
        assert_eq!(slugify("Tom &amp Jerry"), "tom-amp-jerry");
    }

    #[test]
    fn backslash_escapes_render_their_character() {
        assert_eq!(slugify(r"Escaped \*stars\*"), "escaped-stars");
        assert_eq!(slugify(r"Path C:\Users"), "path-cusers");
    }

    #[test]
    fn code_spans_keep_markup_literal() {
        assert_eq!(slugify("The `<div>` element"), "the-div-element");
        assert_eq!(slugify("`&amp;` in code"), "amp-in-code");
        assert_eq!(slugify("Unclosed ` tick"), "unclosed--tick");
    }

    #[test]
    fn unicode_letters_survive() {
        assert_eq!(slugify("Émile's Über Guide"), "émiles-über-guide");
    }

    #[test]
    fn empty_string() {
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn registry_suffixes_repeats() {
        let mut registry = AnchorRegistry::default();
        assert_eq!(registry.assign("example").0, "example");
        assert_eq!(registry.assign("example").0, "example-1");
        assert_eq!(registry.assign("other").0, "other");
        assert_eq!(registry.assign("example").0, "example-2");
    }

    #[test]
    fn normalization_ignores_separators_and_case() {
        assert_eq!(normalize_for_match("Async-Await"), normalize_for_match("asyncawait"));
        assert_ne!(normalize_for_match("promises"), normalize_for_match("promise"));
    }
}
