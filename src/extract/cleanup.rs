//! Deterministic tidy-up of model output before pages are joined.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*)\n```[ \t]*$").unwrap());

static RE_EXCESS_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Zero-width spaces and joiners, BOM, soft hyphen.
static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}\u{00AD}]").unwrap());

/// Tidy one page of model output.
pub(crate) fn clean_page(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = unwrap_outer_fence(text.trim());
    let text = RE_INVISIBLE.replace_all(&text, "");
    let text: Vec<&str> = text.lines().map(str::trim_end).collect();
    let text = RE_EXCESS_BLANKS.replace_all(&text.join("\n"), "\n\n").into_owned();
    text.trim().to_string()
}

/// Join cleaned pages into one document ending in a single newline.
pub(crate) fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    let body = pages
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

fn unwrap_outer_fence(text: &str) -> String {
    match RE_OUTER_FENCE.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(clean_page("```markdown\n# Hi\n```"), "# Hi");
        assert_eq!(clean_page("```\nplain\n```\n"), "plain");
    }

    #[test]
    fn keeps_inner_code_fences() {
        let page = "Intro\n\n```rust\nfn x() {}\n```";
        assert_eq!(clean_page(page), page);
    }

    #[test]
    fn normalises_whitespace() {
        assert_eq!(clean_page("a  \r\n\r\n\r\n\r\nb\t"), "a\n\nb");
    }

    #[test]
    fn removes_invisible_characters() {
        assert_eq!(clean_page("\u{FEFF}wo\u{200B}rd"), "word");
    }

    #[test]
    fn join_skips_empty_pages() {
        assert_eq!(join_pages(["# One", "", "Two"]), "# One\n\nTwo\n");
        assert_eq!(join_pages(Vec::<&str>::new()), "");
    }
}
