use once_cell::sync::Lazy;
use regex::Regex;

// No backreferences in `regex`; the two names are compared after matching.
static WRAPPING_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^<([A-Za-z][A-Za-z0-9_\-]*)(?:\s[^>]*)?>(.*)</\s*([A-Za-z][A-Za-z0-9_\-]*)\s*>$")
        .expect("wrapping tag regex")
});

/// Removes markup pairs that wrap the whole text, e.g. `<T>hola</T>` -> `hola`.
///
/// The whole input must be the pair: surrounding whitespace counts as outside the
/// tags, so `"<T>x</T>\n\n"` is returned unchanged. Opening and closing names must
/// agree (ASCII case-insensitive). Stripping repeats until nothing wraps the text,
/// so applying it twice gives the same result as applying it once; a translation
/// that is itself one element, e.g. `<p>Hola</p>`, loses that element too.
pub fn strip_wrapping_tags(input: &str) -> String {
    let mut current = input;
    while let Some(inner) = unwrap_once(current) {
        current = inner;
    }
    current.to_string()
}

fn unwrap_once(text: &str) -> Option<&str> {
    let caps = WRAPPING_TAG_RE.captures(text)?;
    let open = caps.get(1)?.as_str();
    let close = caps.get(3)?.as_str();
    if !open.eq_ignore_ascii_case(close) {
        return None;
    }
    caps.get(2).map(|m| m.as_str())
}

/// Shortens text for log lines on a char boundary.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push('…');
    }
    out.replace('\n', "⏎")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_matching_pair() {
        assert_eq!(strip_wrapping_tags("<T>hola</T>"), "hola");
        assert_eq!(strip_wrapping_tags("<t>hola</T>"), "hola");
        assert_eq!(
            strip_wrapping_tags("<TRANSLATE_THIS>\nhola mundo\n</TRANSLATE_THIS>"),
            "\nhola mundo\n"
        );
        assert_eq!(strip_wrapping_tags("<p class=\"x\">hi</p>"), "hi");
    }

    #[test]
    fn whitespace_outside_the_pair_blocks_stripping() {
        for s in ["<T>x</T>\n\n", "  <T>x</T>", "\n<T>x</T>", "<p class=\"x\">hi</p>\n"] {
            assert_eq!(strip_wrapping_tags(s), s);
        }
    }

    #[test]
    fn nested_pairs_unwrap_to_the_innermost_text() {
        let once = strip_wrapping_tags("<TRANSLATE_THIS><p>Hola</p></TRANSLATE_THIS>");
        assert_eq!(once, "Hola");
        assert_eq!(strip_wrapping_tags(&once), once);
    }

    #[test]
    fn leaves_other_text_alone() {
        for s in [
            "plain text",
            "<a>x</b>",
            "before <T>x</T>",
            "<T>x</T> after",
            "",
            "<br> line",
        ] {
            assert_eq!(strip_wrapping_tags(s), s);
        }
    }

    #[test]
    fn is_idempotent() {
        for s in [
            "<a><b>x</b></a>",
            "<T>hola</T>",
            "plain",
            "<T>a</T><T>b</T>",
            "<x>\n<y> z </y>\n</x>",
        ] {
            let once = strip_wrapping_tags(s);
            assert_eq!(strip_wrapping_tags(&once), once, "input={s:?}");
        }
        assert_eq!(strip_wrapping_tags("<a><b>x</b></a>"), "x");
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_for_log("你好世界", 2), "你好…");
        assert_eq!(truncate_for_log("ab\ncd", 10), "ab⏎cd");
    }
}
