use crate::textutil::strip_wrapping_tags;

/// Joins per-chunk final translations in order.
///
/// Each output is unwrapped from any markup pair the model echoed back, then the
/// pieces are concatenated without separators and outer newlines are trimmed.
/// A failed chunk is passed as an empty string and simply contributes nothing.
pub fn reassemble<S: AsRef<str>>(finals: &[S]) -> String {
    let joined: String = finals
        .iter()
        .map(|s| strip_wrapping_tags(s.as_ref()))
        .collect();
    joined.trim_matches('\n').to_string()
}
