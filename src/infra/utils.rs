//! Filepath: src/infra/utils.rs
//! Small shared helpers.

/// Truncate `s` to at most `max` characters, on a char boundary.
/// Byte-index slicing would panic mid-codepoint on non-ASCII source.
pub fn truncate_chars(s: &str, max: usize) -> &str
{
    match s
        .char_indices()
        .nth(max)
    {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
