//! Display masking for secret values.

/// Mask a plaintext value for display. Values of 6 characters or fewer
/// become a run of stars at least 3 long, so the true length of short
/// values is not recoverable; longer values keep their first and last 4
/// characters around a fixed ellipsis. Counted in characters, not bytes.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len().max(3));
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_become_star_runs_of_their_length() {
        assert_eq!(mask("abcdef"), "******");
        assert_eq!(mask("abc"), "***");
    }

    #[test]
    fn very_short_values_floor_at_three_stars() {
        assert_eq!(mask("ab"), "***");
        assert_eq!(mask("a"), "***");
        assert_eq!(mask(""), "***");
    }

    #[test]
    fn long_values_keep_head_and_tail() {
        assert_eq!(mask("sk_live_51Mz8Xy9"), "sk_l...8Xy9");
        assert_eq!(mask("abcdefg"), "abcd...defg");
    }

    #[test]
    fn multibyte_values_are_counted_in_characters() {
        assert_eq!(mask("käse"), "****");
        assert_eq!(mask("pässwörd123"), "päss...d123");
    }
}
