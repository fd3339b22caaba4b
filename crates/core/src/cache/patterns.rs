//! Pure glob matching for cache keys.
//!
//! The dialect is the one Redis `KEYS` understands, so the in-process store
//! and the remote store agree on which keys a pattern selects:
//!
//! - `*` matches any sequence of characters (including none)
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from a set or range, `[^x]` / `[!x]`
//!   negate the set
//! - `\` escapes the next character

/// Checks if a cache key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use bomhub_core::cache::pattern_matches;
///
/// assert!(pattern_matches("parts:*", "parts:A"));
/// assert!(pattern_matches("session:*:web", "session:42:web"));
/// assert!(pattern_matches("user:?", "user:7"));
/// assert!(!pattern_matches("parts:*", "other:C"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let mut pi = 0;
    let mut ki = 0;
    // Position of the last `*` seen and the key index it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while ki < key.len() {
        if let Some(step) = match_one(&pattern, pi, key[ki]) {
            match step {
                Step::Star => {
                    backtrack = Some((pi, ki));
                    pi += 1;
                    continue;
                }
                Step::Advance(next) => {
                    pi = next;
                    ki += 1;
                    continue;
                }
                Step::Mismatch => {}
            }
        }

        // Let the most recent `*` swallow one more character and retry.
        match backtrack {
            Some((star_pi, star_ki)) => {
                pi = star_pi + 1;
                ki = star_ki + 1;
                backtrack = Some((star_pi, star_ki + 1));
            }
            None => return false,
        }
    }

    // Trailing stars match the empty remainder.
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}

enum Step {
    Star,
    Advance(usize),
    Mismatch,
}

/// Matches a single pattern token at `pi` against `ch`.
///
/// Returns `None` when the pattern is exhausted.
fn match_one(pattern: &[char], pi: usize, ch: char) -> Option<Step> {
    let token = *pattern.get(pi)?;

    let step = match token {
        '*' => Step::Star,
        '?' => Step::Advance(pi + 1),
        '[' => match match_class(pattern, pi, ch) {
            Some((true, next)) => Step::Advance(next),
            Some((false, _)) => Step::Mismatch,
            // Unterminated class: treat `[` as a literal.
            None if ch == '[' => Step::Advance(pi + 1),
            None => Step::Mismatch,
        },
        '\\' if pi + 1 < pattern.len() => {
            if pattern[pi + 1] == ch {
                Step::Advance(pi + 2)
            } else {
                Step::Mismatch
            }
        }
        literal if literal == ch => Step::Advance(pi + 1),
        _ => Step::Mismatch,
    };

    Some(step)
}

/// Evaluates the character class starting at `start` (which holds `[`).
///
/// Returns whether `ch` is selected by the class and the index just past the
/// closing `]`, or `None` if the class is never closed.
fn match_class(pattern: &[char], start: usize, ch: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = matches!(pattern.get(i), Some('^') | Some('!'));
    if negate {
        i += 1;
    }

    let mut selected = false;
    let mut first = true;

    while i < pattern.len() {
        let c = pattern[i];
        if c == ']' && !first {
            return Some((selected != negate, i + 1));
        }
        first = false;

        let lo = if c == '\\' && i + 1 < pattern.len() {
            i += 1;
            pattern[i]
        } else {
            c
        };

        if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let hi = pattern[i + 2];
            if lo <= ch && ch <= hi {
                selected = true;
            }
            i += 3;
        } else {
            if lo == ch {
                selected = true;
            }
            i += 1;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(pattern_matches("user:123", "user:123"));
        assert!(pattern_matches("projects:all", "projects:all"));
        assert!(!pattern_matches("user:123", "user:456"));
        assert!(!pattern_matches("user:123", "user:1234"));
    }

    #[test]
    fn test_wildcard_at_end() {
        assert!(pattern_matches("parts:*", "parts:A"));
        assert!(pattern_matches("parts:*", "parts:"));
        assert!(pattern_matches("user:*", "user:anything-goes-here"));
        assert!(!pattern_matches("parts:*", "other:C"));
    }

    #[test]
    fn test_wildcard_at_start() {
        assert!(pattern_matches("*:all", "projects:all"));
        assert!(pattern_matches("*:all", "uploaded_files:all"));
        assert!(!pattern_matches("*:all", "projects:some"));
    }

    #[test]
    fn test_wildcard_in_middle() {
        assert!(pattern_matches("session:*:web", "session:42:web"));
        assert!(pattern_matches("session:*:web", "session:a:b:c:web"));
        assert!(!pattern_matches("session:*:web", "session:42:cli"));
        assert!(!pattern_matches("session:*:web", "user:42:web"));
    }

    #[test]
    fn test_multiple_wildcards() {
        assert!(pattern_matches("project:*:parts:*", "project:7:parts:2024"));
        assert!(pattern_matches("*:*:*", "a:b:c"));
        assert!(pattern_matches("*:middle:*", "start:middle:end"));
        assert!(!pattern_matches("*:middle:*", "start:other:end"));
    }

    #[test]
    fn test_star_backtracks_over_repeated_segments() {
        assert!(pattern_matches("*ab", "aab"));
        assert!(pattern_matches("a*b*c", "abbbcbc"));
        assert!(!pattern_matches("a*b*c", "abbbcb"));
    }

    #[test]
    fn test_wildcard_only() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("**", "anything"));
    }

    #[test]
    fn test_question_mark() {
        assert!(pattern_matches("user:?", "user:7"));
        assert!(!pattern_matches("user:?", "user:"));
        assert!(!pattern_matches("user:?", "user:77"));
        assert!(pattern_matches("h?llo", "hello"));
    }

    #[test]
    fn test_character_classes() {
        assert!(pattern_matches("h[ae]llo", "hello"));
        assert!(pattern_matches("h[ae]llo", "hallo"));
        assert!(!pattern_matches("h[ae]llo", "hillo"));
        assert!(pattern_matches("part:[a-c]", "part:b"));
        assert!(!pattern_matches("part:[a-c]", "part:d"));
        assert!(pattern_matches("h[^e]llo", "hallo"));
        assert!(!pattern_matches("h[^e]llo", "hello"));
        assert!(pattern_matches("h[!e]llo", "hallo"));
    }

    #[test]
    fn test_unterminated_class_is_literal() {
        assert!(pattern_matches("key[", "key["));
        assert!(!pattern_matches("key[", "keya"));
    }

    #[test]
    fn test_escapes() {
        assert!(pattern_matches("literal\\*", "literal*"));
        assert!(!pattern_matches("literal\\*", "literalx"));
        assert!(pattern_matches("what\\?", "what?"));
    }

    #[test]
    fn test_empty_pattern() {
        assert!(pattern_matches("", ""));
        assert!(!pattern_matches("", "non-empty"));
    }

    #[test]
    fn test_empty_key() {
        assert!(pattern_matches("*", ""));
        assert!(!pattern_matches("non-empty", ""));
        assert!(!pattern_matches("prefix:*", ""));
    }

    #[test]
    fn test_unicode_keys() {
        assert!(pattern_matches("project:*", "project:零件清单"));
        assert!(pattern_matches("project:??", "project:零件"));
    }
}
