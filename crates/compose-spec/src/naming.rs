//! Identifier-safe unit names
//!
//! Unit names end up as identifiers in downstream runtimes, so separators such
//! as `-` are rewritten to `_` before any unit is handed out.

/// Separator characters not allowed in unit names
pub const DISALLOWED_SEPARATORS: &[char] = &['-', '.', ' '];

/// Replacement for every disallowed separator
pub const REPLACEMENT: char = '_';

/// Normalize a name to its identifier-safe form
///
/// Idempotent: `normalize_name(&normalize_name(n)) == normalize_name(n)`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if is_disallowed(c) {
                REPLACEMENT
            } else {
                c
            }
        })
        .collect()
}

/// Disallowed separators present in `name`, in order of first appearance
#[must_use]
pub fn disallowed_separators(name: &str) -> Vec<char> {
    let mut found = Vec::new();
    for c in name.chars().filter(|c| is_disallowed(*c)) {
        if !found.contains(&c) {
            found.push(c);
        }
    }
    found
}

/// Check if `name` is already in normalized form
#[inline]
#[must_use]
pub fn is_normalized(name: &str) -> bool {
    !name.chars().any(is_disallowed)
}

#[inline]
fn is_disallowed(c: char) -> bool {
    c.is_whitespace() || DISALLOWED_SEPARATORS.contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hyphens_become_underscores() {
        assert_eq!(normalize_name("my-agent"), "my_agent");
        assert_eq!(normalize_name("loop-demo"), "loop_demo");
    }

    #[test]
    fn dots_and_spaces_become_underscores() {
        assert_eq!(normalize_name("team.lead agent"), "team_lead_agent");
    }

    #[test]
    fn normalized_name_untouched() {
        assert_eq!(normalize_name("already_fine"), "already_fine");
        assert!(is_normalized("already_fine"));
        assert!(!is_normalized("not-fine"));
    }

    #[test]
    fn disallowed_separators_deduplicated() {
        assert_eq!(disallowed_separators("a-b-c.d"), vec!['-', '.']);
        assert!(disallowed_separators("abc").is_empty());
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(name in ".{0,40}") {
            let once = normalize_name(&name);
            prop_assert_eq!(normalize_name(&once), once.clone());
            prop_assert!(is_normalized(&once));
        }

        #[test]
        fn hyphenated_names_map_deterministically(parts in prop::collection::vec("[a-z]{1,8}", 1..5)) {
            let hyphenated = parts.join("-");
            prop_assert_eq!(normalize_name(&hyphenated), parts.join("_"));
        }
    }
}
