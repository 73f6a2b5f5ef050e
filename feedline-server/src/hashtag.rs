use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Regex pattern for matching hashtags
/// Matches: #word where word is one or more letters, numbers or underscores
static HASHTAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#(\w+)").expect("Failed to compile hashtag regex")
});

/// Extract hashtag tokens from post text
///
/// Returns the tokens without the # prefix, lowercased, deduplicated and in
/// the order they first appear. Each token addresses one `hashtag:<token>`
/// feed the post is fanned out to.
///
/// # Examples
///
/// ```
/// use feedline_server::hashtag::extract_hashtags;
/// let tags = extract_hashtags("#A #a #B");
/// assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);
/// ```
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    HASHTAG_REGEX
        .captures_iter(text)
        .map(|cap| cap[1].to_lowercase())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_extract_single_hashtag() {
        let hashtags = extract_hashtags("Hello from the demo #introduction");
        assert_eq!(hashtags, vec!["introduction"]);
    }

    #[test]
    fn test_case_folding_keeps_first_seen_order() {
        assert_eq!(extract_hashtags("#A #a #B"), vec!["a", "b"]);
        assert_eq!(extract_hashtags("#zeta #Alpha #ZETA"), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_two_tags_in_one_post() {
        let hashtags = extract_hashtags("Fresh start! #newbeginnings #introduction");
        assert_eq!(hashtags, vec!["newbeginnings", "introduction"]);
    }

    #[test]
    fn test_single_character_tags_count() {
        assert_eq!(extract_hashtags("#a #ab"), vec!["a", "ab"]);
    }

    #[test]
    fn test_underscores_and_digits() {
        assert_eq!(extract_hashtags("#web_dev and #rust2024"), vec!["web_dev", "rust2024"]);
    }

    #[test]
    fn test_no_hashtags() {
        assert!(extract_hashtags("").is_empty());
        assert!(extract_hashtags("no tags here").is_empty());
        assert!(extract_hashtags("# just a hash").is_empty());
    }

    #[test]
    fn test_adjacent_hashtags_split() {
        assert_eq!(extract_hashtags("#rust#webdev"), vec!["rust", "webdev"]);
    }

    proptest! {
        #[test]
        fn prop_text_without_hash_yields_nothing(text in "[^#]*") {
            prop_assert!(extract_hashtags(&text).is_empty());
        }

        #[test]
        fn prop_output_is_lowercase_and_unique(text in "\\PC*") {
            let tags = extract_hashtags(&text);
            let unique: HashSet<_> = tags.iter().collect();
            prop_assert_eq!(unique.len(), tags.len());
            for tag in &tags {
                prop_assert_eq!(tag, &tag.to_lowercase());
                prop_assert!(!tag.is_empty());
            }
        }

        #[test]
        fn prop_embedded_tag_is_found(
            prefix in "[^#]*",
            tag in "[a-zA-Z][a-zA-Z0-9_]{0,9}",
            suffix in "[ \t\n]*"
        ) {
            let text = format!("{} #{}{}", prefix, tag, suffix);
            prop_assert!(extract_hashtags(&text).contains(&tag.to_lowercase()));
        }
    }
}
