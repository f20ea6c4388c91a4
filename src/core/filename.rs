use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static UNSAFE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9 \-_]").unwrap());

/// Reduces a title to a file-name stem made only of ASCII letters, digits,
/// spaces, dashes and underscores. Accented letters keep their base letter.
pub fn safe_title(name: &str) -> String {
    let decomposed: String = name.nfd().filter(|c| !is_combining(*c)).collect();
    let stripped = UNSAFE_RE.replace_all(&decomposed, "");
    let collapsed = WS_RE.replace_all(stripped.trim(), " ");
    collapsed.to_string()
}

/// Like [`safe_title`], but never empty.
pub fn file_stem(name: &str) -> String {
    let stem = safe_title(name);
    if stem.is_empty() {
        "download".to_string()
    } else {
        stem
    }
}

fn is_combining(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_forbidden_chars() {
        assert_eq!(safe_title("a:b?c"), "abc");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(safe_title("hello   world"), "hello world");
    }

    #[test]
    fn keeps_dashes_and_underscores() {
        assert_eq!(safe_title("Artist - Song_v2"), "Artist - Song_v2");
    }

    #[test]
    fn accents_keep_base_letter() {
        assert_eq!(safe_title("Café"), "Cafe");
        assert_eq!(safe_title("e\u{0301}te\u{0301}"), "ete");
    }

    #[test]
    fn windows_forbidden_chars_removed() {
        let input = "Video: \"Best of 2024\" <HD> | 1080p";
        let result = safe_title(input);
        for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
            assert!(!result.contains(c));
        }
        assert_eq!(result, "Video Best of 2024 HD 1080p");
    }

    #[test]
    fn empty_titles_get_placeholder() {
        assert_eq!(file_stem("???"), "download");
        assert_eq!(file_stem("日本語"), "download");
        assert_eq!(file_stem("ok"), "ok");
    }
}
