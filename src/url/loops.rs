use std::collections::HashMap;
use url::Url;

/// Detects probable crawl traps by repeated path segments
///
/// Returns true when any non-empty segment of `path` occurs more than
/// `max_repeats` times, as in `/cat/cat/cat/x` with `max_repeats = 2`.
/// Paginated or faceted navigation tends to produce such paths, each one a
/// distinct URL that exact deduplication alone never catches.
///
/// # Examples
///
/// ```
/// use content_crawler::url::has_repeated_segments;
///
/// assert!(!has_repeated_segments("/a/a/b", 2));
/// assert!(has_repeated_segments("/a/a/a", 2));
/// ```
pub fn has_repeated_segments(path: &str, max_repeats: usize) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() <= max_repeats {
        return false;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for segment in segments {
        let count = counts.entry(segment).or_insert(0);
        *count += 1;
        if *count > max_repeats {
            return true;
        }
    }

    false
}

/// [`has_repeated_segments`] applied to a URL's path
pub fn is_loop_trap(url: &Url, max_repeats: usize) -> bool {
    has_repeated_segments(url.path(), max_repeats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths_pass() {
        assert!(!has_repeated_segments("/", 2));
        assert!(!has_repeated_segments("/docs/guide/intro", 2));
        assert!(!has_repeated_segments("/a/b/a/c", 2));
    }

    #[test]
    fn test_two_repeats_allowed() {
        assert!(!has_repeated_segments("/a/a", 2));
        assert!(!has_repeated_segments("/page/x/page", 2));
    }

    #[test]
    fn test_third_repeat_rejected() {
        assert!(has_repeated_segments("/a/a/a", 2));
        assert!(has_repeated_segments("/cat/cat/cat/cat/x", 2));
        assert!(has_repeated_segments("/x/cat/y/cat/z/cat", 2));
    }

    #[test]
    fn test_custom_threshold() {
        assert!(has_repeated_segments("/a/a", 1));
        assert!(!has_repeated_segments("/a/a/a", 3));
    }

    #[test]
    fn test_url_helper() {
        let url = Url::parse("https://x.test/a/a/a/a").unwrap();
        assert!(is_loop_trap(&url, 2));
    }
}
