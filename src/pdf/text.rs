//! Text matching over a page's character layer.

use super::backend::{PageChar, Rect, TextMatch};

/// Points tolerance for "same line"
const LINE_TOLERANCE: f32 = 2.0;

fn fold(c: char, case_sensitive: bool) -> char {
    if case_sensitive {
        c
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

/// Find non-overlapping occurrences of `query`, left to right.
///
/// Indices are character indices into `chars`, so multi-byte text lines up
/// with the per-character bounds.
pub fn find_matches(chars: &[PageChar], query: &str, case_sensitive: bool) -> Vec<TextMatch> {
    let needle: Vec<char> = query.chars().map(|c| fold(c, case_sensitive)).collect();
    if needle.is_empty() || needle.len() > chars.len() {
        return Vec::new();
    }

    let haystack: Vec<char> = chars.iter().map(|c| fold(c.ch, case_sensitive)).collect();
    let mut matches = Vec::new();
    let mut start = 0;

    while start + needle.len() <= haystack.len() {
        if haystack[start..start + needle.len()] == needle[..] {
            let end = start + needle.len();
            let rects = chars[start..end].iter().filter_map(|c| c.bounds).collect();
            matches.push(TextMatch {
                start,
                bounds: merge_text_rects(rects),
            });
            start = end;
        } else {
            start += 1;
        }
    }

    matches
}

/// Merge adjacent text rectangles on the same line into single rectangles.
pub fn merge_text_rects(rects: Vec<Rect>) -> Vec<Rect> {
    let mut iter = rects.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for rect in iter {
        if (rect.top - current.top).abs() < LINE_TOLERANCE {
            current.left = current.left.min(rect.left);
            current.right = current.right.max(rect.right);
            current.top = current.top.min(rect.top);
            current.bottom = current.bottom.max(rect.bottom);
        } else {
            merged.push(current);
            current = rect;
        }
    }
    merged.push(current);

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, y: f32) -> Vec<PageChar> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| PageChar::new(ch, Some(Rect::from_xywh(i as f32 * 10.0, y, 10.0, 12.0))))
            .collect()
    }

    #[test]
    fn test_merge_text_rects() {
        let rects = vec![
            Rect::from_xywh(0.0, 10.0, 10.0, 12.0),
            Rect::from_xywh(10.0, 10.0, 10.0, 12.0),
            Rect::from_xywh(20.0, 10.0, 10.0, 12.0),
        ];

        let merged = merge_text_rects(rects);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].width(), 30.0);
    }

    #[test]
    fn merge_starts_new_rect_on_next_line() {
        let rects = vec![
            Rect::from_xywh(80.0, 10.0, 10.0, 12.0),
            Rect::from_xywh(0.0, 30.0, 10.0, 12.0),
        ];

        let merged = merge_text_rects(rects);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].top, 30.0);
    }

    #[test]
    fn finds_every_occurrence_case_insensitively() {
        let chars = line("Rust and rust", 0.0);

        let matches = find_matches(&chars, "RUST", false);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].start, 0);
        assert_eq!(matches[1].start, 9);
        assert_eq!(matches[1].bounds, vec![Rect::from_xywh(90.0, 0.0, 40.0, 12.0)]);
    }

    #[test]
    fn case_sensitive_skips_other_casing() {
        let chars = line("Rust and rust", 0.0);

        let matches = find_matches(&chars, "rust", true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 9);
    }

    #[test]
    fn matches_do_not_overlap() {
        let chars = line("aaaa", 0.0);
        assert_eq!(find_matches(&chars, "aa", true).len(), 2);
    }

    #[test]
    fn indices_are_characters_not_bytes() {
        let chars = line("héllo wörld", 0.0);

        let matches = find_matches(&chars, "wörld", false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 6);
        assert_eq!(matches[0].bounds[0].left, 60.0);
    }

    #[test]
    fn match_across_lines_yields_one_rect_per_line() {
        let mut chars = line("foo", 0.0);
        chars.push(PageChar::new('\n', None));
        chars.extend(line("bar", 20.0));

        let matches = find_matches(&chars, "o\nb", true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bounds.len(), 2);
    }

    #[test]
    fn empty_query_matches_nothing() {
        assert!(find_matches(&line("abc", 0.0), "", false).is_empty());
    }
}
