//! Splitting long replies into transport-sized messages.

/// Boundaries closer to the start of the window than this fraction (in
/// tenths) are ignored, so chunks do not come out tiny.
const MIN_SPLIT_TENTHS: usize = 3;

/// Split `text` into chunks of at most `max_len` characters.
///
/// Split points are tried in order: the last paragraph break, the last line
/// break, the last space. A candidate only counts if it sits past 30% of
/// `max_len`; otherwise the chunk is cut hard at `max_len`. Emitted chunks
/// lose trailing whitespace and the remainder loses leading whitespace.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 {
        return Vec::new();
    }

    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let Some(window_end) = byte_index_of_char(remaining, max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        let split_at = split_point(remaining, max_len).unwrap_or(window_end);

        let chunk = remaining[..split_at].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// Byte offset where the `n`-th character starts, or `None` if the text
/// has `n` characters or fewer.
fn byte_index_of_char(text: &str, n: usize) -> Option<usize> {
    text.char_indices().nth(n).map(|(i, _)| i)
}

/// The first `chars` characters of `text`.
fn prefix(text: &str, chars: usize) -> &str {
    &text[..byte_index_of_char(text, chars).unwrap_or(text.len())]
}

/// Byte offset just past the best boundary that leaves a chunk of at most
/// `max_len` characters. A boundary may start right at `max_len`, since the
/// separator itself is dropped.
fn split_point(remaining: &str, max_len: usize) -> Option<usize> {
    let far_enough =
        |byte_idx: usize| remaining[..byte_idx].chars().count() * 10 > max_len * MIN_SPLIT_TENTHS;

    let candidates = [
        prefix(remaining, max_len + 2).rfind("\n\n").map(|i| (i, 2)),
        prefix(remaining, max_len + 1).rfind('\n').map(|i| (i, 1)),
        prefix(remaining, max_len + 1).rfind(' ').map(|i| (i, 1)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|(idx, _)| far_enough(*idx))
        .map(|(idx, len)| idx + len)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lens(chunks: &[String]) -> Vec<usize> {
        chunks.iter().map(|c| c.chars().count()).collect()
    }

    #[test]
    fn short_text_is_returned_unchanged() {
        assert_eq!(chunk_message("  hi there \n", 4096), vec!["  hi there \n"]);
        assert_eq!(chunk_message("", 10), vec![""]);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        assert!(chunk_message("anything", 0).is_empty());
    }

    #[test]
    fn prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(2000), "b".repeat(2998));
        let chunks = chunk_message(&text, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(2998));
    }

    #[test]
    fn paragraph_break_too_early_falls_back_to_line() {
        // Paragraph break at 10% of the limit, line break at 80%.
        let text = format!(
            "{}\n\n{}\n{}",
            "a".repeat(10),
            "b".repeat(68),
            "c".repeat(50)
        );
        let chunks = chunk_message(&text, 100);
        assert_eq!(chunks[0], format!("{}\n\n{}", "a".repeat(10), "b".repeat(68)));
        assert_eq!(chunks[1], "c".repeat(50));
    }

    #[test]
    fn paragraph_break_right_at_limit_is_preferred() {
        let first = format!("{} {}", "a".repeat(50), "b".repeat(49));
        let text = format!("{first}\n\n{}", "c".repeat(60));
        assert_eq!(chunk_message(&text, 100), vec![first, "c".repeat(60)]);
    }

    #[test]
    fn line_break_right_at_limit_is_preferred() {
        let first = format!("{} {}", "a".repeat(50), "b".repeat(49));
        let text = format!("{first}\n{}", "c".repeat(60));
        assert_eq!(chunk_message(&text, 100), vec![first, "c".repeat(60)]);

        let spaced = format!("{} {}", "d".repeat(100), "e".repeat(20));
        assert_eq!(chunk_message(&spaced, 100), vec!["d".repeat(100), "e".repeat(20)]);
    }

    #[test]
    fn falls_back_to_space() {
        let words = vec!["word"; 30].join(" ");
        let chunks = chunk_message(&words, 42);
        assert_eq!(lens(&chunks), vec![39, 39, 39, 29]);
        assert!(chunks.iter().all(|c| !c.ends_with(' ') && !c.starts_with(' ')));
        assert_eq!(chunks.join(" "), words);
    }

    #[test]
    fn hard_cut_without_boundaries() {
        let text = "x".repeat(250);
        assert_eq!(lens(&chunk_message(&text, 100)), vec![100, 100, 50]);
    }

    #[test]
    fn boundary_inside_first_thirty_percent_is_ignored() {
        let text = format!("ab {}", "y".repeat(150));
        let chunks = chunk_message(&text, 100);
        assert_eq!(chunks[0].chars().count(), 100);
        assert!(chunks[0].starts_with("ab y"));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "й".repeat(150);
        let chunks = chunk_message(&text, 100);
        assert_eq!(lens(&chunks), vec![100, 50]);
        let emoji = format!("{}🦀z", "a".repeat(99));
        assert_eq!(chunk_message(&emoji, 100), vec![
            format!("{}🦀", "a".repeat(99)),
            "z".to_string()
        ]);
    }

    #[rstest]
    #[case(50)]
    #[case(200)]
    #[case(1000)]
    fn chunks_fit_and_preserve_content(#[case] max_len: usize) {
        let text = "Lorem ipsum dolor sit amet.\nConsectetur adipiscing elit.\n\n".repeat(60);
        let chunks = chunk_message(&text, max_len);
        assert!(chunks.iter().all(|c| c.chars().count() <= max_len));
        assert!(chunks.iter().all(|c| !c.is_empty()));

        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(squash(&chunks.join(" ")), squash(&text));
    }
}
