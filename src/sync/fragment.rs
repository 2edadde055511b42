//! Content Fragmenter
//!
//! Stores cap both the size of a text block and the number of blocks one
//! request may carry. `fragment` handles the first limit, `batch` the second.

/// Split `text` into fragments of at most `max_chars` characters.
///
/// Fragments are cut on character boundaries and concatenate back to
/// exactly `text`. Empty input yields no fragments. A `max_chars` of zero
/// is treated as one.
pub fn fragment(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == max_chars {
            fragments.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        fragments.push(text[start..].to_string());
    }
    fragments
}

/// Fragments grouped into write requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batches<T> {
    /// Written together with the record (or the first append)
    pub first: Vec<T>,
    /// Written by follow-up append calls, in order
    pub rest: Vec<Vec<T>>,
}

impl<T> Batches<T> {
    /// Number of follow-up append calls required
    pub fn append_calls(&self) -> usize {
        self.rest.len()
    }

    /// Total items across all batches
    pub fn len(&self) -> usize {
        self.first.len() + self.rest.iter().map(Vec::len).sum::<usize>()
    }

    /// Whether there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group items into a first batch of at most `first_cap` and follow-up
/// batches of at most `subsequent_cap`, preserving order.
///
/// Caps of zero are treated as one.
pub fn batch<T>(items: Vec<T>, first_cap: usize, subsequent_cap: usize) -> Batches<T> {
    let first_cap = first_cap.max(1);
    let subsequent_cap = subsequent_cap.max(1);

    let mut iter = items.into_iter();
    let first: Vec<T> = iter.by_ref().take(first_cap).collect();

    let mut rest = Vec::new();
    loop {
        let chunk: Vec<T> = iter.by_ref().take(subsequent_cap).collect();
        if chunk.is_empty() {
            break;
        }
        rest.push(chunk);
    }

    Batches { first, rest }
}

/// Truncate a summary to `cap` characters, ending in `...` when cut
pub fn truncate_summary(summary: &str, cap: usize) -> String {
    if summary.chars().count() <= cap {
        return summary.to_string();
    }
    let keep = cap.saturating_sub(3);
    let mut out: String = summary.chars().take(keep).collect();
    out.push_str("...");
    out
}
