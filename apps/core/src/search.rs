use std::cmp::Reverse;

use crate::contract::ResultRecord;
use crate::model::normalize_for_search;

/// How the query landed in a row's match text, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Scattered,
    Contained,
    WordStart,
    Leading,
}

/// Compared field by field; greater is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    tier: Tier,
    gaps: Reverse<usize>,
    offset: Reverse<usize>,
    slack: Reverse<usize>,
}

/// Fuzzy-filters rows against `query`. Rows whose text contains the query
/// outrank rows that only contain its characters in order; ties keep the
/// original row order.
pub fn filter(items: Vec<ResultRecord>, query: &str) -> Vec<ResultRecord> {
    let needle = normalize_for_search(query);
    if needle.is_empty() || items.is_empty() {
        return items;
    }

    let mut ranked: Vec<(Rank, usize, ResultRecord)> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| rank(&item.match_text, &needle).map(|r| (r, index, item)))
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    ranked.into_iter().map(|(_, _, item)| item).collect()
}

fn rank(text: &str, needle: &str) -> Option<Rank> {
    let (haystack, word_starts) = split_words(text);
    if haystack.is_empty() {
        return None;
    }
    let slack = Reverse(haystack.len().saturating_sub(needle.len()));

    if let Some(offset) = haystack.find(needle) {
        let tier = if offset == 0 {
            Tier::Leading
        } else if word_starts.contains(&offset) {
            Tier::WordStart
        } else {
            Tier::Contained
        };
        return Some(Rank {
            tier,
            gaps: Reverse(0),
            offset: Reverse(offset),
            slack,
        });
    }

    let hits = scattered_hits(&haystack, needle)?;
    let first = *hits.first()?;
    let gaps = hits
        .windows(2)
        .map(|pair| pair[1] - pair[0] - 1)
        .sum::<usize>();
    Some(Rank {
        tier: Tier::Scattered,
        gaps: Reverse(gaps),
        offset: Reverse(first),
        slack,
    })
}

/// Normalizes `text` word by word and returns the joined result together
/// with the byte offset where each word begins in it.
fn split_words(text: &str) -> (String, Vec<usize>) {
    let mut joined = String::with_capacity(text.len());
    let mut starts = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let normalized = normalize_for_search(word);
        if normalized.is_empty() {
            continue;
        }
        starts.push(joined.len());
        joined.push_str(&normalized);
    }
    (joined, starts)
}

/// Byte offsets of each needle char matched greedily left to right.
fn scattered_hits(haystack: &str, needle: &str) -> Option<Vec<usize>> {
    let mut rest = haystack.char_indices();
    needle
        .chars()
        .map(|wanted| {
            rest.by_ref()
                .find(|(_, c)| *c == wanted)
                .map(|(offset, _)| offset)
        })
        .collect()
}
