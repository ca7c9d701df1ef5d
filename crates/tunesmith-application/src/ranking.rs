// SPDX-License-Identifier: GPL-3.0-or-later

//! Provider-preference ranking of search results.

use tunesmith_assistant::MaTrack;

/// Weight of a provider string against an ordered keyword list.
///
/// Every keyword that appears (case-insensitively) in `provider` adds its
/// 1-based position. `None` means no keyword matched and ranks after every
/// weighted result. Keywords are compared as given, so an empty keyword
/// matches every provider.
pub fn provider_weight<K: AsRef<str>>(provider: &str, keywords: &[K]) -> Option<usize> {
    let provider = provider.to_lowercase();
    let mut weight = None;

    for (index, keyword) in keywords.iter().enumerate() {
        if provider.contains(&keyword.as_ref().to_lowercase()) {
            *weight.get_or_insert(0) += index + 1;
        }
    }

    weight
}

/// Order results so preferred providers come first.
///
/// The sort is stable, so results with equal weight keep their original
/// order. An empty keyword list returns `results` untouched.
pub fn sort_by_provider_weight<K: AsRef<str>>(results: Vec<MaTrack>, keywords: &[K]) -> Vec<MaTrack> {
    if keywords.is_empty() {
        return results;
    }

    let mut weighted: Vec<(usize, MaTrack)> = results
        .into_iter()
        .map(|track| {
            let weight = provider_weight(&track.provider, keywords).unwrap_or(usize::MAX);
            (weight, track)
        })
        .collect();
    weighted.sort_by_key(|(weight, _)| *weight);

    weighted.into_iter().map(|(_, track)| track).collect()
}
