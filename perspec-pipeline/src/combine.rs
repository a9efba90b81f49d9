use perspec_common::Tweet;
use std::collections::HashSet;

/// Merge tweet sets: `primary` first, then unseen tweets from each
/// supplementary list in order. No id appears twice in the output.
pub fn combine(primary: Vec<Tweet>, supplementary: Vec<Vec<Tweet>>) -> Vec<Tweet> {
    let capacity = primary.len() + supplementary.iter().map(Vec::len).sum::<usize>();
    let mut seen: HashSet<String> = HashSet::with_capacity(capacity);
    let mut out = Vec::with_capacity(capacity);

    for tweet in primary.into_iter().chain(supplementary.into_iter().flatten()) {
        if seen.insert(tweet.id.clone()) {
            out.push(tweet);
        }
    }
    out
}
