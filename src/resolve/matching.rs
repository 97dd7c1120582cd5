//! Character-level longest-common-substring scoring.

/// Length, in characters, of the longest substring shared by `a` and `b`.
pub fn longest_common_substring(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // prev[j] = length of the common suffix of a[..i] and b[..j].
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    let mut best = 0;
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            best = best.max(curr[j + 1]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

/// The item whose key shares the longest substring with `pattern`.
///
/// Items are scanned in order; a later item only wins if strictly longer.
/// Returns `None` if nothing shares even one character.
pub fn best_match_by<T, I, F>(pattern: &str, items: I, key: F) -> Option<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> &str,
{
    let mut best: Option<(usize, T)> = None;
    for item in items {
        let size = longest_common_substring(pattern, key(&item));
        if size > best.as_ref().map_or(0, |(s, _)| *s) {
            best = Some((size, item));
        }
    }
    best.map(|(_, item)| item)
}

/// The candidate sharing the longest substring with `pattern`.
pub fn best_match<'a, I>(pattern: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    best_match_by(pattern, candidates, |c| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcs_lengths() {
        assert_eq!(longest_common_substring("who directed Se7en", "Se7en"), 5);
        assert_eq!(longest_common_substring("abc", "xyz"), 0);
        assert_eq!(longest_common_substring("", "abc"), 0);
        assert_eq!(longest_common_substring("abcdxyz", "xyzabcd"), 4);
        // Characters, not bytes.
        assert_eq!(longest_common_substring("Amélie", "Amélie Poulain"), 6);
    }

    #[test]
    fn best_match_requires_strictly_longer() {
        let question = "When was 2001: A Space Odyssey released";
        let titles = ["2012", "2001: A Space Odyssey", "Odyssey 5"];
        assert_eq!(best_match(question, titles), Some("2001: A Space Odyssey"));

        // Equal scores keep the first candidate.
        assert_eq!(best_match("abcd", ["ab", "cd"]), Some("ab"));
        assert_eq!(best_match("abcd", ["xyz"]), None);
        assert_eq!(best_match("abcd", Vec::<&str>::new()), None);
    }

    #[test]
    fn best_match_by_returns_item() {
        let items = [("id1", "Heat"), ("id2", "The Heat Is On")];
        let hit = best_match_by("is The Heat Is On a movie", items, |item| item.1);
        assert_eq!(hit.map(|(id, _)| id), Some("id2"));
    }
}
