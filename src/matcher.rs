use strsim::jaro_winkler;

const FUZZY_THRESHOLD: f64 = 0.85;

/// Similarity score between a source track and a search candidate.
/// Weighted 50% name + 50% primary artist; matching is name/artist string
/// based only, so no other signals enter the score.
pub fn similarity(src_name: &str, src_artist: &str, cand_name: &str, cand_artist: &str) -> f64 {
    let name_score = jaro_winkler(&src_name.to_lowercase(), &cand_name.to_lowercase());
    let artist_score = jaro_winkler(&src_artist.to_lowercase(), &cand_artist.to_lowercase());

    name_score * 0.5 + artist_score * 0.5
}

/// Check if a similarity score meets the fuzzy match threshold (85%)
pub fn is_fuzzy_match(score: f64) -> bool {
    score >= FUZZY_THRESHOLD
}

/// Check if a candidate matches exactly (case-insensitive name and artist)
pub fn is_exact_match(src_name: &str, src_artist: &str, cand_name: &str, cand_artist: &str) -> bool {
    src_name.trim().to_lowercase() == cand_name.trim().to_lowercase()
        && src_artist.trim().to_lowercase() == cand_artist.trim().to_lowercase()
}

/// Pick the best candidate from a single search response: an exact match
/// wins outright, otherwise the highest-scoring fuzzy match above the
/// threshold. Candidates are (name, primary artist) pairs in result order.
pub fn pick_best<'a, I>(src_name: &str, src_artist: &str, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut best_index: Option<usize> = None;
    let mut best_score: f64 = 0.0;

    for (index, (cand_name, cand_artist)) in candidates.into_iter().enumerate() {
        if is_exact_match(src_name, src_artist, cand_name, cand_artist) {
            return Some(index);
        }

        let score = similarity(src_name, src_artist, cand_name, cand_artist);
        if score > best_score && is_fuzzy_match(score) {
            best_score = score;
            best_index = Some(index);
        }
    }

    best_index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_case_insensitive() {
        assert!(is_exact_match(
            "Don't Stop Me Now",
            "Queen",
            "don't stop me now",
            "queen"
        ));
    }

    #[test]
    fn test_fuzzy_match_similar_names() {
        // Missing apostrophe should still clear the threshold
        let score = similarity("Don't Stop Me Now", "Queen", "Dont Stop Me Now", "Queen");
        assert!(score > 0.85, "Score {} should be > 0.85", score);
    }

    #[test]
    fn test_no_match_different_songs() {
        let score = similarity(
            "Bohemian Rhapsody",
            "Queen",
            "Stairway to Heaven",
            "Led Zeppelin",
        );
        assert!(score < 0.85, "Score {} should be < 0.85", score);
    }

    #[test]
    fn test_pick_best_prefers_exact() {
        let candidates = vec![
            ("Blue Monday '88", "New Order"),
            ("Blue Monday", "New Order"),
        ];
        assert_eq!(pick_best("Blue Monday", "New Order", candidates), Some(1));
    }

    #[test]
    fn test_pick_best_rejects_weak_candidates() {
        let candidates = vec![("Something Else Entirely", "Nobody")];
        assert_eq!(pick_best("Blue Monday", "New Order", candidates), None);
    }
}
