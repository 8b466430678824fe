//! Tf-idf vectorization and cosine similarity over normalized text.
//!
//! Documents are expected to be pre-normalized by [`super::features::clean_text`].
//! Vectors use smoothed inverse document frequency and are l2-normalized, so
//! cosine similarity reduces to a sparse dot product in the 0.0 to 1.0 range.

use std::collections::HashMap;

/// Vocabulary cap when comparing course content
pub const COURSE_VOCAB_LIMIT: usize = 5000;

/// Vocabulary cap when comparing activity content
pub const ACTIVITY_VOCAB_LIMIT: usize = 1000;

/// Common English words carrying no topical signal. Kept sorted for binary
/// search.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
    "his", "how", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most",
    "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
    "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "you", "your", "yours",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|token| token.chars().count() >= 2 && !is_stop_word(token))
        .collect()
}

/// Unigram terms of a document, plus adjacent bigrams when requested
fn terms(text: &str, bigrams: bool) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();

    if bigrams {
        for pair in tokens.windows(2) {
            terms.push(format!("{} {}", pair[0], pair[1]));
        }
    }
    terms
}

type SparseVector = HashMap<usize, f64>;

fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(index, value)| large.get(index).map(|other| value * other))
        .sum()
}

/// Turns a document set into l2-normalized tf-idf vectors.
///
/// The vocabulary is capped at `max_features` terms, keeping the most
/// frequent terms across the corpus; ties break alphabetically so the
/// result is deterministic.
fn vectorize(documents: &[&str], max_features: usize, bigrams: bool) -> Vec<SparseVector> {
    let doc_terms: Vec<Vec<String>> = documents.iter().map(|d| terms(d, bigrams)).collect();

    let mut corpus_counts: HashMap<&str, usize> = HashMap::new();
    for doc in &doc_terms {
        for term in doc {
            *corpus_counts.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(max_features);

    let vocabulary: HashMap<&str, usize> = ranked
        .iter()
        .enumerate()
        .map(|(index, (term, _))| (*term, index))
        .collect();

    // Document frequency over the retained vocabulary
    let mut document_frequency = vec![0usize; vocabulary.len()];
    for doc in &doc_terms {
        let mut seen = vec![false; vocabulary.len()];
        for term in doc {
            if let Some(&index) = vocabulary.get(term.as_str()) {
                if !seen[index] {
                    seen[index] = true;
                    document_frequency[index] += 1;
                }
            }
        }
    }

    let doc_count = documents.len() as f64;
    let idf: Vec<f64> = document_frequency
        .iter()
        .map(|&df| ((1.0 + doc_count) / (1.0 + df as f64)).ln() + 1.0)
        .collect();

    doc_terms
        .iter()
        .map(|doc| {
            let mut vector: SparseVector = HashMap::new();
            for term in doc {
                if let Some(&index) = vocabulary.get(term.as_str()) {
                    *vector.entry(index).or_insert(0.0) += idf[index];
                }
            }

            let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for value in vector.values_mut() {
                    *value /= norm;
                }
            }
            vector
        })
        .collect()
}

/// For each candidate document, the highest cosine similarity against any
/// reference document.
///
/// Both sets are vectorized together so term statistics are shared. The
/// result is aligned with `candidates`.
pub fn max_similarities(
    references: &[String],
    candidates: &[String],
    max_features: usize,
    bigrams: bool,
) -> Vec<f64> {
    let documents: Vec<&str> = references
        .iter()
        .chain(candidates.iter())
        .map(String::as_str)
        .collect();

    let vectors = vectorize(&documents, max_features, bigrams);
    let (reference_vectors, candidate_vectors) = vectors.split_at(references.len());

    candidate_vectors
        .iter()
        .map(|candidate| {
            reference_vectors
                .iter()
                .map(|reference| dot(reference, candidate))
                .fold(0.0_f64, f64::max)
        })
        .collect()
}

/// Cosine similarity between two documents with an uncapped unigram
/// vocabulary
pub fn cosine_pair(left: &str, right: &str) -> f64 {
    let vectors = vectorize(&[left, right], usize::MAX, false);
    dot(&vectors[0], &vectors[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_documents_are_fully_similar() {
        let sim = cosine_pair("rust ownership borrowing", "rust ownership borrowing");
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_documents_have_zero_similarity() {
        let sim = cosine_pair("rust ownership borrowing", "french cooking pastry");
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_similarity_is_symmetric_and_bounded() {
        let a = "databases sql indexing transactions";
        let b = "sql queries joins indexing";

        let forward = cosine_pair(a, b);
        let backward = cosine_pair(b, a);

        assert!((forward - backward).abs() < 1e-9);
        assert!(forward > 0.0 && forward < 1.0);
    }

    #[test]
    fn test_stop_words_and_short_tokens_carry_no_signal() {
        let sim = cosine_pair("the of and a is", "the of and a is");
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_max_similarities_aligns_with_candidates() {
        let references = vec!["rust systems programming".to_string()];
        let candidates = vec![
            "rust systems programming".to_string(),
            "watercolor painting basics".to_string(),
        ];

        let sims = max_similarities(&references, &candidates, COURSE_VOCAB_LIMIT, true);
        assert_eq!(sims.len(), 2);
        assert!(sims[0] > 0.9);
        assert_eq!(sims[1], 0.0);
    }

    #[test]
    fn test_vocabulary_cap_limits_terms() {
        let documents = vec!["alpha beta gamma delta", "alpha beta gamma delta"];
        let vectors = vectorize(&documents, 2, false);

        assert!(vectors[0].len() <= 2);
        assert!(vectors[1].len() <= 2);
    }

    #[test]
    fn test_bigrams_reward_matching_word_order() {
        let references = vec!["machine learning fundamentals".to_string()];
        let candidates = vec![
            "machine learning".to_string(),
            "learning machine".to_string(),
        ];

        let sims = max_similarities(&references, &candidates, COURSE_VOCAB_LIMIT, true);
        assert!(sims[0] > sims[1]);
        assert!(sims[1] > 0.0);
    }
}
