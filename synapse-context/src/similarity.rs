//! Similarity math shared by the semantic strategy: cosine similarity over
//! embedding vectors and keyword Jaccard similarity as the fallback.

use std::collections::HashSet;

/// Common English words excluded from keyword sets.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "has", "him", "his", "how", "its", "may", "new", "now", "old", "see", "two",
    "who", "did", "get", "use", "that", "this", "with", "from", "they", "will", "have", "been",
    "were", "what", "when", "your", "than", "then", "them", "there", "their", "would", "could",
    "should", "about", "which", "into", "also", "just", "like", "some", "more", "very", "such",
];

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector is zero or the lengths differ — never
/// divides by zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Jaccard similarity of two keyword sets: |A ∩ B| / |A ∪ B|.
///
/// Two empty sets have similarity 0.0.
#[must_use]
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Extract the keyword set of a text: lowercase alphanumeric words longer
/// than two characters, stop words removed.
#[must_use]
pub fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_owned)
        .collect()
}

/// Element-wise average of a set of equal-length vectors.
///
/// Returns an empty vector when the input is empty. Vectors shorter than the
/// first are padded implicitly by being skipped past their end.
#[must_use]
pub fn average_vector(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut avg = vec![0.0f32; first.len()];
    for v in vectors {
        for (i, x) in v.iter().enumerate().take(avg.len()) {
            avg[i] += x;
        }
    }
    let n = vectors.len() as f32;
    for x in &mut avg {
        *x /= n;
    }
    avg
}
