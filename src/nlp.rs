//! Language capabilities the pipeline consults.
//!
//! Both are traits injected at construction so callers can plug in a real
//! parser or embedding model, and tests can use deterministic stubs. The
//! bundled implementations need no model files.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::error::Result;

/// Answers whether a fragment reads as a full clause (subject and verb).
pub trait GrammaticalAnalyzer: Send + Sync {
    fn is_clause(&self, text: &str) -> Result<bool>;
}

/// Maps texts to fixed-length vectors, one per input, in one batch.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'’]*").unwrap());

const SUBJECT_PRONOUNS: &[&str] = &[
    "i", "we", "you", "he", "she", "it", "they", "this", "these", "those", "there", "that",
    "who", "which", "everyone", "someone", "nobody",
];

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "our", "your", "their", "his", "her", "its", "my", "each", "every",
    "all", "some", "many", "most", "no", "any", "both",
];

const FINITE_VERBS: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "am", "has", "have", "had", "do", "does", "did",
    "will", "would", "can", "could", "should", "shall", "may", "might", "must", "include",
    "includes", "included", "provide", "provides", "offer", "offers", "make", "makes", "made",
    "take", "takes", "took", "give", "gives", "gave", "need", "needs", "want", "wants", "see",
    "sees", "saw", "find", "finds", "found", "go", "goes", "went", "get", "gets", "got", "use",
    "uses", "require", "requires", "describe", "describes", "list", "lists", "show", "shows",
    "contain", "contains", "follow", "follows", "become", "becomes", "became", "seem", "seems",
    "remain", "remains", "know", "knows", "knew", "think", "thinks", "thought", "say", "says",
    "said", "run", "runs", "ran", "come", "comes", "came", "help", "helps", "allow", "allows",
];

/// Lexicon and suffix based clause detector.
///
/// A fragment is a clause when a subject (a pronoun, or a determiner led noun
/// phrase) is followed by a finite verb (auxiliary, common verb, or a past
/// tense `-ed` form).
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalAnalyzer;

impl LexicalAnalyzer {
    fn is_verb(word: &str, previous: Option<&str>) -> bool {
        if FINITE_VERBS.contains(&word) {
            return true;
        }
        if word.len() > 4 && word.ends_with("ed") {
            return true;
        }
        // "The committee meets", third person after a noun.
        word.len() > 3
            && word.ends_with('s')
            && !word.ends_with("ss")
            && !word.ends_with("us")
            && previous.is_some_and(|p| !DETERMINERS.contains(&p) && !p.ends_with('s'))
    }
}

impl GrammaticalAnalyzer for LexicalAnalyzer {
    fn is_clause(&self, text: &str) -> Result<bool> {
        let words: Vec<String> = WORD
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect();

        let mut subject_at = None;
        for (i, word) in words.iter().enumerate() {
            if SUBJECT_PRONOUNS.contains(&word.as_str()) {
                subject_at = Some(i + 1);
                break;
            }
            if DETERMINERS.contains(&word.as_str()) && i + 1 < words.len() {
                subject_at = Some(i + 2);
                break;
            }
        }

        let Some(start) = subject_at else {
            return Ok(false);
        };
        let has_verb = (start..words.len()).any(|i| {
            let previous = if i > 0 { Some(words[i - 1].as_str()) } else { None };
            Self::is_verb(&words[i], previous)
        });
        Ok(has_verb)
    }
}

/// Deterministic bag-of-words embedder: unigrams and bigrams hashed into a
/// fixed number of buckets, L2-normalized.
///
/// Measures word overlap, not meaning. Never installed by default; callers
/// opt in for offline runs and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    stopwords: HashSet<&'static str>,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            stopwords: ["query", "passage", "the", "a", "an", "and", "or", "of", "to", "in", "for"]
                .into_iter()
                .collect(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = WORD
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|t| !self.stopwords.contains(t.as_str()))
            .collect();

        for token in &tokens {
            vector[fnv1a(token.as_bytes()) as usize % self.dimension] += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[fnv1a(bigram.as_bytes()) as usize % self.dimension] += 0.5;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Cosine similarity; zero when either vector is empty, zero-length or the
/// dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
