//! TF-IDF vocabulary fitting and transformation.

use std::collections::HashMap;

use tracing::debug;

use recofine_core::{Error, Result};
use recofine_matrix::CsrMatrix;

use crate::stop_words::is_english_stop_word;
use crate::tokenizer::tokenize;

/// Vectorizer configuration. `fit` produces the [`Vocabulary`] that
/// transforms documents.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    stop_words: bool,
    max_features: Option<usize>,
    max_documents: Option<usize>,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TfidfVectorizer {
    /// English stop words removed, unbounded vocabulary.
    pub fn new() -> Self {
        Self {
            stop_words: true,
            max_features: None,
            max_documents: None,
        }
    }

    pub fn with_stop_words(mut self, enable: bool) -> Self {
        self.stop_words = enable;
        self
    }

    /// Keep only the `max_features` most frequent terms.
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Refuse corpora larger than `max_documents` rows.
    pub fn with_max_documents(mut self, max_documents: usize) -> Self {
        self.max_documents = Some(max_documents);
        self
    }

    fn terms(&self, text: &str) -> Vec<String> {
        let mut tokens = tokenize(text);
        if self.stop_words {
            tokens.retain(|t| !is_english_stop_word(t));
        }
        tokens
    }

    /// Build the vocabulary and IDF weights over the whole corpus.
    pub fn fit<S: AsRef<str>>(&self, documents: &[S]) -> Result<Vocabulary> {
        let n_docs = documents.len();
        if let Some(max) = self.max_documents {
            if n_docs > max {
                return Err(Error::Vectorize(format!(
                    "corpus of {} documents exceeds the limit of {}",
                    n_docs, max
                )));
            }
        }

        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let mut terms = self.terms(doc.as_ref());
            for t in &terms {
                *term_freq.entry(t.clone()).or_insert(0) += 1;
            }
            terms.sort_unstable();
            terms.dedup();
            for t in terms {
                *doc_freq.entry(t).or_insert(0) += 1;
            }
        }

        let mut kept: Vec<String> = term_freq.keys().cloned().collect();
        if let Some(max) = self.max_features {
            if kept.len() > max {
                kept.sort_by(|a, b| term_freq[b].cmp(&term_freq[a]).then_with(|| a.cmp(b)));
                kept.truncate(max);
            }
        }
        kept.sort();

        if kept.len() > u32::MAX as usize {
            return Err(Error::Vectorize("vocabulary too large".into()));
        }

        let n = n_docs as f64;
        let idf: Vec<f32> = kept
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                (((1.0 + n) / (1.0 + df)).ln() + 1.0) as f32
            })
            .collect();
        let terms: HashMap<String, u32> = kept
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t, i as u32))
            .collect();

        debug!(
            "Fitted vocabulary: {} terms over {} documents",
            terms.len(),
            n_docs
        );

        Ok(Vocabulary {
            vectorizer: self.clone(),
            terms,
            idf,
        })
    }
}

/// Fitted vocabulary: term → column index plus per-column IDF.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    vectorizer: TfidfVectorizer,
    terms: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn index_of(&self, term: &str) -> Option<u32> {
        self.terms.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.index_of(term).map(|i| self.idf[i as usize])
    }

    /// L2-normalized TF-IDF vector of one document. Out-of-vocabulary terms
    /// are ignored; a document with no known term yields an empty row.
    pub fn transform_one(&self, document: &str) -> Vec<(u32, f32)> {
        let mut counts: HashMap<u32, f64> = HashMap::new();
        for term in self.vectorizer.terms(document) {
            if let Some(idx) = self.index_of(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        let weighted: Vec<(u32, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx as usize] as f64))
            .collect();
        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Vec::new();
        }
        let mut row: Vec<(u32, f32)> = weighted
            .into_iter()
            .map(|(idx, w)| (idx, (w / norm) as f32))
            .collect();
        row.sort_unstable_by_key(|&(idx, _)| idx);
        row
    }

    /// One row per document, in corpus order, in this vocabulary's space.
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<CsrMatrix> {
        CsrMatrix::from_rows(
            self.len(),
            documents.iter().map(|d| self.transform_one(d.as_ref())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_builds_sorted_vocabulary() {
        let vocab = TfidfVectorizer::new()
            .fit(&["red car", "red bike", "the blue boat"])
            .unwrap();
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.index_of("bike"), Some(0));
        assert_eq!(vocab.index_of("red"), Some(4));
        assert_eq!(vocab.index_of("the"), None);
        // smooth idf: ln((1+3)/(1+2)) + 1
        let idf_red = vocab.idf("red").unwrap();
        assert!((idf_red - ((4.0f64 / 3.0).ln() + 1.0) as f32).abs() < 1e-6);
        assert!(vocab.idf("car").unwrap() > idf_red);
    }

    #[test]
    fn test_rows_are_normalized_and_aligned() {
        let docs = ["red car", "red bike", "blue boat", ""];
        let vectorizer = TfidfVectorizer::new();
        let vocab = vectorizer.fit(&docs).unwrap();
        let matrix = vocab.transform(&docs).unwrap();
        assert_eq!(matrix.n_rows(), 4);
        assert_eq!(matrix.n_cols(), vocab.len());
        for i in 0..3 {
            assert!((matrix.row(i).norm() - 1.0).abs() < 1e-5);
        }
        // Empty document still gets a (zero) row.
        assert!(matrix.row(3).is_empty());

        let sim_12 = matrix.row(0).dot(&matrix.row(1));
        assert!(sim_12 > 0.1);
        assert_eq!(matrix.row(0).dot(&matrix.row(2)), 0.0);
    }

    #[test]
    fn test_shared_vocabulary_reused_for_other_documents() {
        let vocab = TfidfVectorizer::new().fit(&["alpha beta", "beta gamma"]).unwrap();
        let row = vocab.transform_one("gamma delta delta");
        assert_eq!(row.len(), 1);
        assert_eq!(row[0].0, vocab.index_of("gamma").unwrap());
        assert!((row[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let vocab = TfidfVectorizer::new()
            .with_max_features(2)
            .fit(&["rock rock pop", "rock jazz pop", "blues"])
            .unwrap();
        assert_eq!(vocab.len(), 2);
        assert!(vocab.index_of("rock").is_some());
        assert!(vocab.index_of("pop").is_some());
        assert!(vocab.index_of("blues").is_none());
    }

    #[test]
    fn test_corpus_limit_is_fatal() {
        let result = TfidfVectorizer::new()
            .with_max_documents(2)
            .fit(&["one doc", "two doc", "three doc"]);
        assert!(matches!(result, Err(Error::Vectorize(_))));
    }

    #[test]
    fn test_empty_corpus() {
        let docs: [&str; 0] = [];
        let vocab = TfidfVectorizer::new().fit(&docs).unwrap();
        assert!(vocab.is_empty());
        assert_eq!(vocab.transform(&docs).unwrap().n_rows(), 0);
    }

    #[test]
    fn test_stop_words_can_be_kept() {
        let vocab = TfidfVectorizer::new()
            .with_stop_words(false)
            .fit(&["the end"])
            .unwrap();
        assert!(vocab.index_of("the").is_some());
    }
}
