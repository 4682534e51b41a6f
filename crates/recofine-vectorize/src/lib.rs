//! RecoFine Vectorize: turns a corpus of soups into sparse weighted vectors.
//!
//! Vectorization is two explicit steps: [`TfidfVectorizer::fit`] builds one
//! [`Vocabulary`] over the whole corpus, then [`Vocabulary::transform`]
//! projects every document into that shared feature space. Rows are
//! L2-normalized, so cosine similarity is a plain dot product.

pub mod stop_words;
pub mod tfidf;
pub mod tokenizer;

pub use tfidf::{TfidfVectorizer, Vocabulary};
pub use tokenizer::tokenize;
