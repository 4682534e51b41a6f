//! RecoFine Ingest: builds one normalized text document ("soup") per
//! catalog item from its feature columns.

pub mod builder;
pub mod normalize;

pub use builder::{build_soup, Document, DocumentBuilder};
pub use normalize::{normalize, MAX_LIST_VALUES};
