//! RecoFine Matrix: the distributed-matrix helpers of the similarity engines.
//!
//! A corpus is a CSR matrix of L2-normalized row vectors. It is split into
//! contiguous row chunks ([`partition`]), the full target corpus is shared
//! read-only with every worker ([`Broadcast`]), and each chunk is matched
//! independently against it ([`Matcher`]), yielding thresholded top-K
//! [`SimilarityEdge`]s keyed by external identity.

pub mod broadcast;
pub mod identity;
pub mod matcher;
pub mod partition;
pub mod sparse;

pub use broadcast::{Broadcast, TargetCorpus};
pub use identity::IdentityIndex;
pub use matcher::{canonical_order, ChunkMatches, MatchParams, Matcher, SimilarityEdge};
pub use partition::{partition, Chunk};
pub use sparse::{CsrMatrix, SparseRow};
