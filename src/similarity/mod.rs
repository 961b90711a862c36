//! Similarity fallback: description embeddings and nearest-neighbor search
//!
//! ```text
//! WalletRecord → ActivityProfile → description → Embedder → FlatIndex
//! ```

pub mod description;
pub mod embedding;
pub mod engine;
pub mod index;

pub use description::describe_wallet;
pub use embedding::{Embedder, HashingEmbedder};
pub use engine::{IndexedWallet, SimilarWallet, WalletSimilarity};
pub use index::{FlatIndex, Neighbor};
