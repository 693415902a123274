// ============================================
// Background Jobs Module
// ============================================
//
// Offline refresh of the tables the engine reads at request time:
// 1. User-user similarity (collaborative filtering input)
// 2. Artwork-artwork similarity cache
// 3. Stored recommendation snapshots
//
// Runs once or on an interval depending on `batch.run_once`.

pub mod similarity_batch;

pub use similarity_batch::{BatchJobStats, SimilarityBatchJob};
