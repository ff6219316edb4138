// Database module
// LanceDB storage for chunk vectors and their event metadata

pub mod lancedb;

pub use self::lancedb::{ChunkRecord, RetrievedChunk, SearchFilters, VectorStore};
