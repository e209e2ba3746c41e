//! Corpus input: articles, newline-delimited JSON reading, and
//! fixed-size character chunking.

pub mod article;
pub mod chunk;
pub mod chunker;
pub mod reader;

pub use article::{Article, MediaType};
pub use chunk::Chunk;
pub use chunker::{ChunkSplitter, DEFAULT_MAX_CHUNK_CHARS};
pub use reader::{InputError, JsonlReader, Validate};
