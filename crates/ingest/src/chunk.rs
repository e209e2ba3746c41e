use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub article_id: String,
    pub chunk_id: String,
    pub index: usize,
    pub text: String,
    pub offset: (usize, usize), // [start, end) character positions
}

impl Chunk {
    pub fn new(article_id: String, index: usize, text: String, offset: (usize, usize)) -> Self {
        let chunk_id = Self::generate_chunk_id(&article_id, &text, offset);

        Self {
            article_id,
            chunk_id,
            index,
            text,
            offset,
        }
    }

    fn generate_chunk_id(article_id: &str, text: &str, offset: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(article_id.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(offset.0.to_string().as_bytes());
        hasher.update(offset.1.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    /// Number of characters in this chunk
    pub fn char_len(&self) -> usize {
        self.offset.1 - self.offset.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_stable() {
        let a = Chunk::new("a1".to_string(), 0, "hello".to_string(), (0, 5));
        let b = Chunk::new("a1".to_string(), 0, "hello".to_string(), (0, 5));
        let c = Chunk::new("a2".to_string(), 0, "hello".to_string(), (0, 5));

        assert_eq!(a.chunk_id, b.chunk_id);
        assert_ne!(a.chunk_id, c.chunk_id);
        assert_eq!(a.chunk_id.len(), 32);
    }
}
