use bytes::{Bytes, BytesMut};
use std::collections::TryReserveError;
use std::collections::VecDeque;

/// An ordered list of owned byte chunks.
///
/// Chunks are appended at the head and drained from the tail, so the tail
/// is always the oldest chunk still held. Appending moves the chunk in
/// without copying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentedBuffer {
    chunks: VecDeque<Bytes>,
    byte_len: usize,
}

impl SegmentedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk. On allocation failure the buffer is left untouched.
    pub fn append(&mut self, chunk: impl Into<Bytes>) -> Result<(), TryReserveError> {
        let chunk = chunk.into();
        self.chunks.try_reserve(1)?;
        self.byte_len += chunk.len();
        self.chunks.push_back(chunk);
        Ok(())
    }

    /// Oldest chunk still held.
    pub fn peek_tail(&self) -> Option<&Bytes> {
        self.chunks.front()
    }

    /// Removes and returns the oldest chunk.
    pub fn drop_tail(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.byte_len -= chunk.len();
        Some(chunk)
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total number of bytes across all chunks.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Chunks from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }

    /// Concatenates every chunk into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks[0].clone(),
            _ => {
                let mut out = BytesMut::with_capacity(self.byte_len);
                for chunk in &self.chunks {
                    out.extend_from_slice(chunk);
                }
                out.freeze()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_append_order() {
        let mut buf = SegmentedBuffer::new();
        buf.append(Bytes::from_static(b"one")).unwrap();
        buf.append(b"two".to_vec()).unwrap();

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.byte_len(), 6);
        assert_eq!(buf.peek_tail().unwrap().as_ref(), b"one");
        assert_eq!(buf.drop_tail().unwrap().as_ref(), b"one");
        assert_eq!(buf.drop_tail().unwrap().as_ref(), b"two");
        assert!(buf.drop_tail().is_none());
        assert_eq!(buf.byte_len(), 0);
    }
}
