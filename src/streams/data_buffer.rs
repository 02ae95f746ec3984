use bytes::{Buf, Bytes};

/// A chunk of bytes delivered by a push-based byte source.
///
/// Chunks may come from a pool; whoever ends up holding one must hand it back
/// through [`DataBuffer::release`] instead of letting it fall out of scope.
pub trait DataBuffer: Send + 'static {
    /// Bytes left to read.
    fn remaining(&self) -> usize;

    /// Contiguous readable bytes, possibly fewer than [`Self::remaining`].
    fn chunk(&self) -> &[u8];

    /// Consume `n` bytes. `n` must not exceed [`Self::remaining`].
    fn advance(&mut self, n: usize);

    /// Give the buffer back to its owner.
    fn release(self)
    where
        Self: Sized,
    {
    }

    /// Copy as many bytes as fit into `dst`, returning the count.
    fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() && self.remaining() > 0 {
            let src = self.chunk();
            let n = src.len().min(dst.len() - copied);
            dst[copied..copied + n].copy_from_slice(&src[..n]);
            self.advance(n);
            copied += n;
        }
        copied
    }
}

/// Heap-allocated chunk with a read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapBuffer {
    data: Vec<u8>,
    position: usize,
}

impl HeapBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl From<Vec<u8>> for HeapBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for HeapBuffer {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl DataBuffer for HeapBuffer {
    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn chunk(&self) -> &[u8] {
        &self.data[self.position..]
    }

    fn advance(&mut self, n: usize) {
        self.position = (self.position + n).min(self.data.len());
    }
}

impl DataBuffer for Bytes {
    fn remaining(&self) -> usize {
        Buf::remaining(self)
    }

    fn chunk(&self) -> &[u8] {
        Buf::chunk(self)
    }

    fn advance(&mut self, n: usize) {
        Buf::advance(self, n)
    }
}
