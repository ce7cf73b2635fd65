//! PCM chunk FIFO with zero-padded reads.
//!
//! `pull(n)` always returns exactly `n` samples, padding with zeros past
//! end-of-data. That guarantee is what keeps the recorder's stereo timeline
//! glued to wall-clock time no matter how unevenly the two sources arrive.

use std::collections::VecDeque;

/// FIFO of PCM chunks with a sample cursor into the head chunk.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    chunks: VecDeque<Vec<i16>>,
    head_offset: usize,
    buffered: usize,
}

impl ChunkQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of samples. Empty chunks are ignored.
    pub fn push(&mut self, pcm: Vec<i16>) {
        if pcm.is_empty() {
            return;
        }
        self.buffered += pcm.len();
        self.chunks.push_back(pcm);
    }

    /// Remove and return exactly `n` samples, zero-padding past
    /// end-of-data.
    pub fn pull(&mut self, n: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(n);

        while out.len() < n {
            let Some(head) = self.chunks.front() else {
                break;
            };
            let available = head.len() - self.head_offset;
            let take = available.min(n - out.len());
            out.extend_from_slice(&head[self.head_offset..self.head_offset + take]);
            self.head_offset += take;
            self.buffered -= take;

            if self.head_offset == head.len() {
                self.chunks.pop_front();
                self.head_offset = 0;
            }
        }

        out.resize(n, 0);
        out
    }

    /// Number of buffered samples.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Whether no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffered == 0
    }

    /// Drop all buffered samples.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.head_offset = 0;
        self.buffered = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_from_empty_is_zeros() {
        let mut queue = ChunkQueue::new();
        assert_eq!(queue.pull(480), vec![0i16; 480]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pull_exact_returns_unmodified() {
        let mut queue = ChunkQueue::new();
        let samples: Vec<i16> = (0..480).map(|i| i as i16).collect();
        queue.push(samples.clone());
        assert_eq!(queue.pull(480), samples);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pull_pads_past_end_of_data() {
        let mut queue = ChunkQueue::new();
        queue.push(vec![7i16; 100]);
        let out = queue.pull(480);
        assert_eq!(out.len(), 480);
        assert_eq!(&out[..100], &[7i16; 100][..]);
        assert_eq!(&out[100..], &[0i16; 380][..]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pull_spans_chunks_with_cursor() {
        let mut queue = ChunkQueue::new();
        queue.push(vec![1i16; 300]);
        queue.push(vec![2i16; 300]);

        let first = queue.pull(480);
        assert_eq!(&first[..300], &[1i16; 300][..]);
        assert_eq!(&first[300..], &[2i16; 180][..]);
        assert_eq!(queue.buffered(), 120);

        let second = queue.pull(480);
        assert_eq!(&second[..120], &[2i16; 120][..]);
        assert_eq!(&second[120..], &[0i16; 360][..]);
    }

    #[test]
    fn test_empty_push_ignored() {
        let mut queue = ChunkQueue::new();
        queue.push(Vec::new());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut queue = ChunkQueue::new();
        queue.push(vec![5i16; 50]);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.pull(10), vec![0i16; 10]);
    }
}
