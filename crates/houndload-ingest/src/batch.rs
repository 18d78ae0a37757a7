//! Mini-batch assembly and upload chunking
//!
//! Records are grouped into mini-batches before they reach a transformer, and
//! a transformer's property lists are cut into upload chunks before they reach
//! the database. Both cuts keep arrival order.

use crate::extract::Record;

/// Records handed to one transformer invocation
pub type MiniBatch = Vec<Record>;

/// Groups a fallible record sequence into batches of at most `size` items
///
/// The last batch may be shorter. If the upstream fails, the items gathered so
/// far are yielded as one more batch before the error, then iteration stops.
pub struct MiniBatches<I, E> {
    records: I,
    size: usize,
    deferred: Option<E>,
    exhausted: bool,
}

impl<I, E> MiniBatches<I, E> {
    pub fn new(records: I, size: usize) -> Self {
        Self {
            records,
            size: size.max(1),
            deferred: None,
            exhausted: false,
        }
    }
}

impl<I, T, E> Iterator for MiniBatches<I, E>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<Vec<T>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.deferred.take() {
            return Some(Err(err));
        }
        if self.exhausted {
            return None;
        }

        let mut batch = Vec::with_capacity(self.size);
        while batch.len() < self.size {
            match self.records.next() {
                Some(Ok(record)) => batch.push(record),
                Some(Err(err)) => {
                    self.exhausted = true;
                    if batch.is_empty() {
                        return Some(Err(err));
                    }
                    self.deferred = Some(err);
                    break;
                },
                None => {
                    self.exhausted = true;
                    break;
                },
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

/// Split `items` into consecutive slices of at most `size` elements
pub fn chunk_sequence<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn batches_of(n: usize, size: usize) -> Vec<Vec<usize>> {
        MiniBatches::new((0..n).map(Ok::<_, String>), size)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_exact_multiple() {
        let batches = batches_of(400, 200);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 200));
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(batches_of(0, 200).is_empty());
    }

    #[test]
    fn test_error_after_partial_batch() {
        let input = vec![Ok(1), Ok(2), Err("boom".to_string()), Ok(4)];
        let mut batches = MiniBatches::new(input.into_iter(), 200);

        assert_eq!(batches.next(), Some(Ok(vec![1, 2])));
        assert_eq!(batches.next(), Some(Err("boom".to_string())));
        assert_eq!(batches.next(), None);
    }

    #[test]
    fn test_error_on_batch_boundary() {
        let input = vec![Ok(1), Ok(2), Err("boom".to_string())];
        let mut batches = MiniBatches::new(input.into_iter(), 2);

        assert_eq!(batches.next(), Some(Ok(vec![1, 2])));
        assert_eq!(batches.next(), Some(Err("boom".to_string())));
        assert_eq!(batches.next(), None);
    }

    #[test]
    fn test_chunk_sequence_sizes() {
        let items: Vec<u32> = (0..25_001).collect();
        let sizes: Vec<usize> = chunk_sequence(&items, 10_000).map(<[u32]>::len).collect();
        assert_eq!(sizes, vec![10_000, 10_000, 5_001]);
        assert_eq!(chunk_sequence::<u32>(&[], 10_000).count(), 0);
    }

    proptest! {
        #[test]
        fn prop_batches_preserve_order_and_size(n in 0usize..2_000, size in 1usize..300) {
            let batches = batches_of(n, size);

            prop_assert_eq!(batches.len(), n.div_ceil(size));
            if let Some((last, full)) = batches.split_last() {
                prop_assert!(full.iter().all(|b| b.len() == size));
                prop_assert!(!last.is_empty() && last.len() <= size);
            }
            let flat: Vec<usize> = batches.into_iter().flatten().collect();
            prop_assert_eq!(flat, (0..n).collect::<Vec<_>>());
        }

        #[test]
        fn prop_chunks_cover_input(m in 0usize..50_000, size in 1usize..20_000) {
            let items: Vec<usize> = (0..m).collect();
            let chunks: Vec<&[usize]> = chunk_sequence(&items, size).collect();

            prop_assert_eq!(chunks.len(), m.div_ceil(size));
            prop_assert!(chunks.iter().all(|c| c.len() <= size));
            prop_assert_eq!(chunks.concat(), items);
        }
    }
}
