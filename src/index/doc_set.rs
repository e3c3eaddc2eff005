//! Global document id sets backed by a bitset.

use bit_vec::BitVec;

use crate::index::DocId;
use crate::index::reader::LeafReaderContext;

/// A set of global document ids bounded by the index `max_doc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocSet {
    bits: BitVec,
    len: usize,
}

impl DocSet {
    /// Create an empty set for an index of `max_doc` documents.
    pub fn with_max_doc(max_doc: DocId) -> Self {
        DocSet {
            bits: BitVec::from_elem(max_doc as usize, false),
            len: 0,
        }
    }

    /// Create a set from global ids; ids at or above `max_doc` are ignored.
    pub fn from_docs<I>(max_doc: DocId, docs: I) -> Self
    where
        I: IntoIterator<Item = DocId>,
    {
        let mut set = DocSet::with_max_doc(max_doc);
        for doc in docs {
            set.insert(doc);
        }
        set
    }

    /// Add a global id. Returns whether it was newly inserted.
    pub fn insert(&mut self, doc: DocId) -> bool {
        let idx = doc as usize;
        match self.bits.get(idx) {
            Some(false) => {
                self.bits.set(idx, true);
                self.len += 1;
                true
            }
            _ => false,
        }
    }

    /// Whether a global id is in the set.
    pub fn contains(&self, doc: DocId) -> bool {
        self.bits.get(doc as usize).unwrap_or(false)
    }

    /// Number of ids in the set.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = DocId> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(idx, set)| set.then_some(idx as DocId))
    }

    /// Segment-local view of the set: bit `i` is set when `doc_base + i` is in the set.
    pub fn leaf_bits(&self, leaf: &LeafReaderContext) -> BitVec {
        let base = leaf.doc_base as usize;
        let max_doc = leaf.max_doc() as usize;
        let mut bits = BitVec::from_elem(max_doc, false);
        for local in 0..max_doc {
            if self.bits.get(base + local).unwrap_or(false) {
                bits.set(local, true);
            }
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_iterate() {
        let mut set = DocSet::with_max_doc(10);
        assert!(set.insert(7));
        assert!(set.insert(2));
        assert!(!set.insert(7));
        assert!(!set.insert(42));

        assert_eq!(set.len(), 2);
        assert!(set.contains(2));
        assert!(!set.contains(3));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 7]);
    }

    #[test]
    fn test_from_docs() {
        let set = DocSet::from_docs(5, [4, 0, 4, 9]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 4]);
    }
}
