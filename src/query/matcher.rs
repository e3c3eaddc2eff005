//! Matcher implementations iterating the documents of one segment.

use std::fmt::Debug;

use bit_vec::BitVec;

use crate::error::Result;
use crate::index::DocId;

/// Sentinel returned by [`Matcher::doc_id`] once a matcher is exhausted or
/// before it was positioned.
pub const NO_MORE_DOCS: DocId = DocId::MAX;

/// Trait for document matchers.
///
/// A fresh matcher is unpositioned; the first call to [`next`](Matcher::next)
/// moves it to the first matching document. Documents are produced in
/// ascending segment-local id order.
pub trait Matcher: Send + Debug {
    /// Get the current document ID.
    fn doc_id(&self) -> DocId;

    /// Move to the next matching document.
    fn next(&mut self) -> Result<bool>;

    /// Skip to the first document >= target.
    fn skip_to(&mut self, target: DocId) -> Result<bool>;

    /// Get the cost of iterating through this matcher.
    fn cost(&self) -> u64;

    /// Check if this matcher is exhausted.
    fn is_exhausted(&self) -> bool;
}

/// A matcher that matches no documents.
#[derive(Debug, Default)]
pub struct EmptyMatcher;

impl EmptyMatcher {
    /// Create a new empty matcher.
    pub fn new() -> Self {
        EmptyMatcher
    }
}

impl Matcher for EmptyMatcher {
    fn doc_id(&self) -> DocId {
        NO_MORE_DOCS
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn skip_to(&mut self, _target: DocId) -> Result<bool> {
        Ok(false)
    }

    fn cost(&self) -> u64 {
        0
    }

    fn is_exhausted(&self) -> bool {
        true
    }
}

/// A matcher that matches all documents.
#[derive(Debug)]
pub struct AllMatcher {
    current_doc: Option<DocId>,
    max_doc: DocId,
}

impl AllMatcher {
    /// Create a new all matcher.
    pub fn new(max_doc: DocId) -> Self {
        AllMatcher {
            current_doc: None,
            max_doc,
        }
    }
}

impl Matcher for AllMatcher {
    fn doc_id(&self) -> DocId {
        match self.current_doc {
            Some(doc) if doc < self.max_doc => doc,
            _ => NO_MORE_DOCS,
        }
    }

    fn next(&mut self) -> Result<bool> {
        let next = match self.current_doc {
            None => 0,
            Some(doc) if doc >= self.max_doc => return Ok(false),
            Some(doc) => doc + 1,
        };
        self.current_doc = Some(next);
        Ok(next < self.max_doc)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        let target = match self.current_doc {
            Some(doc) if doc >= target => doc,
            _ => target,
        };
        self.current_doc = Some(target.min(self.max_doc));
        Ok(target < self.max_doc)
    }

    fn cost(&self) -> u64 {
        self.max_doc as u64
    }

    fn is_exhausted(&self) -> bool {
        matches!(self.current_doc, Some(doc) if doc >= self.max_doc)
    }
}

/// A matcher over the set bits of a segment-local bitset.
#[derive(Debug)]
pub struct BitSetMatcher {
    bits: BitVec,
    current_doc: Option<DocId>,
    cost: u64,
}

impl BitSetMatcher {
    /// Create a matcher over `bits`; bit `i` set means document `i` matches.
    pub fn new(bits: BitVec) -> Self {
        let cost = bits.iter().filter(|set| *set).count() as u64;
        BitSetMatcher {
            bits,
            current_doc: None,
            cost,
        }
    }

    fn advance_from(&mut self, from: usize) -> bool {
        let len = self.bits.len();
        let found = (from..len).find(|&idx| self.bits.get(idx).unwrap_or(false));
        match found {
            Some(idx) => {
                self.current_doc = Some(idx as DocId);
                true
            }
            None => {
                self.current_doc = Some(NO_MORE_DOCS);
                false
            }
        }
    }
}

impl Matcher for BitSetMatcher {
    fn doc_id(&self) -> DocId {
        self.current_doc.unwrap_or(NO_MORE_DOCS)
    }

    fn next(&mut self) -> Result<bool> {
        let from = match self.current_doc {
            None => 0,
            Some(NO_MORE_DOCS) => return Ok(false),
            Some(doc) => doc as usize + 1,
        };
        Ok(self.advance_from(from))
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        match self.current_doc {
            Some(NO_MORE_DOCS) => Ok(false),
            Some(doc) if doc >= target => Ok(true),
            _ => Ok(self.advance_from(target as usize)),
        }
    }

    fn cost(&self) -> u64 {
        self.cost
    }

    fn is_exhausted(&self) -> bool {
        self.current_doc == Some(NO_MORE_DOCS)
    }
}
