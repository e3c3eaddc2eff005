//! A bounded binary heap ordered by an external less-than function.
//!
//! Collectors rank entries with comparators that live outside the entries
//! themselves (slot based field comparators, per-shard cursors), so the
//! ordering cannot be expressed through `Ord`. Every mutating operation takes
//! the `less` function instead; the element at the top is always the least one.
//!
//! For top-K collection `less(a, b)` answers "does `a` rank worse than `b`",
//! which keeps the weakest competitor at the top where it can be replaced.

/// Binary min-heap holding at most `max_size` elements.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    heap: Vec<T>,
    max_size: usize,
}

impl<T> PriorityQueue<T> {
    /// Create a queue holding at most `max_size` elements.
    pub fn new(max_size: usize) -> Self {
        PriorityQueue {
            heap: Vec::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Create a queue without a size bound.
    pub fn unbounded() -> Self {
        PriorityQueue {
            heap: Vec::new(),
            max_size: usize::MAX,
        }
    }

    /// Maximum number of elements.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue holds no element.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether the queue reached its size bound.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.max_size
    }

    /// The least element.
    pub fn top(&self) -> Option<&T> {
        self.heap.first()
    }

    /// Mutable access to the least element. Call [`update_top`](Self::update_top)
    /// after changing it.
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.heap.first_mut()
    }

    /// Iterate over the elements in heap order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.heap.iter()
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Add an element. The caller must make sure the queue is not full.
    pub fn push<F>(&mut self, item: T, mut less: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        self.heap.push(item);
        let last = self.heap.len() - 1;
        self.sift_up(last, &mut less);
    }

    /// Add an element if there is room, otherwise replace the top when the new
    /// element is greater than it.
    ///
    /// Returns the element that fell out of the queue: `None` when the item was
    /// added without eviction, the evicted top, or the item itself when it was
    /// not competitive.
    pub fn insert_with_overflow<F>(&mut self, item: T, mut less: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> bool,
    {
        if self.max_size == 0 {
            return Some(item);
        }
        if self.heap.len() < self.max_size {
            self.push(item, less);
            return None;
        }
        if less(&self.heap[0], &item) {
            let evicted = std::mem::replace(&mut self.heap[0], item);
            self.sift_down(0, &mut less);
            Some(evicted)
        } else {
            Some(item)
        }
    }

    /// Remove and return the least element.
    pub fn pop<F>(&mut self, mut less: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> bool,
    {
        if self.heap.is_empty() {
            return None;
        }
        let item = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0, &mut less);
        }
        Some(item)
    }

    /// Restore the heap after the top element changed.
    pub fn update_top<F>(&mut self, mut less: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        if !self.heap.is_empty() {
            self.sift_down(0, &mut less);
        }
    }

    /// Drain the queue, least element first.
    pub fn into_sorted_vec<F>(mut self, mut less: F) -> Vec<T>
    where
        F: FnMut(&T, &T) -> bool,
    {
        let mut sorted = Vec::with_capacity(self.heap.len());
        while let Some(item) = self.pop(&mut less) {
            sorted.push(item);
        }
        sorted
    }

    fn sift_up<F>(&mut self, mut pos: usize, less: &mut F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if less(&self.heap[pos], &self.heap[parent]) {
                self.heap.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down<F>(&mut self, mut pos: usize, less: &mut F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && less(&self.heap[right], &self.heap[left]) {
                right
            } else {
                left
            };
            if less(&self.heap[child], &self.heap[pos]) {
                self.heap.swap(pos, child);
                pos = child;
            } else {
                break;
            }
        }
    }
}
