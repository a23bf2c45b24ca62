use std::cmp::Ordering;
use std::fmt;

type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Array-backed binary min-heap with a pluggable comparator.
///
/// Indices are 0-based: the root lives at `0` and the children of `i` at
/// `2i + 1` and `2i + 2`. Unlike `std::collections::BinaryHeap` the root can
/// be mutated in place and restored with [`min_heapify`](Self::min_heapify),
/// and any index can be removed with [`bubble`](Self::bubble).
pub struct BinaryHeap<T> {
    items: Vec<T>,
    cmp: Comparator<T>,
}

impl<T: Ord + 'static> BinaryHeap<T> {
    pub fn new() -> Self {
        Self::with_comparator(|a: &T, b: &T| a.cmp(b))
    }
}

impl<T: Ord + 'static> Default for BinaryHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BinaryHeap<T> {
    /// Create an empty heap ordered by `cmp`; the smallest item sits at the root.
    pub fn with_comparator<F>(cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            items: Vec::new(),
            cmp: Box::new(cmp),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Mutable access to the root.
    ///
    /// Changing the root's ordering key breaks the heap until
    /// `min_heapify(0)` is called.
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.items.first_mut()
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn insert(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    /// Remove and return the smallest item.
    pub fn remove_head(&mut self) -> Option<T> {
        self.bubble(0)
    }

    /// Remove the item at `idx`, fill the hole with the last item and restore order.
    pub fn bubble(&mut self, idx: usize) -> Option<T> {
        if idx >= self.items.len() {
            return None;
        }

        let removed = self.items.swap_remove(idx);
        if idx < self.items.len() {
            // The moved-in item may belong above or below the hole.
            self.min_heapify(idx);
            self.sift_up(idx);
        }
        Some(removed)
    }

    /// Push the item at `idx` down until neither child is smaller.
    pub fn min_heapify(&mut self, mut idx: usize) {
        let size = self.items.len();

        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut min = idx;

            if left < size && self.less(left, min) {
                min = left;
            }
            if right < size && self.less(right, min) {
                min = right;
            }
            if min == idx {
                break;
            }

            self.items.swap(idx, min);
            idx = min;
        }
    }

    /// Remove the first item matching `pred`.
    pub fn remove_where(&mut self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let idx = self.items.iter().position(pred)?;
        self.bubble(idx)
    }

    /// Whether every parent orders at or before both of its children.
    pub fn is_valid(&self) -> bool {
        (1..self.items.len()).all(|child| !self.less(child, (child - 1) / 2))
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent) {
                break;
            }
            self.items.swap(idx, parent);
            idx = parent;
        }
    }

    fn less(&self, a: usize, b: usize) -> bool {
        (self.cmp)(&self.items[a], &self.items[b]) == Ordering::Less
    }
}

impl<T: fmt::Debug> fmt::Debug for BinaryHeap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryHeap")
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_item_lifecycle() {
        let mut heap = BinaryHeap::new();
        assert!(heap.remove_head().is_none());

        heap.insert(3);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.peek(), Some(&3));
        assert_eq!(heap.remove_head(), Some(3));
        assert!(heap.is_empty());
    }

    #[test]
    fn test_bubble_out_of_range() {
        let mut heap = BinaryHeap::new();
        heap.insert(1);
        assert!(heap.bubble(5).is_none());
        assert_eq!(heap.len(), 1);
    }
}
