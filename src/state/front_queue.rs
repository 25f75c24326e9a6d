//! Front-ordered queue
//!
//! `push` prepends a batch keeping its internal order; `pop` takes the single
//! frontmost element. `append` adds to the back.

use std::collections::VecDeque;

/// Queue where new batches jump ahead of what is already waiting
#[derive(Debug, Clone, PartialEq)]
pub struct FrontQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for FrontQueue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> FrontQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `batch`, preserving its order
    pub fn push(&mut self, batch: impl IntoIterator<Item = T>) {
        let batch: Vec<T> = batch.into_iter().collect();
        for item in batch.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    /// Add `batch` after everything already queued
    pub fn append(&mut self, batch: impl IntoIterator<Item = T>) {
        self.items.extend(batch);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Frontmost element without removing it
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Remove and return everything, front first
    pub fn take_all(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

impl<T: Clone> FrontQueue<T> {
    /// Snapshot of the contents, front first
    pub fn all(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> FromIterator<T> for FrontQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_prepends_batch_in_order() {
        let mut queue: FrontQueue<i32> = [3, 4].into_iter().collect();
        queue.push([1, 2]);
        assert_eq!(queue.all(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_pop_takes_front() {
        let mut queue = FrontQueue::new();
        queue.append([1, 2]);
        queue.append([3]);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.front(), Some(&2));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_take_all_empties() {
        let mut queue: FrontQueue<&str> = ["a", "b"].into_iter().collect();
        assert_eq!(queue.take_all(), vec!["a", "b"]);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
