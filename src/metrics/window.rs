// Fixed-capacity FIFO window for rolling metrics history

use std::collections::VecDeque;

/// Keeps only the most recent `capacity` entries; the oldest is evicted first
#[derive(Debug, Clone)]
pub struct BoundedWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting from the front when full
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> BoundedWindow<T> {
    /// The last `n` entries, oldest first
    pub fn tail(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_overflow_keeps_newest() {
        let mut window = BoundedWindow::new(3);
        for i in 1..=5 {
            window.push(i);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.tail(10), vec![3, 4, 5]);
    }

    #[test]
    fn test_tail_shorter_than_window() {
        let mut window = BoundedWindow::new(100);
        for i in 0..50 {
            window.push(i);
        }
        assert_eq!(window.tail(2), vec![48, 49]);
        assert_eq!(window.tail(0), Vec::<i32>::new());
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut window = BoundedWindow::new(0);
        window.push("x");
        assert!(window.is_empty());
    }
}
