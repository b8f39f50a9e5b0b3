use std::collections::VecDeque;

/// A rolling window of the last `N` values, newest first.
#[derive(Clone, Debug)]
pub struct Window<T, const N: usize> {
    values: VecDeque<T>,
}

impl<T: Copy, const N: usize> Window<T, N> {
    pub fn new() -> Self {
        Window {
            values: VecDeque::with_capacity(N),
        }
    }

    /// Inserts the value at the front, dropping the oldest one once the window is full.
    pub fn unshift(&mut self, value: T) {
        self.values.push_front(value);
        self.values.truncate(N);
    }

    /// The newest value.
    pub fn first(&self) -> Option<T> {
        self.values.front().copied()
    }

    /// The oldest value still retained.
    pub fn last(&self) -> Option<T> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.values.iter().copied()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<T: Copy, const N: usize> Default for Window<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_first() {
        let mut window = Window::<u8, 8>::new();
        assert_eq!(window.first(), None);
        for value in 1..=3 {
            window.unshift(value);
        }
        assert_eq!(window.first(), Some(3));
        assert_eq!(window.last(), Some(1));
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![3, 2, 1]);
    }

    #[test]
    fn never_grows_past_capacity() {
        let mut window = Window::<u8, 8>::new();
        for value in 0..20 {
            window.unshift(value);
            assert!(window.len() <= 8);
        }
        assert_eq!(window.len(), 8);
        assert_eq!(window.first(), Some(19));
        assert_eq!(window.last(), Some(12));
    }
}
