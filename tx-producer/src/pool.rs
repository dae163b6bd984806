use std::collections::VecDeque;

use rand::Rng;

/// A bounded, insertion-ordered collection of previously seen entities.
///
/// New entries are appended at the back. Once the pool grows past its
/// ceiling the oldest entries are evicted from the front, so
/// `len() <= ceiling()` holds after every [`push`](RollingPool::push).
#[derive(Debug, Clone)]
pub struct RollingPool<T> {
    entries: VecDeque<T>,
    ceiling: usize,
}

impl<T> RollingPool<T> {
    #[must_use]
    pub fn new(ceiling: usize) -> Self {
        RollingPool {
            entries: VecDeque::with_capacity(ceiling + 1),
            ceiling,
        }
    }

    /// Builds a pool from `seed` entries, keeping only the newest `ceiling` of them.
    #[must_use]
    pub fn seeded(ceiling: usize, seed: impl IntoIterator<Item = T>) -> Self {
        let mut pool = RollingPool::new(ceiling);
        for entry in seed {
            pool.push(entry);
        }
        pool
    }

    /// Appends `entry`, returning the evicted entry if the ceiling was exceeded.
    pub fn push(&mut self, entry: T) -> Option<T> {
        self.entries.push_back(entry);
        if self.entries.len() > self.ceiling {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// A uniformly random entry, or `None` if the pool is empty.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(rng.gen_range(0..self.entries.len()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_push_evicts_oldest() {
        let mut pool = RollingPool::seeded(3, 1..=3);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.push(4), Some(1));
        assert_eq!(pool.push(5), Some(2));
        assert_eq!(pool.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(pool.len(), pool.ceiling());
    }

    #[test]
    fn test_push_below_ceiling() {
        let mut pool = RollingPool::new(10);
        assert!(pool.is_empty());
        assert_eq!(pool.push("a"), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_seeded_keeps_newest() {
        let pool = RollingPool::seeded(2, vec!['a', 'b', 'c', 'd']);
        assert_eq!(pool.iter().copied().collect::<String>(), "cd");
    }

    #[test]
    fn test_choose() {
        let mut rng = StdRng::seed_from_u64(7);
        let empty: RollingPool<u8> = RollingPool::new(4);
        assert!(empty.choose(&mut rng).is_none());

        let pool = RollingPool::seeded(4, 0..4usize);
        let mut seen = [false; 4];
        for _ in 0..200 {
            let chosen = *pool.choose(&mut rng).unwrap();
            seen[chosen] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
