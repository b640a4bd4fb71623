//! Reservoir sampling (Algorithm R)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform fixed-size sample over a stream of unknown length
#[derive(Debug)]
pub struct Reservoir<T> {
    capacity: usize,
    items: Vec<T>,
    seen: usize,
    rng: StdRng,
}

impl<T> Reservoir<T> {
    /// A seed makes the sample reproducible for the same stream
    pub fn new(capacity: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(4096)),
            seen: 0,
            rng,
        }
    }

    pub fn offer(&mut self, item: T) {
        self.seen += 1;
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }
        let slot = self.rng.random_range(0..self.seen);
        if slot < self.capacity {
            self.items[slot] = item;
        }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_sample(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_before_replacing() {
        let mut reservoir = Reservoir::new(5, Some(1));
        for i in 0..3 {
            reservoir.offer(i);
        }
        assert_eq!(reservoir.into_sample(), vec![0, 1, 2]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut reservoir = Reservoir::new(4, Some(9));
        for i in 0..1000 {
            reservoir.offer(i);
        }
        assert_eq!(reservoir.len(), 4);
        assert_eq!(reservoir.seen(), 1000);
    }

    #[test]
    fn test_zero_capacity() {
        let mut reservoir = Reservoir::new(0, None);
        reservoir.offer("x");
        assert!(reservoir.is_empty());
    }

    #[test]
    fn test_roughly_uniform() {
        let mut hits = [0usize; 10];
        for seed in 0..2000 {
            let mut reservoir = Reservoir::new(1, Some(seed));
            for i in 0..10 {
                reservoir.offer(i);
            }
            hits[reservoir.into_sample()[0]] += 1;
        }
        // expected 200 each
        assert!(hits.iter().all(|&h| (100..300).contains(&h)), "{hits:?}");
    }
}
