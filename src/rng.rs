#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn next_f32(&mut self) -> f32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        (out as f64 / 4_294_967_296.0) as f32
    }

    pub fn int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f32;
        min + (self.next_f32() * span).floor() as i32
    }

    /// Uniform integer in `0..n` (zero when `n <= 0`).
    pub fn below(&mut self, n: i32) -> i32 {
        if n <= 0 {
            return 0;
        }
        ((self.next_f32() * n as f32).floor() as i32).min(n - 1)
    }

    pub fn bool(&mut self, probability: f32) -> bool {
        self.next_f32() < probability
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f32() * len as f32).floor().min((len - 1) as f32) as usize
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, values: &mut [T]) {
        for i in (1..values.len()).rev() {
            let j = self.pick_index(i + 1);
            values.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_same_stream() {
        let mut a = Rng::new(12_345);
        let mut b = Rng::new(12_345);
        for _ in 0..100 {
            assert_eq!(a.next_f32().to_bits(), b.next_f32().to_bits());
        }
    }

    #[test]
    fn below_stays_in_range() {
        let mut rng = Rng::new(7);
        for _ in 0..1_000 {
            let v = rng.below(5);
            assert!((0..5).contains(&v));
        }
        assert_eq!(rng.below(0), 0);
        assert_eq!(rng.below(-3), 0);
    }

    #[test]
    fn int_is_inclusive_on_both_ends() {
        let mut rng = Rng::new(99);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..2_000 {
            let v = rng.int(1, 2);
            assert!((1..=2).contains(&v));
            seen_min |= v == 1;
            seen_max |= v == 2;
        }
        assert!(seen_min && seen_max);
    }

    #[test]
    fn shuffle_keeps_all_elements() {
        let mut rng = Rng::new(424_242);
        let mut values = [0, 1, 2, 3];
        rng.shuffle(&mut values);
        let mut sorted = values;
        sorted.sort_unstable();
        assert_eq!(sorted, [0, 1, 2, 3]);
    }
}
