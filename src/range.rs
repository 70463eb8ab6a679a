use rand::Rng;

/// Inclusive numeric range a random value is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Range {
    pub min: usize,
    pub max: usize,
}

impl Range {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn fixed(value: usize) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Uniform draw from `min..=max`.
    pub fn pick(&self, rng: &mut impl Rng) -> usize {
        if self.min >= self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub fn contains(&self, value: usize) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl From<usize> for Range {
    fn from(value: usize) -> Self {
        Range::fixed(value)
    }
}
