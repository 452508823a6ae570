/// Axis-aligned 2D bounding box.
///
/// Used both for geographic extents (`[lon, lat]`) and for screen-space
/// extents. An empty box has `min > max` and absorbs nothing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn empty() -> Self {
        Aabb2 {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }

    pub fn extend(&mut self, p: [f64; 2]) {
        self.min[0] = self.min[0].min(p[0]);
        self.min[1] = self.min[1].min(p[1]);
        self.max[0] = self.max[0].max(p[0]);
        self.max[1] = self.max[1].max(p[1]);
    }

    pub fn union(self, other: Self) -> Self {
        if other.is_empty() {
            return self;
        }
        let mut out = self;
        out.extend(other.min);
        out.extend(other.max);
        out
    }

    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max[1] - self.min[1]).max(0.0)
    }
}

impl FromIterator<[f64; 2]> for Aabb2 {
    fn from_iter<I: IntoIterator<Item = [f64; 2]>>(iter: I) -> Self {
        let mut out = Aabb2::empty();
        for p in iter {
            out.extend(p);
        }
        out
    }
}
