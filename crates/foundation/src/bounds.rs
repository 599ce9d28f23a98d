/// Axis-aligned 2D extent of a point cloud, in the producer's relative space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Extent of the finite `(x, y)` pairs; `None` when there are none.
    ///
    /// Pairs are taken up to the shorter of the two slices.
    pub fn from_xy(xs: &[f32], ys: &[f32]) -> Option<Self> {
        let mut out: Option<Self> = None;
        for (&x, &y) in xs.iter().zip(ys) {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            let (x, y) = (x as f64, y as f64);
            out = Some(match out {
                None => Aabb2::new([x, y], [x, y]),
                Some(b) => Aabb2::new(
                    [b.min[0].min(x), b.min[1].min(y)],
                    [b.max[0].max(x), b.max[1].max(y)],
                ),
            });
        }
        out
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }
}
