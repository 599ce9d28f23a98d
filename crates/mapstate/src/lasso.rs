/// Even-odd point-in-polygon test. The polygon is implicitly closed.
pub fn point_in_polygon(point: [f64; 2], polygon: &[[f64; 2]]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let [px, py] = point;
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];
        if (yi > py) != (yj > py) {
            let crossing_x = xj + (py - yj) * (xi - xj) / (yi - yj);
            if px < crossing_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: [[f64; 2]; 4] = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];

    #[test]
    fn square_contains_center_not_outside() {
        assert!(point_in_polygon([5.0, 5.0], &SQUARE));
        assert!(!point_in_polygon([15.0, 5.0], &SQUARE));
        assert!(!point_in_polygon([5.0, -0.5], &SQUARE));
    }

    #[test]
    fn self_intersecting_lasso_uses_even_odd() {
        // A star drawn in one stroke leaves its center pentagon outside.
        let star = [
            [50.0, 0.0],
            [79.0, 90.0],
            [2.0, 35.0],
            [98.0, 35.0],
            [21.0, 90.0],
        ];
        assert!(!point_in_polygon([50.0, 50.0], &star));
        assert!(point_in_polygon([50.0, 15.0], &star));
    }

    #[test]
    fn degenerate_polygons_contain_nothing() {
        assert!(!point_in_polygon([0.0, 0.0], &[]));
        assert!(!point_in_polygon([0.5, 0.0], &[[0.0, 0.0], [1.0, 0.0]]));
    }
}
