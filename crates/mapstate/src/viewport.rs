//! Relative point space ↔ screen pixel space.
//!
//! A relative coordinate goes through three transforms on its way to the
//! screen: the base scale and offset that fit the data into the unit square,
//! placement into the active area (window minus passive margins), and the
//! user's zoom and pan. Screen y grows downwards; `bottom_from_relative`
//! measures from the bottom edge.

use foundation::Aabb2;

/// Fraction of the active area left empty around fitted data.
pub const FIT_PADDING: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Margins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Jump to the fitted transform.
    Instant,
    /// Only move the targets; a renderer animates towards them.
    Smooth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub window_size: [f64; 2],
    pub passive_margins: Margins,
    pub base_scale: [f64; 2],
    pub base_offset: [f64; 2],
    pub base_scale_target: [f64; 2],
    pub base_offset_target: [f64; 2],
    pub base_scale_velocity: [f64; 2],
    pub base_offset_velocity: [f64; 2],
    pub zoom: f64,
    pub pan: [f64; 2],
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            window_size: [1280.0, 800.0],
            passive_margins: Margins::default(),
            base_scale: [1.0, 1.0],
            base_offset: [0.0, 0.0],
            base_scale_target: [1.0, 1.0],
            base_offset_target: [0.0, 0.0],
            base_scale_velocity: [0.0, 0.0],
            base_offset_velocity: [0.0, 0.0],
            zoom: 1.0,
            pan: [0.0, 0.0],
        }
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            window_size: [width, height],
            ..Self::default()
        }
    }

    pub fn active_area_width(&self) -> f64 {
        self.window_size[0] - self.passive_margins.left - self.passive_margins.right
    }

    pub fn active_area_height(&self) -> f64 {
        self.window_size[1] - self.passive_margins.top - self.passive_margins.bottom
    }

    pub fn left_from_relative(&self, x: f64) -> f64 {
        let normalized = (x + self.base_offset[0]) * self.base_scale[0];
        let in_active_area = normalized * self.active_area_width() + self.passive_margins.left;
        in_active_area * self.zoom + self.pan[0]
    }

    pub fn right_from_relative(&self, x: f64) -> f64 {
        self.window_size[0] - self.left_from_relative(x)
    }

    pub fn bottom_from_relative(&self, y: f64) -> f64 {
        let height = self.window_size[1];
        let normalized = (y + self.base_offset[1]) * self.base_scale[1];
        let in_active_area = normalized * self.active_area_height() + self.passive_margins.bottom;
        let zoomed = (in_active_area - height) * self.zoom + height;
        zoomed - self.pan[1]
    }

    pub fn top_from_relative(&self, y: f64) -> f64 {
        self.window_size[1] - self.bottom_from_relative(y)
    }

    /// Screen pixel position (from the top-left corner) of a relative point.
    pub fn embedding_to_screen(&self, x: f64, y: f64) -> [f64; 2] {
        [self.left_from_relative(x), self.top_from_relative(y)]
    }

    pub fn screen_to_embedding_x(&self, screen_x: f64) -> f64 {
        let unzoomed = (screen_x - self.pan[0]) / self.zoom;
        let normalized = (unzoomed - self.passive_margins.left) / self.active_area_width();
        normalized / self.base_scale[0] - self.base_offset[0]
    }

    pub fn screen_to_embedding_y(&self, screen_y: f64) -> f64 {
        let height = self.window_size[1];
        let unpanned = height - screen_y + self.pan[1];
        let unzoomed = (unpanned - height) / self.zoom + height;
        let normalized = (unzoomed - self.passive_margins.bottom) / self.active_area_height();
        normalized / self.base_scale[1] - self.base_offset[1]
    }

    pub fn reset_pan_and_zoom(&mut self) {
        self.zoom = 1.0;
        self.pan = [0.0, 0.0];
    }

    /// Fits `bounds` into the active area, leaving [`FIT_PADDING`] on each side.
    pub fn fit_to_bounds(&mut self, bounds: Aabb2, mode: FitMode) {
        let (scale_x, offset_x) = fit_axis(bounds.min[0], bounds.width());
        let (scale_y, offset_y) = fit_axis(bounds.min[1], bounds.height());
        self.base_scale_target = [scale_x, scale_y];
        self.base_offset_target = [offset_x, offset_y];
        if mode == FitMode::Instant {
            self.base_scale = self.base_scale_target;
            self.base_offset = self.base_offset_target;
            self.base_scale_velocity = [0.0, 0.0];
            self.base_offset_velocity = [0.0, 0.0];
        }
    }
}

/// Scale and offset mapping `[min, min + extent]` to `[padding, 1 - padding]`.
/// A zero extent centers the value.
fn fit_axis(min: f64, extent: f64) -> (f64, f64) {
    if !(extent > f64::EPSILON) {
        return (1.0, 0.5 - min);
    }
    let scale = (1.0 - 2.0 * FIT_PADDING) / extent;
    (scale, FIT_PADDING / scale - min)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn busy_viewport() -> Viewport {
        Viewport {
            window_size: [1000.0, 700.0],
            passive_margins: Margins {
                left: 40.0,
                right: 300.0,
                top: 60.0,
                bottom: 10.0,
            },
            base_scale: [0.4, 0.25],
            base_offset: [1.5, -2.0],
            zoom: 2.5,
            pan: [-120.0, 33.0],
            ..Viewport::default()
        }
    }

    /// Viewports across a grid of scales, offsets, margins, zoom levels and pans.
    fn viewport_grid() -> Vec<Viewport> {
        let mut grid = Vec::new();
        for &scale in &[[0.01, 0.02], [0.4, 0.25], [1.0, 1.0], [50.0, 7.5]] {
            for &offset in &[[0.0, 0.0], [1.5, -2.0], [-300.0, 42.0]] {
                for &margins in &[
                    Margins::default(),
                    Margins {
                        left: 40.0,
                        right: 300.0,
                        top: 60.0,
                        bottom: 10.0,
                    },
                ] {
                    for &zoom in &[0.25, 1.0, 2.5, 8.0] {
                        for &pan in &[[0.0, 0.0], [-120.0, 33.0], [900.0, -450.0]] {
                            grid.push(Viewport {
                                window_size: [1000.0, 700.0],
                                passive_margins: margins,
                                base_scale: scale,
                                base_offset: offset,
                                zoom,
                                pan,
                                ..Viewport::default()
                            });
                        }
                    }
                }
            }
        }
        grid
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn screen_round_trip_is_identity() {
        let relative = [-250.0, -3.25, -0.125, 0.0, 0.5, 1.0, 12.0, 300.0];
        let screen = [-500.0, 0.0, 1.0, 384.0, 512.0, 999.0, 4000.0];
        for viewport in viewport_grid() {
            for &x in &relative {
                for &y in &relative {
                    let [sx, sy] = viewport.embedding_to_screen(x, y);
                    assert!(close(viewport.screen_to_embedding_x(sx), x), "{viewport:?} x={x}");
                    assert!(close(viewport.screen_to_embedding_y(sy), y), "{viewport:?} y={y}");
                }
            }
            for &sx in &screen {
                for &sy in &screen {
                    let x = viewport.screen_to_embedding_x(sx);
                    let y = viewport.screen_to_embedding_y(sy);
                    let [bx, by] = viewport.embedding_to_screen(x, y);
                    assert!(close(bx, sx), "{viewport:?} sx={sx}");
                    assert!(close(by, sy), "{viewport:?} sy={sy}");
                }
            }
        }
    }

    #[test]
    fn opposite_edges_sum_to_window_size() {
        let viewport = busy_viewport();
        let x = 0.7;
        assert!((viewport.left_from_relative(x) + viewport.right_from_relative(x) - 1000.0).abs() < EPS);
        assert!((viewport.top_from_relative(x) + viewport.bottom_from_relative(x) - 700.0).abs() < EPS);
    }

    #[test]
    fn identity_transform_maps_unit_square_to_active_area() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.passive_margins.left = 100.0;
        viewport.passive_margins.bottom = 50.0;
        assert_eq!(viewport.left_from_relative(0.0), 100.0);
        assert_eq!(viewport.left_from_relative(1.0), 800.0);
        assert_eq!(viewport.bottom_from_relative(0.0), 50.0);
        assert_eq!(viewport.top_from_relative(1.0), 0.0);
    }

    #[test]
    fn instant_fit_places_data_inside_padding() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.fit_to_bounds(Aabb2::new([-2.0, 10.0], [2.0, 30.0]), FitMode::Instant);
        let left = viewport.left_from_relative(-2.0);
        let right = viewport.left_from_relative(2.0);
        assert!((left - 800.0 * FIT_PADDING).abs() < 1e-6);
        assert!((right - 800.0 * (1.0 - FIT_PADDING)).abs() < 1e-6);
        assert_eq!(viewport.base_scale, viewport.base_scale_target);
    }

    #[test]
    fn smooth_fit_only_moves_targets() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.fit_to_bounds(Aabb2::new([0.0, 0.0], [10.0, 10.0]), FitMode::Smooth);
        assert_eq!(viewport.base_scale, [1.0, 1.0]);
        assert!((viewport.base_scale_target[0] - 0.09).abs() < EPS);
    }

    #[test]
    fn degenerate_bounds_are_centered() {
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.fit_to_bounds(Aabb2::new([3.0, 3.0], [3.0, 3.0]), FitMode::Instant);
        assert!((viewport.left_from_relative(3.0) - 400.0).abs() < EPS);
        assert!((viewport.top_from_relative(3.0) - 300.0).abs() < EPS);
    }

    #[test]
    fn reset_pan_and_zoom_restores_identity_interaction() {
        let mut viewport = busy_viewport();
        viewport.reset_pan_and_zoom();
        assert_eq!(viewport.zoom, 1.0);
        assert_eq!(viewport.pan, [0.0, 0.0]);
    }
}
