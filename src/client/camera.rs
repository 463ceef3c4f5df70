//! World-to-surface transform with pan, anchored zoom and bounds clamping.
//!
//! Screen coordinates are pixels from the top-left corner of the surface with
//! y pointing down. World y maps onto screen y without flipping.

use crate::world::{Vec2, WorldBounds};

/// Pixels per meter
pub const DEFAULT_ZOOM: f64 = 100.0;
pub const MIN_ZOOM: f64 = 0.05;
pub const MAX_ZOOM: f64 = 400.0;

/// Zoom factor per wheel delta unit
pub const WHEEL_SENSITIVITY: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Visible world rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl ViewRect {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        self.min.midpoint(self.max)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[derive(Debug, Clone, Copy)]
struct PinchStart {
    distance: f64,
    zoom: f64,
}

#[derive(Debug, Clone)]
pub struct Camera {
    /// Follows the focus entity while it is still
    pub target: Vec2,
    /// Manual pan and zoom-anchor adjustment
    pub offset: Vec2,
    pub zoom: f64,
    pub viewport: Viewport,
    bounds: WorldBounds,
    drag_from: Option<Vec2>,
    pinch: Option<PinchStart>,
}

impl Camera {
    pub fn new(viewport: Viewport, bounds: WorldBounds) -> Self {
        Self {
            target: Vec2::ZERO,
            offset: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
            viewport,
            bounds,
            drag_from: None,
            pinch: None,
        }
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.normalize_offset();
    }

    /// Size of the visible rectangle in meters, never larger than the world
    pub fn view_size(&self) -> Vec2 {
        let world = self.bounds.size();
        Vec2::new(
            (self.viewport.width / self.zoom).min(world),
            (self.viewport.height / self.zoom).min(world),
        )
    }

    pub fn view_rect(&self) -> ViewRect {
        let size = self.view_size();
        let center = self.clamp_center(self.target + self.offset, size);
        let half = size * 0.5;
        ViewRect {
            min: center - half,
            max: center + half,
        }
    }

    /// Pixels per meter on each axis for the current view
    fn scale(&self) -> Vec2 {
        let size = self.view_size();
        Vec2::new(self.viewport.width / size.x, self.viewport.height / size.y)
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        let rect = self.view_rect();
        let scale = self.scale();
        Vec2::new(
            (world.x - rect.min.x) * scale.x,
            (world.y - rect.min.y) * scale.y,
        )
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        let rect = self.view_rect();
        let scale = self.scale();
        Vec2::new(
            rect.min.x + screen.x / scale.x,
            rect.min.y + screen.y / scale.y,
        )
    }

    /// Track the focus entity. Holds still while it moves and recenters
    /// once it stops.
    pub fn follow(&mut self, position: Vec2, moving: bool) {
        if !moving {
            self.target = position;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_from.is_some()
    }

    pub fn on_drag_start(&mut self, screen: Vec2) {
        self.drag_from = Some(screen);
    }

    pub fn on_drag_move(&mut self, screen: Vec2) {
        let Some(from) = self.drag_from.replace(screen) else {
            return;
        };
        let size = self.view_size();
        let delta = screen - from;
        // Content follows the pointer, so the view moves the other way
        self.offset = self.offset
            - Vec2::new(
                delta.x * size.x / self.viewport.width,
                delta.y * size.y / self.viewport.height,
            );
        self.normalize_offset();
    }

    pub fn on_drag_end(&mut self) {
        self.drag_from = None;
    }

    /// Change zoom keeping the world point under `anchor` fixed on screen
    pub fn zoom_at(&mut self, anchor: Vec2, zoom: f64) {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if !zoom.is_finite() {
            return;
        }
        let anchored = self.screen_to_world(anchor);
        self.zoom = zoom;

        let size = self.view_size();
        let fraction = Vec2::new(anchor.x / self.viewport.width, anchor.y / self.viewport.height);
        let min = Vec2::new(anchored.x - fraction.x * size.x, anchored.y - fraction.y * size.y);
        let center = min + size * 0.5;

        self.offset = center - self.target;
        self.normalize_offset();
    }

    pub fn on_wheel(&mut self, anchor: Vec2, delta_y: f64) {
        let factor = (-delta_y * WHEEL_SENSITIVITY).exp();
        self.zoom_at(anchor, self.zoom * factor);
    }

    pub fn on_pinch_start(&mut self, a: Vec2, b: Vec2) {
        self.drag_from = None;
        self.pinch = Some(PinchStart {
            distance: a.distance(b),
            zoom: self.zoom,
        });
    }

    pub fn on_pinch_move(&mut self, a: Vec2, b: Vec2) {
        let Some(start) = self.pinch else {
            return;
        };
        if start.distance <= f64::EPSILON {
            return;
        }
        let ratio = a.distance(b) / start.distance;
        self.zoom_at(a.midpoint(b), start.zoom * ratio);
    }

    pub fn on_pinch_end(&mut self) {
        self.pinch = None;
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    fn clamp_center(&self, center: Vec2, size: Vec2) -> Vec2 {
        let half = self.bounds.half();
        let clamp_axis = |c: f64, extent: f64| {
            let limit = half - extent / 2.0;
            if limit <= 0.0 {
                0.0
            } else {
                c.clamp(-limit, limit)
            }
        };
        Vec2::new(clamp_axis(center.x, size.x), clamp_axis(center.y, size.y))
    }

    /// Fold clamping back into the offset so panning past an edge does not
    /// leave slack that must be dragged back first.
    fn normalize_offset(&mut self) {
        let size = self.view_size();
        let world = self.bounds.size();
        if size.x >= world && size.y >= world {
            self.offset = Vec2::ZERO;
            return;
        }
        let center = self.clamp_center(self.target + self.offset, size);
        self.offset = center - self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(Viewport::new(800.0, 800.0), WorldBounds::new(6400.0))
    }

    fn assert_close(a: Vec2, b: Vec2) {
        assert!(a.distance(b) < 1e-6, "{a:?} != {b:?}");
    }

    #[test]
    fn eight_meter_view_centered_on_target() {
        let mut cam = camera();
        cam.target = Vec2::new(10.0, -20.0);
        let rect = cam.view_rect();
        assert_close(Vec2::new(rect.width(), rect.height()), Vec2::new(8.0, 8.0));
        assert_close(rect.center(), Vec2::new(10.0, -20.0));
        assert_close(cam.world_to_screen(Vec2::new(10.0, -20.0)), Vec2::new(400.0, 400.0));
    }

    #[test]
    fn view_rect_is_clamped_to_world() {
        let mut cam = camera();
        cam.target = Vec2::new(3199.0, -3199.0);
        let rect = cam.view_rect();
        assert_close(rect.max, Vec2::new(3200.0, -3192.0));
        assert_close(rect.min, Vec2::new(3192.0, -3200.0));
    }

    #[test]
    fn screen_and_world_are_inverse() {
        let mut cam = camera();
        cam.target = Vec2::new(5.0, 5.0);
        cam.zoom = 37.0;
        let p = Vec2::new(123.0, 456.0);
        assert_close(cam.world_to_screen(cam.screen_to_world(p)), p);
    }

    #[test]
    fn zoom_keeps_anchor_under_pointer() {
        let mut cam = camera();
        cam.target = Vec2::new(100.0, 50.0);
        let pointer = Vec2::new(620.0, 130.0);
        let anchored = cam.screen_to_world(pointer);

        for zoom in [250.0, 12.5, 80.0] {
            cam.zoom_at(pointer, zoom);
            assert_close(cam.world_to_screen(anchored), pointer);
        }
    }

    #[test]
    fn wheel_zooms_in_and_out() {
        let mut cam = camera();
        cam.on_wheel(Vec2::new(400.0, 400.0), -100.0);
        assert!(cam.zoom > DEFAULT_ZOOM);
        cam.on_wheel(Vec2::new(400.0, 400.0), 200.0);
        assert!(cam.zoom < DEFAULT_ZOOM);
    }

    #[test]
    fn zooming_out_past_world_resets_offset() {
        let mut cam = camera();
        cam.offset = Vec2::new(30.0, -12.0);
        cam.zoom_at(Vec2::new(100.0, 700.0), MIN_ZOOM);

        assert_eq!(cam.offset, Vec2::ZERO);
        let rect = cam.view_rect();
        assert_close(rect.min, Vec2::new(-3200.0, -3200.0));
        assert_close(rect.max, Vec2::new(3200.0, 3200.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = camera();
        cam.zoom_at(Vec2::new(400.0, 400.0), 1e9);
        assert_eq!(cam.zoom, MAX_ZOOM);
    }

    #[test]
    fn drag_pans_by_world_units() {
        let mut cam = camera();
        cam.on_drag_start(Vec2::new(400.0, 400.0));
        cam.on_drag_move(Vec2::new(500.0, 400.0));
        cam.on_drag_end();

        // 100px at 100px/m is one meter; content follows the pointer
        assert_close(cam.offset, Vec2::new(-1.0, 0.0));
        assert!(!cam.is_dragging());
    }

    #[test]
    fn drag_past_edge_leaves_no_slack() {
        let mut cam = camera();
        cam.target = Vec2::new(-3196.0, 0.0);
        cam.on_drag_start(Vec2::new(400.0, 400.0));
        cam.on_drag_move(Vec2::new(800.0, 400.0));
        assert_close(cam.view_rect().min, Vec2::new(-3200.0, -4.0));

        cam.on_drag_move(Vec2::new(700.0, 400.0));
        assert_close(cam.view_rect().min, Vec2::new(-3199.0, -4.0));
    }

    #[test]
    fn pinch_scales_by_distance_ratio() {
        let mut cam = camera();
        let a = Vec2::new(300.0, 400.0);
        let b = Vec2::new(500.0, 400.0);
        let mid = a.midpoint(b);
        let anchored = cam.screen_to_world(mid);

        cam.on_pinch_start(a, b);
        cam.on_pinch_move(Vec2::new(200.0, 400.0), Vec2::new(600.0, 400.0));
        assert!((cam.zoom - 2.0 * DEFAULT_ZOOM).abs() < 1e-9);
        assert_close(cam.world_to_screen(anchored), mid);

        cam.on_pinch_end();
        cam.on_pinch_move(a, b);
        assert!((cam.zoom - 2.0 * DEFAULT_ZOOM).abs() < 1e-9);
    }

    #[test]
    fn camera_holds_while_target_moves() {
        let mut cam = camera();
        cam.follow(Vec2::new(1.0, 1.0), true);
        assert_eq!(cam.target, Vec2::ZERO);
        cam.follow(Vec2::new(1.0, 1.0), false);
        assert_eq!(cam.target, Vec2::new(1.0, 1.0));
    }
}
