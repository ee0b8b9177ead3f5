//! Box edges, vertical extents and toggle-button placement.
//!
//! Coordinates are node centres in world space, y growing downwards.

use crate::size::NodeSize;

/// Default font size the toggle offset is tuned for.
const TOGGLE_BASE_FONT: f64 = 14.0;
const TOGGLE_BASE_OFFSET: f64 = 14.0;
const TOGGLE_MIN_OFFSET: f64 = 12.0;
const TOGGLE_MAX_OFFSET: f64 = 35.0;
/// Tables and diagrams draw their own frame; the toggle hugs it.
const TOGGLE_HEAVY_OFFSET: f64 = 12.0;

pub fn left(x: f64, width: f64) -> f64 {
    x - width / 2.0
}

pub fn right(x: f64, width: f64) -> f64 {
    x + width / 2.0
}

pub fn top(y: f64, height: f64) -> f64 {
    y - height / 2.0
}

pub fn bottom(y: f64, height: f64) -> f64 {
    y + height / 2.0
}

/// Vertical extent of a node or subtree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_y: f64, max_y: f64) -> Self {
        Self { min_y, max_y }
    }

    /// Extent of a single box centred on `y`.
    pub fn of_box(y: f64, height: f64) -> Self {
        Self::new(top(y, height), bottom(y, height))
    }

    pub fn union(self, other: Bounds) -> Self {
        Self::new(self.min_y.min(other.min_y), self.max_y.max(other.max_y))
    }

    pub fn shift(self, dy: f64) -> Self {
        Self::new(self.min_y + dy, self.max_y + dy)
    }

    pub fn expand(self, by: f64) -> Self {
        Self::new(self.min_y - by, self.max_y + by)
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Which side of its node a collapse toggle sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Roots always open to the right; other nodes face away from their root.
    pub fn of(is_root: bool, x: f64, root_x: f64) -> Self {
        if is_root || x >= root_x {
            Side::Right
        } else {
            Side::Left
        }
    }
}

/// Distance from the node's edge to the toggle centre.
pub fn toggle_offset(size: &NodeSize, font_size: f64) -> f64 {
    if size.heavy {
        return TOGGLE_HEAVY_OFFSET;
    }
    let offset = TOGGLE_BASE_OFFSET
        + (font_size - TOGGLE_BASE_FONT) * 0.25
        + (size.width - 200.0).max(0.0) * 0.02
        + (size.image_height - 100.0).max(0.0) * 0.03;
    offset.clamp(TOGGLE_MIN_OFFSET, TOGGLE_MAX_OFFSET)
}

/// Centre of the collapse toggle for a node centred at `(x, y)`.
pub fn toggle_anchor(x: f64, y: f64, size: &NodeSize, side: Side, font_size: f64) -> (f64, f64) {
    let offset = toggle_offset(size, font_size);
    match side {
        Side::Right => (right(x, size.width) + offset, y),
        Side::Left => (left(x, size.width) - offset, y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(width: f64, image_height: f64, heavy: bool) -> NodeSize {
        NodeSize {
            width,
            height: 30.0,
            image_height,
            heavy,
        }
    }

    #[test]
    fn edges() {
        assert_eq!(left(100.0, 40.0), 80.0);
        assert_eq!(right(100.0, 40.0), 120.0);
        assert_eq!(top(50.0, 20.0), 40.0);
        assert_eq!(bottom(50.0, 20.0), 60.0);
    }

    #[test]
    fn bounds_union_shift() {
        let a = Bounds::new(0.0, 10.0);
        let b = Bounds::new(-5.0, 4.0);
        assert_eq!(a.union(b), Bounds::new(-5.0, 10.0));
        assert_eq!(a.shift(3.0), Bounds::new(3.0, 13.0));
        assert_eq!(a.expand(10.0).height(), 30.0);
        assert_eq!(Bounds::of_box(0.0, 20.0), Bounds::new(-10.0, 10.0));
    }

    #[test]
    fn offset_at_default_font_is_base() {
        assert_eq!(toggle_offset(&node(120.0, 0.0, false), 14.0), 14.0);
    }

    #[test]
    fn offset_grows_and_clamps() {
        let wide = toggle_offset(&node(400.0, 0.0, false), 14.0);
        assert!((wide - 18.0).abs() < 1e-9);
        assert_eq!(toggle_offset(&node(5000.0, 900.0, false), 40.0), TOGGLE_MAX_OFFSET);
        assert_eq!(toggle_offset(&node(100.0, 0.0, false), 2.0), TOGGLE_MIN_OFFSET);
    }

    #[test]
    fn heavy_nodes_use_fixed_offset() {
        assert_eq!(toggle_offset(&node(900.0, 500.0, true), 30.0), TOGGLE_HEAVY_OFFSET);
    }

    #[test]
    fn anchor_side() {
        let size = node(100.0, 0.0, false);
        assert_eq!(toggle_anchor(0.0, 5.0, &size, Side::Right, 14.0), (64.0, 5.0));
        assert_eq!(toggle_anchor(0.0, 5.0, &size, Side::Left, 14.0), (-64.0, 5.0));
        assert_eq!(Side::of(true, -100.0, 0.0), Side::Right);
        assert_eq!(Side::of(false, -100.0, 0.0), Side::Left);
        assert_eq!(Side::of(false, 100.0, 0.0), Side::Right);
    }
}
