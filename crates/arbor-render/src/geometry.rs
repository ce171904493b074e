//! Typed layout geometry.
//!
//! Everything in the render tree is measured in CSS pixels. The aliases here
//! pin euclid's unit parameter to [`LayoutPixel`] so that layout values cannot
//! be mixed with other coordinate spaces by accident.

use euclid::{Point2D, Rect, Size2D, Transform3D, Vector2D};
use serde::Serialize;

/// Unit tag for layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutPixel {}

/// A point in some renderer's local space.
pub type LayoutPoint = Point2D<f32, LayoutPixel>;
/// A translation between two coordinate spaces.
pub type LayoutOffset = Vector2D<f32, LayoutPixel>;
/// Width and height.
pub type LayoutSize = Size2D<f32, LayoutPixel>;
/// An axis-aligned rectangle.
pub type LayoutRect = Rect<f32, LayoutPixel>;
/// A 4x4 transform between layout spaces.
pub type LayoutTransform = Transform3D<f32, LayoutPixel, LayoutPixel>;

/// Large but finite stand-in for a point projected to infinity.
const CLAMPED_COORDINATE: f32 = 1.0e7;

/// Build a rectangle from its four components.
#[must_use]
pub fn rect(x: f32, y: f32, width: f32, height: f32) -> LayoutRect {
    LayoutRect::new(LayoutPoint::new(x, y), LayoutSize::new(width, height))
}

/// Union that ignores empty rectangles on either side.
#[must_use]
pub fn unite(a: &LayoutRect, b: &LayoutRect) -> LayoutRect {
    if b.is_empty() {
        return *a;
    }
    if a.is_empty() {
        return *b;
    }
    a.union(b)
}

/// Intersection, or an empty rectangle when the two do not overlap.
#[must_use]
pub fn intersect(a: &LayoutRect, b: &LayoutRect) -> LayoutRect {
    a.intersection(b).unwrap_or_else(LayoutRect::zero)
}

/// Snap the edges of `r` to whole pixels.
#[must_use]
pub fn pixel_snapped(r: &LayoutRect) -> LayoutRect {
    r.round()
}

/// A possibly non-rectangular quadrilateral, the image of a rectangle under a
/// transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutQuad {
    /// Image of the top-left corner.
    pub p1: LayoutPoint,
    /// Image of the top-right corner.
    pub p2: LayoutPoint,
    /// Image of the bottom-right corner.
    pub p3: LayoutPoint,
    /// Image of the bottom-left corner.
    pub p4: LayoutPoint,
}

impl LayoutQuad {
    /// The quad covering `r`.
    #[must_use]
    pub fn from_rect(r: &LayoutRect) -> Self {
        Self {
            p1: r.min(),
            p2: LayoutPoint::new(r.max_x(), r.min_y()),
            p3: r.max(),
            p4: LayoutPoint::new(r.min_x(), r.max_y()),
        }
    }

    /// The quad with every corner mapped through `f`.
    #[must_use]
    pub fn map(&self, mut f: impl FnMut(LayoutPoint) -> LayoutPoint) -> Self {
        Self {
            p1: f(self.p1),
            p2: f(self.p2),
            p3: f(self.p3),
            p4: f(self.p4),
        }
    }

    /// The quad shifted by `offset`.
    #[must_use]
    pub fn translate(&self, offset: LayoutOffset) -> Self {
        self.map(|p| p + offset)
    }

    /// Smallest rectangle containing all four corners.
    #[must_use]
    pub fn bounding_box(&self) -> LayoutRect {
        let min_x = self.p1.x.min(self.p2.x).min(self.p3.x).min(self.p4.x);
        let min_y = self.p1.y.min(self.p2.y).min(self.p3.y).min(self.p4.y);
        let max_x = self.p1.x.max(self.p2.x).max(self.p3.x).max(self.p4.x);
        let max_y = self.p1.y.max(self.p2.y).max(self.p3.y).max(self.p4.y);
        rect(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// The bounding box grown outwards to whole pixels.
    #[must_use]
    pub fn enclosing_bounding_box(&self) -> LayoutRect {
        self.bounding_box().round_out()
    }

    /// Whether the quad is still an axis-aligned rectangle.
    #[must_use]
    pub fn is_rectilinear(&self) -> bool {
        (self.p1.x == self.p2.x && self.p2.y == self.p3.y && self.p3.x == self.p4.x && self.p4.y == self.p1.y)
            || (self.p1.y == self.p2.y && self.p2.x == self.p3.x && self.p3.y == self.p4.y && self.p4.x == self.p1.x)
    }
}

/// Point and quad mapping on [`LayoutTransform`] with the projection rules
/// used by coordinate mapping.
pub trait TransformExt {
    /// Map a point in the source plane (z = 0) forward through the transform.
    fn map_point(&self, p: LayoutPoint) -> LayoutPoint;
    /// Map a quad forward.
    fn map_quad(&self, q: &LayoutQuad) -> LayoutQuad;
    /// Map a rectangle forward and return the bounding box of the result.
    fn map_rect(&self, r: &LayoutRect) -> LayoutRect;
    /// Cast a ray along z through `p` and return where it meets the
    /// transformed z = 0 plane, in source coordinates.
    fn project_point(&self, p: LayoutPoint) -> LayoutPoint;
    /// [`Self::project_point`] applied to every corner.
    fn project_quad(&self, q: &LayoutQuad) -> LayoutQuad;
    /// Whether this is a pure translation by whole pixels with no z part.
    fn is_integer_translation(&self) -> bool;
    /// The x/y translation components.
    fn translation_part(&self) -> LayoutOffset;
}

impl TransformExt for LayoutTransform {
    fn map_point(&self, p: LayoutPoint) -> LayoutPoint {
        let (x, y) = (p.x, p.y);
        let out_x = x * self.m11 + y * self.m21 + self.m41;
        let out_y = x * self.m12 + y * self.m22 + self.m42;
        let w = x * self.m14 + y * self.m24 + self.m44;
        homogeneous(out_x, out_y, w)
    }

    fn map_quad(&self, q: &LayoutQuad) -> LayoutQuad {
        q.map(|p| self.map_point(p))
    }

    fn map_rect(&self, r: &LayoutRect) -> LayoutRect {
        if self.is_integer_translation() {
            return r.translate(self.translation_part());
        }
        self.map_quad(&LayoutQuad::from_rect(r)).bounding_box()
    }

    fn project_point(&self, p: LayoutPoint) -> LayoutPoint {
        if self.m33 == 0.0 {
            // The plane is parallel to the ray.
            return LayoutPoint::zero();
        }
        let (x, y) = (p.x, p.y);
        let z = -(self.m13 * x + self.m23 * y + self.m43) / self.m33;
        let out_x = x * self.m11 + y * self.m21 + z * self.m31 + self.m41;
        let out_y = x * self.m12 + y * self.m22 + z * self.m32 + self.m42;
        let w = x * self.m14 + y * self.m24 + z * self.m34 + self.m44;
        homogeneous(out_x, out_y, w)
    }

    fn project_quad(&self, q: &LayoutQuad) -> LayoutQuad {
        q.map(|p| self.project_point(p))
    }

    fn is_integer_translation(&self) -> bool {
        let linear_is_identity = self.m11 == 1.0
            && self.m12 == 0.0
            && self.m13 == 0.0
            && self.m14 == 0.0
            && self.m21 == 0.0
            && self.m22 == 1.0
            && self.m23 == 0.0
            && self.m24 == 0.0
            && self.m31 == 0.0
            && self.m32 == 0.0
            && self.m33 == 1.0
            && self.m34 == 0.0
            && self.m44 == 1.0;
        linear_is_identity
            && self.m43 == 0.0
            && self.m41.fract() == 0.0
            && self.m42.fract() == 0.0
    }

    fn translation_part(&self) -> LayoutOffset {
        LayoutOffset::new(self.m41, self.m42)
    }
}

fn homogeneous(x: f32, y: f32, w: f32) -> LayoutPoint {
    if w <= 0.0 {
        let clamp = |v: f32| {
            if v >= 0.0 {
                CLAMPED_COORDINATE
            } else {
                -CLAMPED_COORDINATE
            }
        };
        LayoutPoint::new(clamp(x), clamp(y))
    } else if w == 1.0 {
        LayoutPoint::new(x, y)
    } else {
        LayoutPoint::new(x / w, y / w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unite_ignores_empty() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        assert_eq!(unite(&a, &LayoutRect::zero()), a);
        assert_eq!(unite(&LayoutRect::zero(), &a), a);
    }

    #[test]
    fn test_quad_bounding_box_after_rotation() {
        let t = LayoutTransform::rotation(0.0, 0.0, 1.0, euclid::Angle::degrees(90.0));
        let q = t.map_quad(&LayoutQuad::from_rect(&rect(0.0, 0.0, 10.0, 20.0)));
        let bbox = q.bounding_box();
        assert!((bbox.width() - 20.0).abs() < 1e-4);
        assert!((bbox.height() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_project_point_inverts_2d_transform() {
        let t = LayoutTransform::scale(2.0, 3.0, 1.0).then_translate(euclid::vec3(5.0, 7.0, 0.0));
        let p = LayoutPoint::new(4.0, 2.0);
        let mapped = t.map_point(p);
        let back = t.inverse().map(|inv| inv.project_point(mapped));
        assert_eq!(back, Some(p));
    }

    #[test]
    fn test_integer_translation() {
        assert!(LayoutTransform::translation(3.0, 4.0, 0.0).is_integer_translation());
        assert!(!LayoutTransform::translation(3.5, 4.0, 0.0).is_integer_translation());
        assert!(!LayoutTransform::scale(2.0, 1.0, 1.0).is_integer_translation());
    }
}
