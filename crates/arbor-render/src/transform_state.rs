//! Accumulator for mapping a point or quad through a chain of offsets and
//! transforms.
//!
//! Mapping from a descendant towards an ancestor applies each step as it is
//! met. Mapping the other way unapplies the inverse. Consecutive 3D transforms
//! may be accumulated before flattening to honour `preserve-3d`.

use crate::geometry::{LayoutOffset, LayoutPoint, LayoutQuad, LayoutTransform, TransformExt};

/// Which way the state maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformDirection {
    /// Local space towards an ancestor.
    Apply,
    /// Ancestor space towards a descendant.
    UnapplyInverse,
}

/// Whether a step keeps 3D context alive for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformAccumulation {
    /// Flatten to the plane after this step.
    Flatten,
    /// Keep accumulating with the following step.
    Accumulate,
}

/// In-progress mapping of one point (and optionally one quad).
#[derive(Debug, Clone)]
pub struct TransformState {
    last_planar_point: LayoutPoint,
    last_planar_quad: LayoutQuad,
    accumulated_offset: LayoutOffset,
    accumulated_transform: Option<LayoutTransform>,
    accumulating_transform: bool,
    map_quad: bool,
    direction: TransformDirection,
}

impl TransformState {
    /// Map only `point`.
    #[must_use]
    pub fn for_point(direction: TransformDirection, point: LayoutPoint) -> Self {
        Self {
            last_planar_point: point,
            last_planar_quad: LayoutQuad::from_rect(&crate::geometry::LayoutRect::zero()),
            accumulated_offset: LayoutOffset::zero(),
            accumulated_transform: None,
            accumulating_transform: false,
            map_quad: false,
            direction,
        }
    }

    /// Map `quad`, tracking `point` alongside it.
    #[must_use]
    pub fn for_quad(direction: TransformDirection, point: LayoutPoint, quad: LayoutQuad) -> Self {
        Self {
            last_planar_quad: quad,
            map_quad: true,
            ..Self::for_point(direction, point)
        }
    }

    /// Mapping direction.
    #[must_use]
    pub const fn direction(&self) -> TransformDirection {
        self.direction
    }

    /// Shift by `offset`.
    pub fn move_by(&mut self, offset: LayoutOffset, accumulate: TransformAccumulation) {
        if accumulate == TransformAccumulation::Flatten || self.accumulated_transform.is_none() {
            self.accumulated_offset += offset;
        } else {
            self.apply_accumulated_offset();
            if self.accumulating_transform && self.accumulated_transform.is_some() {
                // We're in the middle of accumulating a 3D transform; keep
                // the translation inside it.
                self.translate_transform(offset);
                if accumulate == TransformAccumulation::Flatten {
                    self.flatten();
                }
            } else {
                self.translate_mapped_coordinates(offset);
            }
        }
        self.accumulating_transform = accumulate == TransformAccumulation::Accumulate;
    }

    fn apply_accumulated_offset(&mut self) {
        let offset = std::mem::replace(&mut self.accumulated_offset, LayoutOffset::zero());
        if offset == LayoutOffset::zero() {
            return;
        }
        if self.accumulated_transform.is_some() {
            self.translate_transform(offset);
            self.flatten();
        } else {
            self.translate_mapped_coordinates(offset);
        }
    }

    fn translate_transform(&mut self, offset: LayoutOffset) {
        let Some(acc) = self.accumulated_transform.as_mut() else {
            return;
        };
        let v = euclid::vec3(offset.x, offset.y, 0.0);
        *acc = match self.direction {
            TransformDirection::Apply => acc.then_translate(v),
            TransformDirection::UnapplyInverse => acc.pre_translate(v),
        };
    }

    fn translate_mapped_coordinates(&mut self, offset: LayoutOffset) {
        let adjusted = match self.direction {
            TransformDirection::Apply => offset,
            TransformDirection::UnapplyInverse => -offset,
        };
        self.last_planar_point += adjusted;
        if self.map_quad {
            self.last_planar_quad = self.last_planar_quad.translate(adjusted);
        }
    }

    /// Compose `transform` into the state.
    pub fn apply_transform(&mut self, transform: &LayoutTransform, accumulate: TransformAccumulation) {
        if transform.is_integer_translation() {
            self.move_by(transform.translation_part(), accumulate);
            return;
        }

        self.apply_accumulated_offset();

        let composed = match (self.accumulated_transform, self.direction) {
            (Some(acc), TransformDirection::Apply) => Some(acc.then(transform)),
            (Some(acc), TransformDirection::UnapplyInverse) => Some(transform.then(&acc)),
            (None, _) if accumulate == TransformAccumulation::Accumulate => Some(*transform),
            (None, _) => None,
        };
        self.accumulated_transform = composed;

        if accumulate == TransformAccumulation::Flatten {
            let t = composed.unwrap_or(*transform);
            self.flatten_with_transform(&t);
        }
        self.accumulating_transform = accumulate == TransformAccumulation::Accumulate;
    }

    /// Collapse any accumulated 3D context into the mapped point and quad.
    pub fn flatten(&mut self) {
        self.apply_accumulated_offset();
        match self.accumulated_transform {
            Some(t) => self.flatten_with_transform(&t),
            None => self.accumulating_transform = false,
        }
    }

    fn flatten_with_transform(&mut self, t: &LayoutTransform) {
        match self.direction {
            TransformDirection::Apply => {
                self.last_planar_point = t.map_point(self.last_planar_point);
                if self.map_quad {
                    self.last_planar_quad = t.map_quad(&self.last_planar_quad);
                }
            }
            TransformDirection::UnapplyInverse => {
                let inverse = t.inverse().unwrap_or_else(LayoutTransform::identity);
                self.last_planar_point = inverse.project_point(self.last_planar_point);
                if self.map_quad {
                    self.last_planar_quad = inverse.project_quad(&self.last_planar_quad);
                }
            }
        }
        self.accumulated_transform = None;
        self.accumulating_transform = false;
    }

    /// The mapped point, without disturbing the state.
    #[must_use]
    pub fn mapped_point(&self) -> LayoutPoint {
        let point = self.last_planar_point + self.signed_offset();
        self.accumulated_transform.map_or(point, |t| match self.direction {
            TransformDirection::Apply => t.map_point(point),
            TransformDirection::UnapplyInverse => t
                .inverse()
                .unwrap_or_else(LayoutTransform::identity)
                .project_point(point),
        })
    }

    /// The mapped quad, without disturbing the state.
    #[must_use]
    pub fn mapped_quad(&self) -> LayoutQuad {
        let quad = self.last_planar_quad.translate(self.signed_offset());
        self.accumulated_transform.map_or(quad, |t| match self.direction {
            TransformDirection::Apply => t.map_quad(&quad),
            TransformDirection::UnapplyInverse => t
                .inverse()
                .unwrap_or_else(LayoutTransform::identity)
                .project_quad(&quad),
        })
    }

    fn signed_offset(&self) -> LayoutOffset {
        match self.direction {
            TransformDirection::Apply => self.accumulated_offset,
            TransformDirection::UnapplyInverse => -self.accumulated_offset,
        }
    }

    /// The point as of the last flatten.
    #[must_use]
    pub const fn last_planar_point(&self) -> LayoutPoint {
        self.last_planar_point
    }

    /// The quad as of the last flatten.
    #[must_use]
    pub const fn last_planar_quad(&self) -> LayoutQuad {
        self.last_planar_quad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: LayoutPoint, b: LayoutPoint) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[test]
    fn test_offsets_accumulate() {
        let mut state = TransformState::for_point(TransformDirection::Apply, LayoutPoint::new(1.0, 1.0));
        state.move_by(LayoutOffset::new(10.0, 0.0), TransformAccumulation::Flatten);
        state.move_by(LayoutOffset::new(0.0, 5.0), TransformAccumulation::Flatten);
        state.flatten();
        assert_eq!(state.last_planar_point(), LayoutPoint::new(11.0, 6.0));
    }

    #[test]
    fn test_apply_then_unapply_returns_to_start() {
        let scale = LayoutTransform::scale(2.0, 2.0, 1.0);
        let start = LayoutPoint::new(3.0, 4.0);

        let mut forward = TransformState::for_point(TransformDirection::Apply, start);
        forward.move_by(LayoutOffset::new(5.0, 5.0), TransformAccumulation::Flatten);
        forward.apply_transform(&scale, TransformAccumulation::Flatten);
        forward.move_by(LayoutOffset::new(7.0, 0.0), TransformAccumulation::Flatten);
        forward.flatten();
        let mapped = forward.last_planar_point();
        assert!(approx(mapped, LayoutPoint::new(23.0, 18.0)));

        let mut back = TransformState::for_point(TransformDirection::UnapplyInverse, mapped);
        back.move_by(LayoutOffset::new(7.0, 0.0), TransformAccumulation::Flatten);
        back.apply_transform(&scale, TransformAccumulation::Flatten);
        back.move_by(LayoutOffset::new(5.0, 5.0), TransformAccumulation::Flatten);
        back.flatten();
        assert!(approx(back.last_planar_point(), start));
    }

    #[test]
    fn test_integer_translation_is_a_move() {
        let mut state = TransformState::for_point(TransformDirection::Apply, LayoutPoint::zero());
        state.apply_transform(
            &LayoutTransform::translation(4.0, 2.0, 0.0),
            TransformAccumulation::Flatten,
        );
        assert_eq!(state.mapped_point(), LayoutPoint::new(4.0, 2.0));
    }
}
