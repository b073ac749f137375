//! Dense per-face landmark cloud produced by the mesh model.
//!
//! Points are normalized image coordinates (x, y in [0, 1]) in the mesh
//! model's canonical numbering, so fixed indices address fixed facial
//! features (see `eye_geometry` for the eye contours).

use crate::shared::bounding_box::BoundingBox;

/// Points in the canonical face mesh (without iris refinement).
pub const MESH_POINT_COUNT: usize = 468;

#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: Vec<(f64, f64)>,
}

impl LandmarkSet {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<(f64, f64)> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Approximate face box from the extreme landmark coordinates, scaled
    /// to pixels for a `frame_width` x `frame_height` frame.
    pub fn bounding_box(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        BoundingBox::enclosing(self.points.iter().map(|(x, y)| (x * fw, y * fh)))
    }

    /// Copy with every coordinate multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> LandmarkSet {
        LandmarkSet::new(
            self.points
                .iter()
                .map(|(x, y)| (x * factor, y * factor))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounding_box_scales_extremes() {
        let lm = LandmarkSet::new(vec![(0.25, 0.5), (0.5, 0.25), (0.375, 0.375)]);
        let b = lm.bounding_box(640, 480).unwrap();
        assert_relative_eq!(b.x, 160.0);
        assert_relative_eq!(b.y, 120.0);
        assert_relative_eq!(b.width, 160.0);
        assert_relative_eq!(b.height, 120.0);
    }

    #[test]
    fn test_empty_set_has_no_box() {
        let lm = LandmarkSet::new(Vec::new());
        assert!(lm.is_empty());
        assert!(lm.bounding_box(640, 480).is_none());
    }

    #[test]
    fn test_point_out_of_range_is_none() {
        let lm = LandmarkSet::new(vec![(0.1, 0.2)]);
        assert_eq!(lm.point(0), Some((0.1, 0.2)));
        assert_eq!(lm.point(1), None);
    }

    #[test]
    fn test_scaled() {
        let lm = LandmarkSet::new(vec![(0.1, 0.2)]).scaled(2.0);
        assert_relative_eq!(lm.points()[0].0, 0.2);
        assert_relative_eq!(lm.points()[0].1, 0.4);
    }
}
