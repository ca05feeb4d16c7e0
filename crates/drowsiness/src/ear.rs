//! Eye-aspect-ratio (EAR) calculation.
//!
//! EAR over six landmarks per eye, ordered corner-outer, upper-1,
//! upper-2, corner-inner, lower-2, lower-1:
//!
//! ```text
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)
//! ```
//!
//! Open eyes sit around 0.25-0.35; closed eyes drop under ~0.2.

/// Euclidean distance between two 2D points.
fn euclidean(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Compute the eye aspect ratio from six ordered eye landmarks.
///
/// Returns 0.0 when the horizontal eye span degenerates to a point.
pub fn eye_aspect_ratio(points: &[(f32, f32); 6]) -> f32 {
    let vertical_a = euclidean(points[1], points[5]);
    let vertical_b = euclidean(points[2], points[4]);
    let horizontal = euclidean(points[0], points[3]);

    if horizontal <= f32::EPSILON {
        return 0.0;
    }
    (vertical_a + vertical_b) / (2.0 * horizontal)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Corner points 4 units apart, verticals 2 units -> EAR = 0.5.
    fn open_eye_at(cx: f32, cy: f32) -> [(f32, f32); 6] {
        [
            (cx - 2.0, cy),
            (cx - 1.0, cy - 1.0),
            (cx + 1.0, cy - 1.0),
            (cx + 2.0, cy),
            (cx + 1.0, cy + 1.0),
            (cx - 1.0, cy + 1.0),
        ]
    }

    #[test]
    fn test_open_eye_ratio() {
        let ear = eye_aspect_ratio(&open_eye_at(0.0, 0.0));
        assert!((ear - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_closed_eye_ratio_is_zero() {
        let flat = [
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (3.0, 0.0),
            (2.0, 0.0),
            (1.0, 0.0),
        ];
        assert_eq!(eye_aspect_ratio(&flat), 0.0);
    }

    #[test]
    fn test_degenerate_horizontal_guarded() {
        let point = [(1.0, 1.0); 6];
        assert_eq!(eye_aspect_ratio(&point), 0.0);
    }

    #[test]
    fn test_identical_geometry_gives_identical_ratio() {
        // Same per-eye geometry at different positions: both eyes and
        // their average agree.
        let left = eye_aspect_ratio(&open_eye_at(100.0, 50.0));
        let right = eye_aspect_ratio(&open_eye_at(200.0, 50.0));
        assert_eq!(left, right);
        assert_eq!((left + right) / 2.0, left);
    }

    #[test]
    fn test_translation_invariant() {
        let a = eye_aspect_ratio(&open_eye_at(0.0, 0.0));
        let b = eye_aspect_ratio(&open_eye_at(317.0, -42.5));
        assert!((a - b).abs() < 1e-5);
    }
}
