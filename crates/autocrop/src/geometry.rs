use std::fmt;
use serde::{Deserialize, Serialize};
use crate::error::CropError;

/// Frame dimensions in pixels, used both for the current resolution of a
/// file and for the crop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    /// Build a rectangle, rejecting zero-sized dimensions.
    ///
    /// Odd values are accepted; whether the encoder tolerates them is the
    /// encoder's concern.
    pub fn new(width: u32, height: u32) -> Result<Self, CropError> {
        if width == 0 || height == 0 {
            return Err(CropError::InvalidRectangle { width, height });
        }
        Ok(Rectangle { width, height })
    }

    /// Parse a cropdetect value of the form `W:H:X:Y`.
    ///
    /// The offsets must be present and numeric but are discarded; only the
    /// dimensions matter to the crop decision.
    pub fn from_crop_value(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split(':').collect();
        if parts.len() != 4 {
            return None;
        }

        let width = parts[0].parse::<u32>().ok()?;
        let height = parts[1].parse::<u32>().ok()?;
        parts[2].parse::<u32>().ok()?;
        parts[3].parse::<u32>().ok()?;

        Rectangle::new(width, height).ok()
    }

    /// The ffmpeg filter expression that crops to these dimensions.
    /// The crop origin is left to ffmpeg, which centres it.
    pub fn crop_filter(&self) -> String {
        format!("crop={}:{}", self.width, self.height)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel tolerance applied independently to width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tolerance(pub u32);

impl Default for Tolerance {
    fn default() -> Self {
        // Cropdetect sometimes reports a few pixels of bar on videos that need
        // no crop at all; 18 keeps those from being cropped to odd sizes.
        Tolerance(18)
    }
}

/// Decide whether `current` is already close enough to `target`.
///
/// Both dimensions must differ by strictly less than the tolerance, so a
/// tolerance of 0 rejects everything, including an exact match.
pub fn is_acceptable(current: Rectangle, target: Rectangle, tolerance: Tolerance) -> bool {
    current.width.abs_diff(target.width) < tolerance.0
        && current.height.abs_diff(target.height) < tolerance.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rect(width: u32, height: u32) -> Rectangle {
        Rectangle::new(width, height).unwrap()
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(matches!(
            Rectangle::new(0, 800),
            Err(CropError::InvalidRectangle { width: 0, height: 800 })
        ));
        assert!(Rectangle::new(1920, 0).is_err());
    }

    #[test]
    fn test_parse_crop_value() {
        assert_eq!(Rectangle::from_crop_value("1920:800:0:140"), Some(rect(1920, 800)));
        assert_eq!(Rectangle::from_crop_value(" 1920:816:0:132 "), Some(rect(1920, 816)));
        assert_eq!(Rectangle::from_crop_value("1920:800"), None);
        assert_eq!(Rectangle::from_crop_value("1920:800:0:x"), None);
        assert_eq!(Rectangle::from_crop_value("0:800:0:0"), None);
        assert_eq!(Rectangle::from_crop_value("-16:800:0:0"), None);
    }

    #[test]
    fn test_crop_filter_expression() {
        assert_eq!(rect(1920, 800).crop_filter(), "crop=1920:800");
        assert_eq!(rect(1920, 800).to_string(), "1920x800");
    }

    #[test]
    fn test_within_tolerance() {
        assert!(is_acceptable(rect(1920, 800), rect(1920, 814), Tolerance(18)));
    }

    #[test]
    fn test_outside_tolerance() {
        assert!(!is_acceptable(rect(1920, 800), rect(1920, 820), Tolerance(18)));
    }

    #[test]
    fn test_difference_equal_to_tolerance_is_rejected() {
        assert!(!is_acceptable(rect(1920, 800), rect(1920, 818), Tolerance(18)));
        assert!(is_acceptable(rect(1920, 800), rect(1920, 817), Tolerance(18)));
    }

    #[test]
    fn test_zero_tolerance_rejects_exact_match() {
        assert!(!is_acceptable(rect(1920, 800), rect(1920, 800), Tolerance(0)));
    }

    #[test]
    fn test_one_dimension_failing_fails_overall() {
        assert!(!is_acceptable(rect(1920, 800), rect(1880, 800), Tolerance(18)));
        assert!(!is_acceptable(rect(1920, 800), rect(1920, 760), Tolerance(18)));
    }

    fn dimension() -> impl Strategy<Value = u32> {
        1u32..8192
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_comparator_is_symmetric(
            aw in dimension(), ah in dimension(),
            bw in dimension(), bh in dimension(),
            t in 0u32..64,
        ) {
            let a = rect(aw, ah);
            let b = rect(bw, bh);
            prop_assert_eq!(
                is_acceptable(a, b, Tolerance(t)),
                is_acceptable(b, a, Tolerance(t))
            );
        }

        #[test]
        fn test_identity_accepted_for_positive_tolerance(
            w in dimension(), h in dimension(), t in 1u32..64,
        ) {
            prop_assert!(is_acceptable(rect(w, h), rect(w, h), Tolerance(t)));
        }

        #[test]
        fn test_identity_rejected_for_zero_tolerance(w in dimension(), h in dimension()) {
            prop_assert!(!is_acceptable(rect(w, h), rect(w, h), Tolerance(0)));
        }

        #[test]
        fn test_acceptance_matches_per_axis_bound(
            aw in dimension(), ah in dimension(),
            bw in dimension(), bh in dimension(),
            t in 0u32..64,
        ) {
            let expected = aw.abs_diff(bw) < t && ah.abs_diff(bh) < t;
            prop_assert_eq!(is_acceptable(rect(aw, ah), rect(bw, bh), Tolerance(t)), expected);
        }
    }
}
