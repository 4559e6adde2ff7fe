// SPDX-License-Identifier: GPL-3.0-only

//! Joint markers drawn onto color frames
//!
//! Marker color encodes the joint confidence against the score threshold:
//!
//! | flagged | score > threshold | show_uncertainty | color                    |
//! |---------|-------------------|------------------|--------------------------|
//! | any     | no                | no               | not drawn                |
//! | yes     | otherwise         |                  | black                    |
//! | no      | yes               | no               | red ramp                 |
//! | no      | yes               | yes              | grey (0.3)               |
//! | no      | no                | yes              | red ramp (dark)          |
//!
//! The red ramp is `0.7 * (score - threshold) / (1 - threshold) + 0.3`.

use image::{Rgb, RgbImage};

use super::Person;
use crate::constants::skeleton::JOINT_RADIUS;

/// Marker color in `[0, 1]` RGB, or `None` when the joint is not drawn
pub fn joint_color(score: f32, error: i32, threshold: f32, show_uncertainty: bool) -> Option<[f32; 3]> {
    let confident = score > threshold;
    if !confident && !show_uncertainty {
        return None;
    }
    if error != 0 {
        return Some([0.0, 0.0, 0.0]);
    }
    if confident && show_uncertainty {
        return Some([0.3, 0.3, 0.3]);
    }
    let span = (1.0 - threshold).max(f32::EPSILON);
    let red = (0.7 * (score - threshold) / span + 0.3).clamp(0.0, 1.0);
    Some([red, 0.3, 0.3])
}

fn fill_disc(image: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    for y in (cy - radius).max(0)..=(cy + radius).min(h - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(w - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= radius * radius {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Draw every joint of every person onto `image`
///
/// Returns the number of markers drawn.
pub fn draw_skeletons(
    image: &mut RgbImage,
    persons: &[Person],
    threshold: f32,
    show_uncertainty: bool,
) -> usize {
    let mut drawn = 0;
    for person in persons {
        for joint in &person.joints {
            let error = if person.error != 0 { person.error } else { joint.error };
            let Some(color) = joint_color(joint.score, error, threshold, show_uncertainty) else {
                continue;
            };
            let rgb = Rgb(color.map(|c| (c * 255.0).round() as u8));
            fill_disc(image, joint.u as i32, joint.v as i32, JOINT_RADIUS, rgb);
            drawn += 1;
        }
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{DetectedPerson, Keypoint};

    #[test]
    fn test_joint_color_rules() {
        assert_eq!(joint_color(0.9, 2, 0.5, false), Some([0.0; 3]));
        assert_eq!(joint_color(0.4, 2, 0.5, true), Some([0.0; 3]));
        // Flagged joints below threshold stay hidden unless uncertainty is shown
        assert_eq!(joint_color(0.4, 2, 0.5, false), None);
        assert_eq!(joint_color(0.4, 0, 0.5, false), None);
        assert_eq!(joint_color(0.9, 0, 0.5, true), Some([0.3, 0.3, 0.3]));

        let [r, g, _] = joint_color(1.0, 0, 0.5, false).unwrap();
        assert!((r - 1.0).abs() < 1e-6);
        assert_eq!(g, 0.3);
        let [r, _, _] = joint_color(0.5, 0, 0.5, true).unwrap();
        assert!((r - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_draw_marks_pixels_and_clips_at_edges() {
        let mut image = RgbImage::new(20, 20);
        let person = Person::from_detection(
            0,
            &DetectedPerson {
                keypoints: vec![
                    Keypoint { u: 10.0, v: 10.0, score: 1.0 },
                    Keypoint { u: 0.0, v: 19.0, score: 1.0 },
                    Keypoint { u: 5.0, v: 5.0, score: 0.1 },
                ],
            },
        );
        let drawn = draw_skeletons(&mut image, &[person], 0.5, false);
        assert_eq!(drawn, 2);
        assert_eq!(image.get_pixel(10, 10).0, [255, 77, 77]);
        assert_eq!(image.get_pixel(0, 19).0, [255, 77, 77]);
        assert_eq!(image.get_pixel(5, 5).0, [0, 0, 0]);
    }
}
