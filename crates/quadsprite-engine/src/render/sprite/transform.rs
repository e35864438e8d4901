//! Matrix composition for the three spaces a sprite draw touches.
//!
//! - projection: canvas units → clip space, built once per renderer
//! - model: unit quad → placed, sized, flipped and rotated sprite
//! - texture: unit texture quad → the selected atlas slice
//!
//! The model transform is composed as translate · scale · rotate. Rotation is
//! applied in the scaled (and possibly flipped) local frame; reordering breaks
//! rotated flipped sprites, so the steps are only reachable through [`model`].

use glam::{Mat4, Vec2, Vec3};

use crate::coords::{Rect, Viewport};

/// Per-draw placement of a sprite in canvas units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteTransform {
    /// Center of the sprite.
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
    /// Degrees about the sprite center, counter-clockwise on the +Y-up canvas
    /// (a positive rotation about +z).
    pub rotation: f32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

/// Orthographic projection with the origin at the canvas center.
///
/// Horizontal extent `[-w/2, w/2]`, vertical `[-h/2, h/2]`, depth `[-1, 1]`.
pub fn projection(canvas: Viewport) -> Mat4 {
    let (half_w, half_h) = canvas.half_extent();
    Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, -1.0, 1.0)
}

/// Model matrix mapping the unit quad onto the sprite's destination.
///
/// Flips are a sign inversion of the matching scale axis. The z scale is zero:
/// sprites are flat.
pub fn model(t: &SpriteTransform) -> Mat4 {
    let sx = if t.flip_horizontal { -t.width } else { t.width };
    let sy = if t.flip_vertical { -t.height } else { t.height };

    Mat4::from_translation(t.position.extend(0.0))
        * Mat4::from_scale(Vec3::new(sx, sy, 0.0))
        * Mat4::from_rotation_z(t.rotation.to_radians())
}

/// Texture matrix remapping the unit texture quad onto `slice`.
///
/// `natural_width`/`natural_height` must be non-zero. The z axis is left alone,
/// so a full-image slice yields the identity.
pub fn texture_transform(slice: Rect, natural_width: u32, natural_height: u32) -> Mat4 {
    debug_assert!(
        natural_width > 0 && natural_height > 0,
        "texture transform needs non-zero image dimensions"
    );

    let natural = Vec2::new(natural_width as f32, natural_height as f32);
    let offset = slice.origin / natural;
    let scale = slice.size / natural;

    Mat4::from_translation(offset.extend(0.0)) * Mat4::from_scale(scale.extend(1.0))
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Vec4, vec3};

    use super::*;

    const EPS: f32 = 1e-5;

    fn sprite(rotation: f32, flip_h: bool, flip_v: bool) -> SpriteTransform {
        SpriteTransform {
            position: Vec2::new(-250.0, 40.0),
            width: 64.0,
            height: 32.0,
            rotation,
            flip_horizontal: flip_h,
            flip_vertical: flip_v,
        }
    }

    // ── projection ────────────────────────────────────────────────────────

    #[test]
    fn projection_maps_canvas_corners_to_clip_corners() {
        let p = projection(Viewport::new(1366.0, 768.0));

        let top_right = p * Vec4::new(683.0, 384.0, 0.0, 1.0);
        let bottom_left = p * Vec4::new(-683.0, -384.0, 0.0, 1.0);

        assert!(top_right.abs_diff_eq(Vec4::new(1.0, 1.0, 0.0, 1.0), EPS));
        assert!(bottom_left.abs_diff_eq(Vec4::new(-1.0, -1.0, 0.0, 1.0), EPS));
    }

    #[test]
    fn projection_keeps_origin_at_canvas_center() {
        let p = projection(Viewport::new(800.0, 600.0));
        assert!((p * Vec4::W).abs_diff_eq(Vec4::W, EPS));
    }

    // ── model ─────────────────────────────────────────────────────────────

    #[test]
    fn model_composes_translate_scale_rotate() {
        let t = SpriteTransform {
            position: Vec2::new(0.0, 200.0),
            width: 128.0,
            height: 128.0,
            rotation: 90.0,
            flip_horizontal: false,
            flip_vertical: false,
        };
        let expected = Mat4::from_translation(vec3(0.0, 200.0, 0.0))
            * Mat4::from_scale(vec3(128.0, 128.0, 0.0))
            * Mat4::from_rotation_z(FRAC_PI_2);

        assert!(model(&t).abs_diff_eq(expected, EPS));
    }

    #[test]
    fn unrotated_model_places_unit_quad_corners() {
        let m = model(&sprite(0.0, false, false));
        let corner = m * Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert!(corner.abs_diff_eq(Vec4::new(-250.0 + 32.0, 40.0 + 16.0, 0.0, 1.0), EPS));
    }

    #[test]
    fn rotation_happens_before_scale_on_the_quad() {
        // Rotating a 64x32 sprite by 90° keeps the 64-wide scale on x: the unit
        // quad is rotated first, then stretched.
        let m = model(&sprite(90.0, false, false));
        let corner = m * Vec4::new(0.5, 0.0, 0.0, 1.0); // rotates to (0, 0.5)
        assert!(corner.abs_diff_eq(Vec4::new(-250.0, 40.0 + 16.0, 0.0, 1.0), EPS));
    }

    #[test]
    fn positive_rotation_turns_counter_clockwise_on_screen() {
        let t = SpriteTransform {
            position: Vec2::ZERO,
            width: 1.0,
            height: 1.0,
            rotation: 90.0,
            flip_horizontal: false,
            flip_vertical: false,
        };
        let clip = projection(Viewport::new(2.0, 2.0)) * model(&t);

        // The right edge midpoint ends up at the top of the screen (+Y is up).
        let right = clip * Vec4::new(0.5, 0.0, 0.0, 1.0);
        assert!(right.abs_diff_eq(Vec4::new(0.0, 0.5, 0.0, 1.0), EPS));

        let quarter = model(&SpriteTransform { rotation: 45.0, ..t });
        let corner = quarter * Vec4::new(0.5, 0.0, 0.0, 1.0);
        assert!(corner.x > 0.0 && corner.y > 0.0);
    }

    #[test]
    fn horizontal_flip_negates_x_scale_for_any_rotation() {
        for rotation in [0.0, 30.0, 90.0, 135.0, 270.0, -45.0] {
            let plain = model(&sprite(rotation, false, false));
            let flipped = model(&sprite(rotation, true, false));

            // The x row of the linear part changes sign; everything else,
            // including the translation, is untouched.
            let expected = Mat4::from_cols(
                Vec4::new(-plain.x_axis.x, plain.x_axis.y, plain.x_axis.z, plain.x_axis.w),
                Vec4::new(-plain.y_axis.x, plain.y_axis.y, plain.y_axis.z, plain.y_axis.w),
                plain.z_axis,
                plain.w_axis,
            );
            assert!(flipped.abs_diff_eq(expected, EPS), "rotation {rotation}");
        }
    }

    #[test]
    fn flip_equals_negative_scale_axis() {
        let flipped = model(&sprite(30.0, true, true));
        let negated = model(&SpriteTransform {
            width: -64.0,
            height: -32.0,
            ..sprite(30.0, false, false)
        });
        assert!(flipped.abs_diff_eq(negated, EPS));
    }

    #[test]
    fn vertical_flip_mirrors_top_and_bottom() {
        let m = model(&sprite(0.0, false, true));
        let top = m * Vec4::new(0.0, 0.5, 0.0, 1.0);
        assert!(top.abs_diff_eq(Vec4::new(-250.0, 40.0 - 16.0, 0.0, 1.0), EPS));
    }

    // ── texture ───────────────────────────────────────────────────────────

    #[test]
    fn full_slice_is_identity() {
        let m = texture_transform(Rect::full(256, 256), 256, 256);
        assert!(m.abs_diff_eq(Mat4::IDENTITY, EPS));
    }

    #[test]
    fn half_width_slice_scales_x_by_half_anywhere() {
        for x in [0.0, 32.0, 96.0] {
            let m = texture_transform(Rect::new(x, 0.0, 96.0, 32.0), 192, 32);
            assert!((m.x_axis.x - 0.5).abs() < EPS, "x = {x}");
            assert!((m.y_axis.y - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn atlas_cell_maps_unit_quad_onto_cell() {
        // Sixth 32px cell of a 192x32 strip.
        let m = texture_transform(Rect::new(160.0, 0.0, 32.0, 32.0), 192, 32);

        let min = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let max = m * Vec4::new(1.0, 1.0, 0.0, 1.0);

        assert!(min.abs_diff_eq(Vec4::new(160.0 / 192.0, 0.0, 0.0, 1.0), EPS));
        assert!(max.abs_diff_eq(Vec4::new(1.0, 1.0, 0.0, 1.0), EPS));
    }
}
