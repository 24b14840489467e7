/// Geometry layer: bounce-angle computation and rectangle hit-testing.
///
/// ## Bounce pipeline
///
/// A ball reflecting off a tile face goes through four stages:
///   1. Mirror the velocity component on the collision axis.
///   2. Deflect by up to ±30° based on where along the face the impact
///      landed (center = no bend, edges = full bend).
///   3. Snap the angle out of the forbidden zones around the four
///      cardinal directions (±30° each), into the nearest permitted
///      half-quadrant. Without this, balls settle into endless
///      horizontal or vertical shuttling.
///   4. Add a small bounded random perturbation, re-clamped into the
///      permitted band.
/// Speed magnitude is conserved through all four stages.
///
/// ## Hit-testing
///
/// Axis-aligned rectangle overlap with a per-kind inset: balls and
/// pickups collide with a smaller-than-visual box so grazing contact
/// doesn't register.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

/// Maximum face-offset deflection, degrees.
pub const MAX_DEFLECT_DEG: f32 = 30.0;

/// Forbidden zone half-width around each cardinal direction, degrees.
/// Permitted band per quadrant: [30°, 60°], centered on the diagonal.
pub const CARDINAL_MARGIN_DEG: f32 = 30.0;

/// Hitbox inset (per side, pixels) for small round actors.
pub const BALL_INSET: f32 = 3.0;
pub const PICKUP_INSET: f32 = 3.0;

/// Player inset is smaller: the player fills most of a cell.
pub const PLAYER_INSET: f32 = 2.0;

/// Which movement axis was blocked. `X` means the ball hit a vertical
/// tile face (mirror vx); `Y` a horizontal face (mirror vy).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HitAxis {
    X,
    Y,
}

/// Full bounce computation. `impact` is the signed offset of the hit
/// point along the tile face, normalized to [-1, 1] (0 = face center).
/// `jitter_deg` bounds the random perturbation; pass 0.0 for a fully
/// deterministic bounce.
pub fn bounce(vel: Vec2, axis: HitAxis, impact: f32, jitter_deg: f32, rng: &mut Pcg32) -> Vec2 {
    let speed = vel.length();
    if speed <= f32::EPSILON {
        return vel;
    }

    // Stage 1: naive reflection.
    let mut v = match axis {
        HitAxis::X => Vec2::new(-vel.x, vel.y),
        HitAxis::Y => Vec2::new(vel.x, -vel.y),
    };

    // Stage 2: bend the lateral component by the face offset.
    let bend = impact.clamp(-1.0, 1.0) * MAX_DEFLECT_DEG.to_radians().sin() * speed;
    match axis {
        HitAxis::X => v.y += bend,
        HitAxis::Y => v.x += bend,
    }

    // Stage 3: cardinal exclusion.
    let mut angle = v.y.atan2(v.x).to_degrees().rem_euclid(360.0);
    angle = clamp_off_cardinals(angle);

    // Stage 4: bounded perturbation, re-clamped so the exclusion holds.
    if jitter_deg > 0.0 {
        angle += rng.gen_range(-jitter_deg..=jitter_deg);
        angle = clamp_off_cardinals(angle.rem_euclid(360.0));
    }

    let rad = angle.to_radians();
    Vec2::new(rad.cos(), rad.sin()) * speed
}

/// Snap an angle (degrees, [0, 360)) into the permitted band of its
/// quadrant: at least `CARDINAL_MARGIN_DEG` away from every cardinal.
fn clamp_off_cardinals(angle: f32) -> f32 {
    let quadrant = (angle / 90.0).floor().min(3.0);
    let within = angle - quadrant * 90.0;
    let clamped = within.clamp(CARDINAL_MARGIN_DEG, 90.0 - CARDINAL_MARGIN_DEG);
    quadrant * 90.0 + clamped
}

/// Plain axis reflection for canvas-boundary hits (no angle correction).
pub fn reflect(vel: Vec2, axis: HitAxis) -> Vec2 {
    match axis {
        HitAxis::X => Vec2::new(-vel.x, vel.y),
        HitAxis::Y => Vec2::new(vel.x, -vel.y),
    }
}

// ══════════════════════════════════════════════════════════════
// Hit-testing
// ══════════════════════════════════════════════════════════════

/// AABB overlap test on center + half-extent rectangles.
pub fn rects_overlap(a: Vec2, a_half: Vec2, b: Vec2, b_half: Vec2) -> bool {
    (a.x - b.x).abs() < a_half.x + b_half.x && (a.y - b.y).abs() < a_half.y + b_half.y
}

/// Half-extent of a square actor of `size` pixels shrunk by `inset`
/// on every side.
pub fn inset_half(size: f32, inset: f32) -> Vec2 {
    Vec2::splat(((size - inset * 2.0) / 2.0).max(0.0))
}

// ══════════════════════════════════════════════════════════════
// Small shared helpers
// ══════════════════════════════════════════════════════════════

/// Pixel center of a grid cell.
pub fn cell_center(cell: (i32, i32), tile_size: f32) -> Vec2 {
    Vec2::new(
        cell.0 as f32 * tile_size + tile_size / 2.0,
        cell.1 as f32 * tile_size + tile_size / 2.0,
    )
}

/// Ease-in-out quadratic, used for pushed-block flight.
pub fn ease_in_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(0x5eed)
    }

    /// Degrees from the nearest cardinal direction.
    fn cardinal_distance(v: Vec2) -> f32 {
        let angle = v.y.atan2(v.x).to_degrees().rem_euclid(360.0);
        [0.0_f32, 90.0, 180.0, 270.0, 360.0]
            .iter()
            .map(|c| (angle - c).abs())
            .fold(f32::MAX, f32::min)
    }

    #[test]
    fn speed_invariant_across_axes_and_impacts() {
        let mut r = rng();
        let speed = 60.0;
        for &axis in &[HitAxis::X, HitAxis::Y] {
            for i in -10..=10 {
                let impact = i as f32 / 10.0;
                for &vel in &[
                    Vec2::new(speed, 0.0),
                    Vec2::new(-42.4, 42.4),
                    Vec2::new(30.0, -51.96),
                ] {
                    let out = bounce(vel, axis, impact, 4.0, &mut r);
                    assert!(
                        (out.length() - vel.length()).abs() < 1e-3,
                        "speed drifted: {} -> {}",
                        vel.length(),
                        out.length()
                    );
                }
            }
        }
    }

    #[test]
    fn angle_exclusion_holds_for_all_impacts() {
        let mut r = rng();
        for i in -10..=10 {
            let impact = i as f32 / 10.0;
            for &axis in &[HitAxis::X, HitAxis::Y] {
                let out = bounce(Vec2::new(60.0, 0.0), axis, impact, 0.0, &mut r);
                assert!(
                    cardinal_distance(out) >= CARDINAL_MARGIN_DEG - 1e-3,
                    "impact {impact} on {axis:?} left angle near a cardinal: {out:?}"
                );
            }
        }
    }

    #[test]
    fn angle_exclusion_survives_perturbation() {
        let mut r = rng();
        for _ in 0..200 {
            let out = bounce(Vec2::new(0.0, 60.0), HitAxis::Y, 0.3, 4.0, &mut r);
            assert!(cardinal_distance(out) >= CARDINAL_MARGIN_DEG - 1e-3);
        }
    }

    #[test]
    fn dead_center_horizontal_hit_gains_vertical_component() {
        let mut r = rng();
        let s = 60.0;
        let out = bounce(Vec2::new(s, 0.0), HitAxis::X, 0.0, 0.0, &mut r);
        assert!(out.y.abs() > 1.0, "no vertical component after correction: {out:?}");
        assert!((out.length() - s).abs() < 1e-3);
        // Reflected away from the wall it hit.
        assert!(out.x < 0.0);
    }

    #[test]
    fn boundary_reflection_is_plain_mirror() {
        let v = Vec2::new(12.0, -34.0);
        assert_eq!(reflect(v, HitAxis::X), Vec2::new(-12.0, -34.0));
        assert_eq!(reflect(v, HitAxis::Y), Vec2::new(12.0, 34.0));
    }

    #[test]
    fn insets_shrink_hitboxes() {
        let full = inset_half(16.0, 0.0);
        let ball = inset_half(16.0, BALL_INSET);
        assert!(ball.x < full.x);

        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(14.0, 0.0);
        // Full boxes overlap, inset boxes do not.
        assert!(rects_overlap(a, full, b, full));
        assert!(!rects_overlap(a, ball, b, ball));
    }

    #[test]
    fn ease_endpoints() {
        assert_eq!(ease_in_out_quad(0.0), 0.0);
        assert!((ease_in_out_quad(0.5) - 0.5).abs() < 1e-6);
        assert_eq!(ease_in_out_quad(1.0), 1.0);
        // Monotonic
        let mut prev = 0.0;
        for i in 0..=20 {
            let v = ease_in_out_quad(i as f32 / 20.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn cell_center_math() {
        assert_eq!(cell_center((0, 0), 16.0), Vec2::new(8.0, 8.0));
        assert_eq!(cell_center((3, 2), 16.0), Vec2::new(56.0, 40.0));
    }
}
