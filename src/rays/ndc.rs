//! Normalized device coordinate remapping for forward-facing scenes
//!
//! Remaps world-space rays of an identity-pose pinhole camera into the
//! NDC cube, where the valid near and far planes land on 0 and 1 along
//! the remapped ray. Direction outputs are intentionally not unit length.

use crate::core::types::Vec3;

/// Convert rays to NDC space. `focaly` defaults to `focal` when `None`.
///
/// Origins are first advanced to the near plane (`oz = -near`), then
/// projected; directions point from the projected origin to the projected
/// point at infinity.
pub fn convert_to_ndc(
    origins: &[Vec3],
    directions: &[Vec3],
    focal: f32,
    width: usize,
    height: usize,
    near: f32,
    focaly: Option<f32>,
) -> (Vec<Vec3>, Vec<Vec3>) {
    let fx = focal;
    let fy = focaly.unwrap_or(focal);
    let w = width as f32;
    let h = height as f32;

    let mut out_origins = Vec::with_capacity(origins.len());
    let mut out_directions = Vec::with_capacity(directions.len());
    for (o, d) in origins.iter().zip(directions) {
        let t = -(near + o.z) / d.z;
        let o = *o + *d * t;

        let origin_ndc = Vec3::new(
            -2.0 * fx / w * o.x / o.z,
            -2.0 * fy / h * o.y / o.z,
            -1.0,
        );
        let infinity_ndc = Vec3::new(
            -2.0 * fx / w * d.x / d.z,
            -2.0 * fy / h * d.y / d.z,
            1.0,
        );
        out_origins.push(origin_ndc);
        out_directions.push(infinity_ndc - origin_ndc);
    }
    (out_origins, out_directions)
}

/// Advance ray origins along their direction until `oz = near`.
pub fn shift_origins(origins: &[Vec3], directions: &[Vec3], near: f32) -> Vec<Vec3> {
    origins
        .iter()
        .zip(directions)
        .map(|(o, d)| {
            let t = (near - o.z) / d.z;
            *o + *d * t
        })
        .collect()
}
