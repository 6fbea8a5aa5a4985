use glam::{Mat4, Quat, Vec3, Vec4};

/// Change of basis from the game's coordinates to the host's.
/// Maps source `(x, y, z)` to `(x, -z, y)`.
#[must_use]
pub fn axis_correction() -> Mat4 {
    Mat4::from_cols(
        Vec4::new(1.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.0, -1.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.0, 1.0),
    )
}

/// Applies the axis correction to a direction or position.
#[must_use]
pub fn correct(vector: Vec3) -> Vec3 {
    Vec3::new(vector.x, -vector.z, vector.y)
}

/// Builds `T * S * R` with the translation multiplied by `unit_scale`.
#[must_use]
pub fn decode_transform(translation: Vec3, rotation: Quat, scale: Vec3, unit_scale: f32) -> Mat4 {
    Mat4::from_translation(translation * unit_scale)
        * Mat4::from_scale(scale)
        * Mat4::from_quat(rotation)
}

/// Converts a row-major affine matrix (basis in rows 0-2, translation in row 3) to column form.
/// The `w` column of the source is ignored and the translation is multiplied by `unit_scale`.
#[must_use]
pub fn rows_to_mat4(rows: &[[f32; 4]; 4], unit_scale: f32) -> Mat4 {
    let axis = |row: &[f32; 4]| Vec4::new(row[0], row[1], row[2], 0.0);
    let translation = Vec3::new(rows[3][0], rows[3][1], rows[3][2]) * unit_scale;

    Mat4::from_cols(
        axis(&rows[0]),
        axis(&rows[1]),
        axis(&rows[2]),
        translation.extend(1.0),
    )
}
