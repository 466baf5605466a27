//! Math utilities and types
//!
//! Provides fundamental math types for 3D graphics built on nalgebra.

pub use nalgebra::{
    Matrix3, Matrix4,
    Vector2, Vector3, Vector4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Local transform of a scene-graph node: scale, Euler rotation, translation.
///
/// Rotation is stored as Euler angles in radians, applied roll-pitch-yaw
/// (X, then Y, then Z), matching the convention of the scene files the
/// loaders emit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation in world units
    pub translation: Vec3,
    /// Euler rotation in radians (roll, pitch, yaw)
    pub rotation: Vec3,
    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only a translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a transform with translation and uniform scale
    pub fn from_translation_scale(translation: Vec3, scale: f32) -> Self {
        Self {
            translation,
            scale: Vec3::new(scale, scale, scale),
            ..Default::default()
        }
    }

    /// Convert to a column-major transformation matrix (T * R * S)
    pub fn to_matrix(&self) -> Mat4 {
        let rotation = Mat4::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::new_translation(&self.translation)
            * rotation
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Point3) -> Point3 {
        self.to_matrix().transform_point(&point)
    }
}

/// Compute the normal matrix for a world transform.
///
/// `transpose(inverse(mat3(world)))`, widened back to 4x4 for UBO upload.
/// Falls back to the untransposed upper 3x3 when the matrix is singular
/// (zero scale on some axis), which at least keeps normals finite.
pub fn normal_matrix(world: &Mat4) -> Mat4 {
    let upper: Mat3 = world.fixed_view::<3, 3>(0, 0).into_owned();
    let inv = upper.try_inverse().unwrap_or(upper);
    inv.transpose().to_homogeneous()
}

/// Right-handed perspective projection with Vulkan clip-space conventions.
///
/// nalgebra produces OpenGL clip space; Vulkan flips Y and uses [0, 1] depth.
pub fn perspective_vk(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    // GL-to-Vulkan clip correction: flip Y, halve and shift Z.
    let correction = Mat4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    );
    correction * Mat4::new_perspective(aspect, fovy, near, far)
}

/// Right-handed orthographic projection with Vulkan clip-space conventions.
pub fn orthographic_vk(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let correction = Mat4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    );
    correction * Mat4::new_orthographic(left, right, bottom, top, near, far)
}

/// Right-handed look-at view matrix
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_transform_is_identity_matrix() {
        let m = Transform::identity().to_matrix();
        assert_relative_eq!(m, Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn translation_lands_in_last_column() {
        let t = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let m = t.to_matrix();
        assert_relative_eq!(m.m14, 1.0);
        assert_relative_eq!(m.m24, 2.0);
        assert_relative_eq!(m.m34, 3.0);
    }

    #[test]
    fn scale_before_rotation_before_translation() {
        let t = Transform {
            translation: Vec3::new(10.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        // +Z scaled by 2 rotates onto +X, then translates by +10 in X.
        let p = t.transform_point(Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(p.x, 12.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn normal_matrix_undoes_nonuniform_scale() {
        let world = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0));
        let n = normal_matrix(&world);
        // A normal along +X on a surface stretched in X must shrink, not grow.
        let transformed = n.transform_vector(&Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(transformed.x, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn perspective_flips_y_for_vulkan() {
        let proj = perspective_vk(1.0, 1.0, 0.1, 100.0);
        let gl = Mat4::new_perspective(1.0, 1.0, 0.1, 100.0);
        assert_relative_eq!(proj.m22, -gl.m22, epsilon = 1e-6);
    }
}
