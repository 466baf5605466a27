//! Cameras and the per-frame camera state snapshot
//!
//! [`Camera`] is the mutable scene camera; [`CameraState`] is the immutable
//! snapshot carried through a frame. The water passes derive mirrored and
//! clipped variants from the snapshot without touching the scene camera.

use crate::foundation::math::{look_at, perspective_vk, Mat4, Vec3, Vec4};

/// Perspective scene camera
#[derive(Debug, Clone)]
pub struct Camera {
    /// World-space position
    pub position: Vec3,
    /// Look-at target
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width / height
    pub aspect_ratio: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Zoom factor applied to the field of view (1.0 = none)
    pub zoom: f32,
}

impl Camera {
    /// Perspective camera looking at the origin
    pub fn perspective(position: Vec3, fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::new(0.0, 0.0, 0.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov_y,
            aspect_ratio,
            near,
            far,
            zoom: 1.0,
        }
    }

    /// Unit vector from the camera to its target
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Update the aspect ratio after a resize
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Snapshot the camera for one frame
    pub fn state(&self) -> CameraState {
        CameraState {
            projection: perspective_vk(self.fov_y / self.zoom, self.aspect_ratio, self.near, self.far),
            view: look_at(self.position, self.target, self.up),
            position: self.position,
            clip_plane: None,
        }
    }
}

/// Immutable camera data for one frame
#[derive(Debug, Clone)]
pub struct CameraState {
    /// Projection matrix in Vulkan clip space
    pub projection: Mat4,
    /// View matrix
    pub view: Mat4,
    /// World-space eye position
    pub position: Vec3,
    /// Optional world-space clip plane `(a, b, c, d)`, pushed to the vertex
    /// stage when set (water refraction/reflection)
    pub clip_plane: Option<Vec4>,
}

impl CameraState {
    /// Refraction variant: same view, clip everything above the water plane
    /// at height `h` (plane `(0, -1, 0, h)`)
    pub fn refraction(&self, water_height: f32) -> CameraState {
        CameraState {
            projection: self.projection,
            view: self.view,
            position: self.position,
            clip_plane: Some(Vec4::new(0.0, -1.0, 0.0, water_height)),
        }
    }

    /// Reflection variant: the camera mirrored across the water plane at
    /// height `h`, clipping everything below it (plane `(0, 1, 0, -h)`)
    pub fn reflection(&self, water_height: f32) -> CameraState {
        // Reflect the view across the plane y = h: premultiply the view by
        // the mirror matrix so world geometry appears flipped.
        let mirror = Mat4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, -1.0, 0.0, 2.0 * water_height, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let mut position = self.position;
        position.y = 2.0 * water_height - position.y;
        CameraState {
            projection: self.projection,
            view: self.view * mirror,
            position,
            clip_plane: Some(Vec4::new(0.0, 1.0, 0.0, -water_height)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_state() -> CameraState {
        Camera::perspective(Vec3::new(0.0, 4.0, 10.0), 1.0, 16.0 / 9.0, 0.1, 100.0).state()
    }

    #[test]
    fn forward_points_at_target() {
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 10.0), 1.0, 1.0, 0.1, 100.0);
        let forward = camera.forward();
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn reflection_mirrors_eye_across_water_plane() {
        let state = test_state();
        let reflected = state.reflection(1.0);
        // eye at y = 4 mirrors to y = -2 across y = 1
        assert_relative_eq!(reflected.position.y, -2.0, epsilon = 1e-6);
        assert_eq!(reflected.clip_plane, Some(Vec4::new(0.0, 1.0, 0.0, -1.0)));
    }

    #[test]
    fn reflection_view_flips_world_points() {
        let state = test_state();
        let reflected = state.reflection(0.0);
        // a point above the water maps to where its mirror image would be
        let p = Vec4::new(3.0, 2.0, -5.0, 1.0);
        let mirrored = Vec4::new(3.0, -2.0, -5.0, 1.0);
        let a = reflected.view * p;
        let b = state.view * mirrored;
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn refraction_clips_above_surface() {
        let state = test_state();
        let refracted = state.refraction(0.5);
        assert_eq!(refracted.clip_plane, Some(Vec4::new(0.0, -1.0, 0.0, 0.5)));
        // view and projection are unchanged
        assert_eq!(refracted.view, state.view);
    }

    #[test]
    fn zoom_narrows_field_of_view() {
        let mut camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 1.0, 1.0, 0.1, 100.0);
        let wide = camera.state().projection[(1, 1)];
        camera.zoom = 2.0;
        let tight = camera.state().projection[(1, 1)];
        // larger y-scale means a narrower frustum
        assert!(tight.abs() > wide.abs());
    }
}
