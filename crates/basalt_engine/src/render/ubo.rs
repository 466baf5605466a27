//! GPU uniform data layouts
//!
//! All structs here are `#[repr(C, align(16))]` and laid out to match the
//! std140 blocks in the shaders. Matrices are column-major (nalgebra's
//! native order, same as GLSL). Each UBO lives in a persistently mapped
//! ring with one slot per frame-in-flight.

use bitflags::bitflags;

use crate::foundation::math::Mat4;

/// Maximum point lights packed into [`GlobalUbo`]
pub const MAX_POINT_LIGHTS: usize = 8;
/// Maximum directional lights (one shadow cascade each)
pub const MAX_DIRECTIONAL_LIGHTS: usize = 2;
/// Maximum bones per skeletal instance
pub const MAX_BONES: usize = 64;

bitflags! {
    /// Per-frame feature toggles read by the lighting and post shaders
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ShaderFeatures: u32 {
        /// Sample the shadow maps in the lighting subpass
        const SHADOWS = 1 << 0;
        /// Use image-based lighting instead of analytic ambient
        const IBL = 1 << 1;
        /// Composite the bloom pyramid in post-process
        const BLOOM = 1 << 2;
    }
}

/// Column-major matrix as the shaders consume it
pub type GpuMat4 = [[f32; 4]; 4];

/// Convert a nalgebra matrix into the GPU layout
pub fn gpu_mat4(m: &Mat4) -> GpuMat4 {
    (*m).into()
}

/// One point light as packed in [`GlobalUbo`]
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct PointLightGpu {
    /// xyz position, w radius
    pub position_radius: [f32; 4],
    /// rgb colour, a intensity
    pub color_intensity: [f32; 4],
}

unsafe impl bytemuck::Zeroable for PointLightGpu {}
unsafe impl bytemuck::Pod for PointLightGpu {}

impl Default for PointLightGpu {
    fn default() -> Self {
        Self {
            position_radius: [0.0; 4],
            color_intensity: [0.0; 4],
        }
    }
}

/// One directional light with its shadow cascade data
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct DirectionalLightGpu {
    /// xyz direction (normalized, pointing from the light), w intensity
    pub direction_intensity: [f32; 4],
    /// rgb colour, a unused
    pub color: [f32; 4],
    /// Cascade view-projection for shadow lookup
    pub view_proj: GpuMat4,
    /// Which shadow map samples this cascade: 0 hi-res, 1 lo-res
    pub shadow_map_index: u32,
    _pad: [u32; 3],
}

unsafe impl bytemuck::Zeroable for DirectionalLightGpu {}
unsafe impl bytemuck::Pod for DirectionalLightGpu {}

impl Default for DirectionalLightGpu {
    fn default() -> Self {
        Self {
            direction_intensity: [0.0, -1.0, 0.0, 0.0],
            color: [0.0; 4],
            view_proj: Mat4::identity().into(),
            shadow_map_index: 0,
            _pad: [0; 3],
        }
    }
}

impl DirectionalLightGpu {
    /// Populate a slot from CPU-side light data
    pub fn new(
        direction: [f32; 3],
        intensity: f32,
        color: [f32; 3],
        view_proj: &Mat4,
        shadow_map_index: u32,
    ) -> Self {
        Self {
            direction_intensity: [direction[0], direction[1], direction[2], intensity],
            color: [color[0], color[1], color[2], 0.0],
            view_proj: gpu_mat4(view_proj),
            shadow_map_index,
            _pad: [0; 3],
        }
    }
}

/// Per-frame globals: camera, lights, feature flags
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct GlobalUbo {
    /// Camera projection (Vulkan clip space)
    pub projection: GpuMat4,
    /// Camera view
    pub view: GpuMat4,
    /// rgb ambient colour, a intensity
    pub ambient: [f32; 4],
    /// Point lights; only the first `point_light_count` are valid
    pub point_lights: [PointLightGpu; MAX_POINT_LIGHTS],
    /// Directional lights; only the first `directional_light_count` are valid
    pub directional_lights: [DirectionalLightGpu; MAX_DIRECTIONAL_LIGHTS],
    /// Valid entries in `point_lights`
    pub point_light_count: u32,
    /// Valid entries in `directional_lights`
    pub directional_light_count: u32,
    /// [`ShaderFeatures`] bits
    pub features: u32,
    _pad: u32,
}

unsafe impl bytemuck::Zeroable for GlobalUbo {}
unsafe impl bytemuck::Pod for GlobalUbo {}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::identity().into(),
            view: Mat4::identity().into(),
            ambient: [1.0, 1.0, 1.0, 0.03],
            point_lights: [PointLightGpu::default(); MAX_POINT_LIGHTS],
            directional_lights: [DirectionalLightGpu::default(); MAX_DIRECTIONAL_LIGHTS],
            point_light_count: 0,
            directional_light_count: 0,
            features: ShaderFeatures::empty().bits(),
            _pad: 0,
        }
    }
}

/// Projection and view for one shadow cascade
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct ShadowUbo {
    /// Orthographic cascade projection
    pub projection: GpuMat4,
    /// Light-space view
    pub view: GpuMat4,
}

unsafe impl bytemuck::Zeroable for ShadowUbo {}
unsafe impl bytemuck::Pod for ShadowUbo {}

impl Default for ShadowUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::identity().into(),
            view: Mat4::identity().into(),
        }
    }
}

/// Bone palette for one skeletal instance
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct BoneUbo {
    /// Skinning matrices in bind-pose order
    pub bones: [GpuMat4; MAX_BONES],
}

unsafe impl bytemuck::Zeroable for BoneUbo {}
unsafe impl bytemuck::Pod for BoneUbo {}

impl Default for BoneUbo {
    fn default() -> Self {
        Self {
            bones: [Mat4::identity().into(); MAX_BONES],
        }
    }
}

/// Per-instance element of the GPU instance array
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct InstanceRecord {
    /// World transform
    pub model: GpuMat4,
    /// Normal matrix (inverse-transpose of the world 3x3, padded to mat4)
    pub normal: GpuMat4,
    /// Index into the material table
    pub material_index: u32,
    _pad: [u32; 3],
}

unsafe impl bytemuck::Zeroable for InstanceRecord {}
unsafe impl bytemuck::Pod for InstanceRecord {}

impl Default for InstanceRecord {
    fn default() -> Self {
        Self {
            model: Mat4::identity().into(),
            normal: Mat4::identity().into(),
            material_index: 0,
            _pad: [0; 3],
        }
    }
}

impl InstanceRecord {
    /// Build a record from world and normal matrices
    pub fn new(world: &Mat4, normal: &Mat4, material_index: u32) -> Self {
        Self {
            model: gpu_mat4(world),
            normal: gpu_mat4(normal),
            material_index,
            _pad: [0; 3],
        }
    }

    /// Identity-transform record, used when a slot is first allocated
    pub fn with_material(material_index: u32) -> Self {
        Self {
            material_index,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn layouts_are_std140_sized() {
        assert_eq!(size_of::<PointLightGpu>(), 32);
        assert_eq!(size_of::<DirectionalLightGpu>(), 112);
        assert_eq!(size_of::<ShadowUbo>(), 128);
        assert_eq!(size_of::<BoneUbo>(), 64 * MAX_BONES);
        assert_eq!(size_of::<InstanceRecord>(), 144);
        // projection + view + ambient + 8 point + 2 directional + counts
        assert_eq!(
            size_of::<GlobalUbo>(),
            64 + 64 + 16 + 8 * 32 + 2 * 112 + 16
        );
    }

    #[test]
    fn layouts_are_16_byte_aligned() {
        assert_eq!(size_of::<GlobalUbo>() % 16, 0);
        assert_eq!(size_of::<ShadowUbo>() % 16, 0);
        assert_eq!(size_of::<BoneUbo>() % 16, 0);
        assert_eq!(size_of::<InstanceRecord>() % 16, 0);
    }

    #[test]
    fn gpu_mat4_is_column_major() {
        let m = Mat4::new(
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        );
        let gpu = gpu_mat4(&m);
        // first GPU column is the matrix's first column
        assert_eq!(gpu[0], [1.0, 5.0, 9.0, 13.0]);
        assert_eq!(gpu[3], [4.0, 8.0, 12.0, 16.0]);
    }

    #[test]
    fn fresh_instance_record_is_identity_with_material() {
        let record = InstanceRecord::with_material(7);
        assert_eq!(record.material_index, 7);
        assert_eq!(record.model, InstanceRecord::default().model);
    }

    #[test]
    fn directional_light_packs_cascade_data() {
        let view_proj = Mat4::new_translation(&crate::foundation::math::Vec3::new(1.0, 2.0, 3.0));
        let light = DirectionalLightGpu::new([0.0, -1.0, 0.0], 3.0, [1.0, 0.9, 0.8], &view_proj, 1);
        assert_eq!(light.direction_intensity, [0.0, -1.0, 0.0, 3.0]);
        assert_eq!(light.color, [1.0, 0.9, 0.8, 0.0]);
        assert_eq!(light.shadow_map_index, 1);
        // the cascade matrix rides along for the shadow lookup
        assert_eq!(light.view_proj[3], [1.0, 2.0, 3.0, 1.0]);
        // index sits right after the matrix, 16 bytes from the end
        let bytes = bytemuck::bytes_of(&light);
        assert_eq!(bytes[96..100], 1u32.to_ne_bytes());
    }

    #[test]
    fn feature_bits_compose() {
        let features = ShaderFeatures::SHADOWS | ShaderFeatures::IBL;
        assert_eq!(features.bits(), 0b11);
        assert!(!features.contains(ShaderFeatures::BLOOM));
    }
}
