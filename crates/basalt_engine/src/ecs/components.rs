//! Components consumed by the renderer
//!
//! Game and loader code attach these to entities; the per-pass submission
//! systems query them through typed views. The renderer never mutates them
//! except for skeletal animation advancement at frame-begin.

use crate::foundation::math::{Vec2, Vec3};
use crate::render::mesh::ModelHandle;
use crate::scene::NodeId;

/// Link from an entity to its scene-graph node (and thus its world transform)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformNode(pub NodeId);

/// A renderable mesh instance
#[derive(Clone)]
pub struct MeshRenderer {
    /// Shared model providing vertex/index buffers and material descriptors
    pub model: ModelHandle,
    /// Disabled renderers are skipped by every pass, shadows included
    pub enabled: bool,
}

/// Marker selecting the PBR opaque pipeline for a mesh
#[derive(Debug, Clone, Copy, Default)]
pub struct PbrMaterialTag;

/// Marker selecting the diffuse-only pipeline for a mesh
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffuseMaterialTag;

/// Marker for meshes driven by skeletal animation
#[derive(Debug, Clone, Copy)]
pub struct SkeletalAnimationTag {
    /// Whether the animation advances this frame
    pub playing: bool,
}

impl Default for SkeletalAnimationTag {
    fn default() -> Self {
        Self { playing: true }
    }
}

/// Analytic point light
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    /// Linear RGB colour
    pub color: Vec3,
    /// Radiant intensity multiplier
    pub intensity: f32,
    /// Influence radius in world units
    pub radius: f32,
}

/// The shadow cascade a directional light renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowCascade {
    /// High-resolution cascade covering the near frustum slice
    HiRes,
    /// Low-resolution cascade covering the far frustum slice
    LoRes,
}

impl ShadowCascade {
    /// Index of this cascade in the shadow-map descriptor set
    pub fn index(self) -> u32 {
        match self {
            ShadowCascade::HiRes => 0,
            ShadowCascade::LoRes => 1,
        }
    }
}

/// Shadow-casting directional light
#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    /// Direction the light travels (normalized by the lighting pass)
    pub direction: Vec3,
    /// Linear RGB colour
    pub color: Vec3,
    /// Radiant intensity multiplier
    pub intensity: f32,
    /// Which cascade this light's shadow map renders into
    pub cascade: ShadowCascade,
}

/// Screen-space sprite drawn in the GUI pass
#[derive(Debug, Clone, Copy)]
pub struct SpriteRenderer2D {
    /// Size in pixels
    pub size: Vec2,
    /// Tint multiplied over the spritesheet sample
    pub tint: [f32; 4],
    /// Draw order within the GUI pass (higher draws later)
    pub layer: i32,
    /// Cell index into the global spritesheet
    pub sheet_cell: u32,
}

/// World-space billboard sprite drawn in the transparency subpass
#[derive(Debug, Clone, Copy)]
pub struct SpriteRenderer3D {
    /// Size in world units
    pub size: Vec2,
    /// Tint multiplied over the spritesheet sample
    pub tint: [f32; 4],
    /// Cell index into the global spritesheet
    pub sheet_cell: u32,
}

/// Marker for the skybox entity; its mesh must carry a cubemap material
#[derive(Debug, Clone, Copy, Default)]
pub struct CubemapSky;

/// A water plane triggering the reflection/refraction passes
#[derive(Debug, Clone, Copy)]
pub struct WaterSurface {
    /// World-space height (y) of the surface plane
    pub height: f32,
}

/// Instanced grass/height-field patch
#[derive(Debug, Clone, Copy)]
pub struct GrassField {
    /// Blade height multiplier
    pub height_scale: f32,
    /// Wind sway strength fed to the vertex shader
    pub wind_strength: f32,
}

/// Physics tag; present on many scene entities, ignored by the renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct RigidBodyTag;
