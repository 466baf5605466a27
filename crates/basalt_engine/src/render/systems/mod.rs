//! Per-pass draw submission
//!
//! [`SubmissionSystem`] is a closed set of tagged variants, one per pipeline,
//! dispatched by `match`. The renderer schedules variants in pass order and
//! hands each the frame context and the shared [`SubmitEnv`]. Pipelines bind
//! once per system; per-entity material and resource sets bind per draw.

mod fullscreen;
mod lighting;
mod mesh;
mod overlay;

use ash::vk;

use crate::ecs::World;
use crate::scene::SceneGraph;

use super::frame::FrameContext;
use super::instances::ResourceDescriptor;
use super::mesh::Model;
use super::passes::BloomPyramid;
use super::pipelines::PipelineCatalog;
use super::registry::{CascadeSlot, DescriptorRegistry};
use super::ubo::ShaderFeatures;
use super::vulkan::VulkanContext;

/// Shared read-only state every submission can reach
pub struct SubmitEnv<'a> {
    /// Device entry point
    pub context: &'a VulkanContext,
    /// All pipelines
    pub catalog: &'a PipelineCatalog,
    /// Per-frame descriptor sets and UBO rings
    pub registry: &'a DescriptorRegistry,
    /// Resource descriptors indexed by instance-buffer id
    pub resources: &'a [ResourceDescriptor],
    /// Scene graph (for instance slots and world transforms)
    pub graph: &'a SceneGraph,
    /// Bloom pyramid (fullscreen systems)
    pub bloom: &'a BloomPyramid,
    /// Unit sphere for point-light proxies
    pub light_proxy: &'a Model,
    /// IBL environment set when an environment is loaded
    pub ibl_set: Option<vk::DescriptorSet>,
    /// Lighting input-attachment set overriding the registry's, used by the
    /// water instantiations of the 3D pass (their framebuffers carry their
    /// own G-buffer planes)
    pub lighting_override: Option<vk::DescriptorSet>,
    /// Debug line vertex buffer and vertex count, when the overlay is active
    pub debug_vertices: Option<(vk::Buffer, u32)>,
}

/// Push block of the G-buffer surface shaders
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SurfacePush {
    /// World-space clip plane, zero when inactive
    pub clip_plane: [f32; 4],
    /// Material base colour factor
    pub base_color: [f32; 4],
    /// Grass height/wind/time, zero for non-grass draws
    pub grass: [f32; 4],
}

unsafe impl bytemuck::Zeroable for SurfacePush {}
unsafe impl bytemuck::Pod for SurfacePush {}

/// Push block of the sprite shaders
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpritePush {
    /// Model (or screen placement) matrix
    pub model: [[f32; 4]; 4],
    /// Tint colour
    pub tint: [f32; 4],
    /// x = sheet cell, y = cells per row, z/w unused
    pub cell: [f32; 4],
}

unsafe impl bytemuck::Zeroable for SpritePush {}
unsafe impl bytemuck::Pod for SpritePush {}

/// Push block of the point-light proxy shaders
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LightPush {
    /// xyz world position, w radius
    pub position_radius: [f32; 4],
    /// rgb colour, a intensity
    pub color_intensity: [f32; 4],
}

unsafe impl bytemuck::Zeroable for LightPush {}
unsafe impl bytemuck::Pod for LightPush {}

/// Push block of the bloom/post fullscreen shaders
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FullscreenPush {
    /// Shader-specific parameters (texel size, exposure + feature bits)
    pub params: [f32; 4],
}

unsafe impl bytemuck::Zeroable for FullscreenPush {}
unsafe impl bytemuck::Pod for FullscreenPush {}

/// One schedulable draw submission
#[derive(Debug, Clone, Copy)]
pub enum SubmissionSystem {
    /// Static PBR/diffuse meshes into the G-buffer
    PbrOpaque,
    /// Skinned meshes into the G-buffer
    PbrSkeletal,
    /// Grass fields into the G-buffer
    Grass {
        /// Elapsed time driving wind sway
        time: f32,
    },
    /// Sky cubemap into the G-buffer background
    CubemapSky,
    /// World-space sprites in the transparency subpass
    Sprite3d,
    /// Screen-space sprites in the GUI pass
    SpriteGui,
    /// Point-light volumes in the transparency subpass
    PointLightProxy,
    /// Static depth-only casters into one cascade
    ShadowCast {
        /// Target cascade
        cascade: CascadeSlot,
    },
    /// Skinned depth-only casters into one cascade
    ShadowSkeletalCast {
        /// Target cascade
        cascade: CascadeSlot,
    },
    /// Fullscreen analytic deferred lighting
    DeferredLighting,
    /// Fullscreen image-based deferred lighting
    IblLighting,
    /// One bloom downsample step writing `mip`
    BloomDownsample {
        /// Destination mip
        mip: u32,
    },
    /// One bloom upsample step accumulating into `mip`
    BloomUpsample {
        /// Destination mip
        mip: u32,
    },
    /// Tonemap into the swap image
    PostProcess {
        /// Exposure multiplier
        exposure: f32,
        /// Feature bits forwarded to the shader
        features: ShaderFeatures,
    },
    /// Debug lines in the GUI pass
    DebugOverlay,
}

impl SubmissionSystem {
    /// Record this system's draws into the frame's command buffer
    pub fn submit(&self, env: &SubmitEnv, frame: &FrameContext, world: &World) {
        match *self {
            SubmissionSystem::PbrOpaque => mesh::submit_pbr_opaque(env, frame, world),
            SubmissionSystem::PbrSkeletal => mesh::submit_pbr_skeletal(env, frame, world),
            SubmissionSystem::Grass { time } => mesh::submit_grass(env, frame, world, time),
            SubmissionSystem::CubemapSky => overlay::submit_sky(env, frame, world),
            SubmissionSystem::Sprite3d => overlay::submit_sprites_3d(env, frame, world),
            SubmissionSystem::SpriteGui => overlay::submit_sprites_gui(env, frame, world),
            SubmissionSystem::PointLightProxy => {
                lighting::submit_point_lights(env, frame, world)
            }
            SubmissionSystem::ShadowCast { cascade } => {
                mesh::submit_shadow_cast(env, frame, world, cascade)
            }
            SubmissionSystem::ShadowSkeletalCast { cascade } => {
                mesh::submit_shadow_skeletal_cast(env, frame, world, cascade)
            }
            SubmissionSystem::DeferredLighting => lighting::submit_deferred(env, frame),
            SubmissionSystem::IblLighting => lighting::submit_ibl(env, frame),
            SubmissionSystem::BloomDownsample { mip } => {
                fullscreen::submit_bloom_down(env, frame, mip)
            }
            SubmissionSystem::BloomUpsample { mip } => {
                fullscreen::submit_bloom_up(env, frame, mip)
            }
            SubmissionSystem::PostProcess { exposure, features } => {
                fullscreen::submit_post(env, frame, exposure, features)
            }
            SubmissionSystem::DebugOverlay => overlay::submit_debug(env, frame),
        }
    }
}

/// Bind descriptor sets starting at `first_set` on a graphics pipeline
pub(crate) fn bind_sets(
    context: &VulkanContext,
    cmd: vk::CommandBuffer,
    layout: vk::PipelineLayout,
    first_set: u32,
    sets: &[vk::DescriptorSet],
) {
    unsafe {
        context.device().cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            first_set,
            sets,
            &[],
        );
    }
}

/// Push a Pod block at offset 0 for `stages`
pub(crate) fn push_block<T: bytemuck::Pod>(
    context: &VulkanContext,
    cmd: vk::CommandBuffer,
    layout: vk::PipelineLayout,
    stages: vk::ShaderStageFlags,
    block: &T,
) {
    unsafe {
        context
            .device()
            .cmd_push_constants(cmd, layout, stages, 0, bytemuck::bytes_of(block));
    }
}
