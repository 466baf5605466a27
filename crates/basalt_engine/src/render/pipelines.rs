//! The pipeline catalog: one graphics pipeline per submission variant
//!
//! Every SPIR-V module loads from the configured shader directory at startup
//! and a missing module is fatal. Pipelines are immutable alongside their
//! pass objects; viewport/scissor are dynamic so a swap-chain resize never
//! touches them.

use std::path::{Path, PathBuf};

use ash::vk;
use log::debug;

use super::mesh::{SkinnedVertex, Vertex};
use super::vulkan::{BlendMode, GraphicsPipeline, PipelineConfig, VulkanContext, VulkanResult};

/// Push-constant block shared by the G-buffer vertex/fragment shaders:
/// clip plane, base colour factor, grass wind parameters
pub const SURFACE_PUSH_SIZE: u32 = 48;
/// Push-constant block of the sprite shaders: model matrix, tint, sheet cell
pub const SPRITE_PUSH_SIZE: u32 = 96;
/// Push-constant block of the point-light proxy shaders
pub const LIGHT_PUSH_SIZE: u32 = 32;
/// Push-constant block of the bloom and post fullscreen shaders
pub const FULLSCREEN_PUSH_SIZE: u32 = 16;

/// Render pass handles the catalog targets
pub struct PassHandles {
    /// Shadow cascade pass (both cascades share the pass object shape)
    pub shadow: vk::RenderPass,
    /// The three-subpass 3D pass
    pub geometry: vk::RenderPass,
    /// Bloom downsample pass
    pub bloom_down: vk::RenderPass,
    /// Bloom upsample pass
    pub bloom_up: vk::RenderPass,
    /// Post-process pass
    pub post: vk::RenderPass,
    /// GUI overlay pass
    pub gui: vk::RenderPass,
}

/// Descriptor set layout handles, in the set-index order each variant binds
pub struct LayoutHandles {
    /// Global camera/lights UBO
    pub global: vk::DescriptorSetLayout,
    /// Static instance buffer
    pub static_resource: vk::DescriptorSetLayout,
    /// Skeletal instance buffer + bone palette
    pub skeletal_resource: vk::DescriptorSetLayout,
    /// Grass instance buffer + heightmap
    pub grass_resource: vk::DescriptorSetLayout,
    /// Surface material maps
    pub surface_material: vk::DescriptorSetLayout,
    /// Sky cubemap material
    pub cubemap_material: vk::DescriptorSetLayout,
    /// Shadow cascade UBO
    pub shadow: vk::DescriptorSetLayout,
    /// Both shadow maps
    pub shadow_map: vk::DescriptorSetLayout,
    /// G-buffer input attachments
    pub lighting: vk::DescriptorSetLayout,
    /// HDR + bloom sampling for post
    pub post: vk::DescriptorSetLayout,
    /// Single-image bloom sampling
    pub bloom_sample: vk::DescriptorSetLayout,
    /// Prefiltered environment + BRDF LUT + irradiance
    pub ibl: vk::DescriptorSetLayout,
}

/// All pipelines, keyed by the submission variant that binds them
pub struct PipelineCatalog {
    /// Static PBR meshes into the G-buffer
    pub pbr_opaque: GraphicsPipeline,
    /// Skinned PBR meshes into the G-buffer
    pub pbr_skeletal: GraphicsPipeline,
    /// Wind-swayed grass into the G-buffer
    pub grass: GraphicsPipeline,
    /// Sky cubemap into the G-buffer background
    pub cubemap_sky: GraphicsPipeline,
    /// World-space sprites in the transparency subpass
    pub sprite_3d: GraphicsPipeline,
    /// Screen-space sprites in the GUI pass
    pub sprite_gui: GraphicsPipeline,
    /// Point-light volumes in the transparency subpass
    pub point_light_proxy: GraphicsPipeline,
    /// Static depth-only shadow casters
    pub shadow_cast: GraphicsPipeline,
    /// Skinned depth-only shadow casters
    pub shadow_skeletal_cast: GraphicsPipeline,
    /// Fullscreen analytic deferred lighting
    pub deferred_lighting: GraphicsPipeline,
    /// Fullscreen image-based deferred lighting
    pub ibl_lighting: GraphicsPipeline,
    /// Bloom 13-tap downsample
    pub bloom_downsample: GraphicsPipeline,
    /// Bloom 3x3 tent upsample, additive
    pub bloom_upsample: GraphicsPipeline,
    /// Tonemap into the swap image
    pub post_process: GraphicsPipeline,
    /// Debug lines/text in the GUI pass
    pub debug_overlay: GraphicsPipeline,
}

impl PipelineCatalog {
    /// Build every variant from `shader_dir`
    pub fn new(
        context: &VulkanContext,
        shader_dir: &Path,
        passes: &PassHandles,
        layouts: &LayoutHandles,
    ) -> VulkanResult<Self> {
        let spv = |name: &str| -> PathBuf { shader_dir.join(name) };
        let push = |stages: vk::ShaderStageFlags, size: u32| vk::PushConstantRange {
            stage_flags: stages,
            offset: 0,
            size,
        };
        let both = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;

        // --- G-buffer fill (subpass 0) -----------------------------------
        let build_gbuffer = |vert: PathBuf,
                             frag: PathBuf,
                             resource_layout: vk::DescriptorSetLayout,
                             bindings: Vec<vk::VertexInputBindingDescription>,
                             attributes: Vec<vk::VertexInputAttributeDescription>,
                             cull: vk::CullModeFlags|
         -> VulkanResult<GraphicsPipeline> {
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.geometry);
            config.subpass = super::passes::geometry::SUBPASS_GBUFFER;
            config.color_attachment_count = super::passes::geometry::GBUFFER_PLANE_COUNT;
            config.vertex_bindings = bindings;
            config.vertex_attributes = attributes;
            config.cull_mode = cull;
            config.set_layouts = vec![layouts.global, resource_layout, layouts.surface_material];
            config.push_constants = vec![push(both, SURFACE_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)
        };

        let pbr_opaque = build_gbuffer(
            spv("pbr.vert.spv"),
            spv("pbr.frag.spv"),
            layouts.static_resource,
            vec![Vertex::binding_description()],
            Vertex::attribute_descriptions(),
            vk::CullModeFlags::BACK,
        )?;
        let pbr_skeletal = build_gbuffer(
            spv("pbr_skinned.vert.spv"),
            spv("pbr.frag.spv"),
            layouts.skeletal_resource,
            vec![SkinnedVertex::binding_description()],
            SkinnedVertex::attribute_descriptions(),
            vk::CullModeFlags::BACK,
        )?;
        // grass blades are planes viewed from both sides
        let grass = build_gbuffer(
            spv("grass.vert.spv"),
            spv("grass.frag.spv"),
            layouts.grass_resource,
            vec![Vertex::binding_description()],
            Vertex::attribute_descriptions(),
            vk::CullModeFlags::NONE,
        )?;
        // sky fills the G-buffer background behind everything else
        let cubemap_sky = {
            let vert = spv("sky.vert.spv");
            let frag = spv("sky.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.geometry);
            config.subpass = super::passes::geometry::SUBPASS_GBUFFER;
            config.color_attachment_count = super::passes::geometry::GBUFFER_PLANE_COUNT;
            config.depth_write = false;
            // sky renders at the far plane; pass fragments equal to it
            config.depth_compare = vk::CompareOp::LESS_OR_EQUAL;
            config.cull_mode = vk::CullModeFlags::FRONT;
            config.vertex_bindings = vec![Vertex::binding_description()];
            config.vertex_attributes = Vertex::position_only_attributes();
            config.set_layouts = vec![layouts.global, layouts.cubemap_material];
            GraphicsPipeline::new(context, &config)?
        };

        // --- Lighting subpass (1) ----------------------------------------
        let deferred_lighting = {
            let vert = spv("fullscreen.vert.spv");
            let frag = spv("lighting.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.geometry);
            config.subpass = super::passes::geometry::SUBPASS_LIGHTING;
            config.depth_test = false;
            config.depth_write = false;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.set_layouts = vec![layouts.global, layouts.lighting, layouts.shadow_map];
            GraphicsPipeline::new(context, &config)?
        };
        let ibl_lighting = {
            let vert = spv("fullscreen.vert.spv");
            let frag = spv("lighting_ibl.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.geometry);
            config.subpass = super::passes::geometry::SUBPASS_LIGHTING;
            config.depth_test = false;
            config.depth_write = false;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.set_layouts = vec![
                layouts.global,
                layouts.lighting,
                layouts.shadow_map,
                layouts.ibl,
            ];
            GraphicsPipeline::new(context, &config)?
        };
        // --- Transparency subpass (2) ------------------------------------
        let point_light_proxy = {
            let vert = spv("light_proxy.vert.spv");
            let frag = spv("light_proxy.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.geometry);
            config.subpass = super::passes::geometry::SUBPASS_TRANSPARENCY;
            config.depth_test = false;
            config.depth_write = false;
            config.blend = BlendMode::Additive;
            // light volumes shade from the inside when the camera enters them
            config.cull_mode = vk::CullModeFlags::FRONT;
            config.vertex_bindings = vec![Vertex::binding_description()];
            config.vertex_attributes = Vertex::position_only_attributes();
            config.set_layouts = vec![layouts.global, layouts.lighting];
            config.push_constants = vec![push(both, LIGHT_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)?
        };
        let sprite_3d = {
            let vert = spv("sprite3d.vert.spv");
            let frag = spv("sprite.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.geometry);
            config.subpass = super::passes::geometry::SUBPASS_TRANSPARENCY;
            config.depth_write = false;
            config.blend = BlendMode::Alpha;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.vertex_bindings = vec![Vertex::binding_description()];
            config.vertex_attributes = Vertex::attribute_descriptions();
            config.set_layouts = vec![layouts.global, layouts.surface_material];
            config.push_constants = vec![push(both, SPRITE_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)?
        };

        // --- Shadow cascades ---------------------------------------------
        let shadow_cast = {
            let vert = spv("shadow.vert.spv");
            let mut config = PipelineConfig::new(&vert, None, passes.shadow);
            config.color_attachment_count = 0;
            config.vertex_bindings = vec![Vertex::binding_description()];
            config.vertex_attributes = Vertex::position_only_attributes();
            // front-face culling and a slope bias against acne
            config.cull_mode = vk::CullModeFlags::FRONT;
            config.depth_bias = Some((1.25, 1.75));
            config.set_layouts = vec![layouts.shadow, layouts.static_resource];
            GraphicsPipeline::new(context, &config)?
        };
        let shadow_skeletal_cast = {
            let vert = spv("shadow_skinned.vert.spv");
            let mut config = PipelineConfig::new(&vert, None, passes.shadow);
            config.color_attachment_count = 0;
            config.vertex_bindings = vec![SkinnedVertex::binding_description()];
            config.vertex_attributes = SkinnedVertex::shadow_attributes();
            config.cull_mode = vk::CullModeFlags::FRONT;
            config.depth_bias = Some((1.25, 1.75));
            config.set_layouts = vec![layouts.shadow, layouts.skeletal_resource];
            GraphicsPipeline::new(context, &config)?
        };

        // --- Bloom ---------------------------------------------------------
        let bloom_downsample = {
            let vert = spv("fullscreen.vert.spv");
            let frag = spv("bloom_down.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.bloom_down);
            config.depth_test = false;
            config.depth_write = false;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.set_layouts = vec![layouts.bloom_sample];
            config.push_constants =
                vec![push(vk::ShaderStageFlags::FRAGMENT, FULLSCREEN_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)?
        };
        let bloom_upsample = {
            let vert = spv("fullscreen.vert.spv");
            let frag = spv("bloom_up.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.bloom_up);
            config.depth_test = false;
            config.depth_write = false;
            config.blend = BlendMode::Additive;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.set_layouts = vec![layouts.bloom_sample];
            config.push_constants =
                vec![push(vk::ShaderStageFlags::FRAGMENT, FULLSCREEN_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)?
        };

        // --- Post + GUI ----------------------------------------------------
        let post_process = {
            let vert = spv("fullscreen.vert.spv");
            let frag = spv("post.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.post);
            config.depth_test = false;
            config.depth_write = false;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.set_layouts = vec![layouts.post];
            config.push_constants =
                vec![push(vk::ShaderStageFlags::FRAGMENT, FULLSCREEN_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)?
        };
        let sprite_gui = {
            let vert = spv("sprite_gui.vert.spv");
            let frag = spv("sprite.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.gui);
            config.depth_test = false;
            config.depth_write = false;
            config.blend = BlendMode::Alpha;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.vertex_bindings = vec![Vertex::binding_description()];
            config.vertex_attributes = Vertex::attribute_descriptions();
            // the sprite fragment shader expects its material at set 1, so
            // the GUI variant keeps the global set bound even though its
            // vertex stage never reads it
            config.set_layouts = vec![layouts.global, layouts.surface_material];
            config.push_constants = vec![push(both, SPRITE_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)?
        };
        let debug_overlay = {
            let vert = spv("debug.vert.spv");
            let frag = spv("debug.frag.spv");
            let mut config = PipelineConfig::new(&vert, Some(&frag), passes.gui);
            config.topology = vk::PrimitiveTopology::LINE_LIST;
            config.depth_test = false;
            config.depth_write = false;
            config.blend = BlendMode::Alpha;
            config.cull_mode = vk::CullModeFlags::NONE;
            config.vertex_bindings = vec![Vertex::binding_description()];
            config.vertex_attributes = Vertex::attribute_descriptions();
            config.set_layouts = vec![layouts.global];
            config.push_constants = vec![push(both, SPRITE_PUSH_SIZE)];
            GraphicsPipeline::new(context, &config)?
        };

        debug!("Pipeline catalog built from {}", shader_dir.display());
        Ok(Self {
            pbr_opaque,
            pbr_skeletal,
            grass,
            cubemap_sky,
            sprite_3d,
            sprite_gui,
            point_light_proxy,
            shadow_cast,
            shadow_skeletal_cast,
            deferred_lighting,
            ibl_lighting,
            bloom_downsample,
            bloom_upsample,
            post_process,
            debug_overlay,
        })
    }
}
