//! The frame renderer
//!
//! [`Renderer`] owns the Vulkan context, the swap-chain, every pass object,
//! the descriptor registry, the pipeline catalog and the instance table, and
//! drives the fixed frame shape: shadows, water, the three-subpass 3D pass,
//! bloom, post-process and GUI. One `render` call records and submits one
//! frame; a stale swap-chain aborts the frame, rebuilds the size-dependent
//! state and resumes on the next call.

use std::collections::VecDeque;

use ash::vk;
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::RendererSettings;
use crate::ecs::components::{
    DirectionalLight, MeshRenderer, PointLight, ShadowCascade, SkeletalAnimationTag,
    TransformNode, WaterSurface,
};
use crate::ecs::World;
use crate::foundation::math::{look_at, orthographic_vk, Mat4, Vec3};
use crate::scene::{InstanceSlot, SceneGraph};

use super::camera::{Camera, CameraState};
use super::frame::FrameContext;
use super::instances::{
    grass_resource_layout, skeletal_resource_layout, static_resource_layout, InstanceTable,
    ResourceDescriptor,
};
use super::material::{
    cubemap_material_layout, surface_material_layout, DummyTextures, MaterialDescriptor,
    MaterialMaps,
};
use super::mesh::{self, Model, ModelHandle};
use super::passes::{
    BloomPyramid, GeometryPass, GuiPass, PostPass, ShadowPass, WaterPass,
};
use super::pipelines::{LayoutHandles, PassHandles, PipelineCatalog};
use super::registry::{CascadeSlot, DescriptorRegistry, GlobalSlot};
use super::systems::{SubmissionSystem, SubmitEnv};
use super::ubo::{
    gpu_mat4, DirectionalLightGpu, GlobalUbo, PointLightGpu, ShaderFeatures, ShadowUbo,
    MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS,
};
use super::vulkan::{
    CommandPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, FrameAcquire, Sampler,
    SubmitOutcome, Surface, Swapchain, Texture, VulkanContext, VulkanError, Window,
    MAX_FRAMES_IN_FLIGHT,
};

/// Errors surfaced to the application loop
#[derive(Error, Debug)]
pub enum RenderError {
    /// A Vulkan operation failed, or the surface changed incompatibly
    #[error(transparent)]
    Vulkan(#[from] VulkanError),
}

/// Shorthand result for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Half extent and depth range of each shadow cascade's orthographic volume
const CASCADE_VOLUMES: [(f32, f32); 2] = [(24.0, 200.0), (96.0, 400.0)];

/// The deferred Vulkan frame renderer
pub struct Renderer {
    settings: RendererSettings,

    catalog: PipelineCatalog,
    registry: DescriptorRegistry,

    shadow_hi: ShadowPass,
    shadow_lo: ShadowPass,
    geometry: GeometryPass,
    water: WaterPass,
    bloom: BloomPyramid,
    post: PostPass,
    gui: GuiPass,

    static_layout: DescriptorSetLayout,
    skeletal_layout: DescriptorSetLayout,
    grass_layout: DescriptorSetLayout,
    surface_material: DescriptorSetLayout,
    cubemap_material: DescriptorSetLayout,
    ibl_layout: DescriptorSetLayout,

    shadow_sampler: Sampler,
    clamp_sampler: Sampler,
    linear_sampler: Sampler,
    dummies: DummyTextures,
    // owned so the global sets' views stay valid
    sprite_images: Option<(Texture, Texture)>,
    light_proxy: Model,

    instances: InstanceTable,
    resources: Vec<ResourceDescriptor>,
    retire_queue: VecDeque<(u64, ModelHandle)>,

    ibl_set: Option<vk::DescriptorSet>,
    debug_vertices: Option<(vk::Buffer, u32)>,

    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,

    frame_counter: u64,
    total_time: f32,
    warned_light_overflow: bool,

    // dropped after everything that borrows the device
    swapchain: Swapchain,
    surface: Surface,
    context: VulkanContext,
}

impl Renderer {
    /// Bring up the full frame pipeline against `window`
    pub fn new(window: &mut Window, settings: &RendererSettings) -> RenderResult<Self> {
        let (context, surface) =
            VulkanContext::new(window, "basalt", settings.enable_validation)?;
        let (width, height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            &context,
            &surface,
            vk::Extent2D { width, height },
            settings.present_mode,
        )?;
        let extent = swapchain.extent();

        let command_pool = CommandPool::new(&context)?;
        let command_buffers = command_pool.allocate(MAX_FRAMES_IN_FLIGHT as u32)?;

        let shadow_hi = ShadowPass::new(&context, settings.shadow_map_hi_size)?;
        let shadow_lo = ShadowPass::new(&context, settings.shadow_map_lo_size)?;
        let geometry = GeometryPass::new(
            &context,
            extent,
            swapchain.depth_format(),
            settings.clear_color,
        )?;
        let water = WaterPass::new(&context, &geometry, extent, swapchain.depth_format())?;

        let shadow_sampler = Sampler::shadow(&context)?;
        let clamp_sampler = Sampler::clamped(&context)?;
        let linear_sampler = Sampler::linear(&context)?;

        let mut registry = DescriptorRegistry::new(
            &context,
            shadow_hi.map_view(),
            shadow_lo.map_view(),
            &shadow_sampler,
        )?;
        let bloom = BloomPyramid::new(
            &context,
            registry.pool(),
            &clamp_sampler,
            extent,
            settings.bloom_levels,
            geometry.targets().emission.view(),
        )?;
        registry.rewrite_attachment_sets(
            &context,
            geometry.targets(),
            bloom.output_view(),
            &clamp_sampler,
        );
        registry.rewrite_water_lighting(
            &context,
            water.refraction_targets(),
            water.reflection_targets(),
        );

        let post = PostPass::new(&context, &swapchain)?;
        let gui = GuiPass::new(&context, &swapchain)?;

        let static_layout = static_resource_layout(&context)?;
        let skeletal_layout = skeletal_resource_layout(&context)?;
        let grass_layout = grass_resource_layout(&context)?;
        let surface_material = surface_material_layout(&context)?;
        let cubemap_material = cubemap_material_layout(&context)?;
        // prefiltered environment, BRDF LUT, irradiance
        let ibl_layout = DescriptorSetLayoutBuilder::new()
            .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
            .sampled_image(1, vk::ShaderStageFlags::FRAGMENT)
            .sampled_image(2, vk::ShaderStageFlags::FRAGMENT)
            .build(&context)?;

        let passes = PassHandles {
            shadow: shadow_hi.pass(),
            geometry: geometry.pass(),
            bloom_down: bloom.down_pass(),
            bloom_up: bloom.up_pass(),
            post: post.pass(),
            gui: gui.pass(),
        };
        let layouts = LayoutHandles {
            global: registry.global_layout().handle(),
            static_resource: static_layout.handle(),
            skeletal_resource: skeletal_layout.handle(),
            grass_resource: grass_layout.handle(),
            surface_material: surface_material.handle(),
            cubemap_material: cubemap_material.handle(),
            shadow: registry.shadow_layout().handle(),
            shadow_map: registry.shadow_map_layout().handle(),
            lighting: registry.lighting_layout().handle(),
            post: registry.post_layout().handle(),
            bloom_sample: bloom.sample_layout().handle(),
            ibl: ibl_layout.handle(),
        };
        let catalog = PipelineCatalog::new(&context, &settings.shader_dir, &passes, &layouts)?;

        let dummies = DummyTextures::new(&context, &command_pool)?;
        // the global set's spritesheet and font atlas start as the white
        // dummy until the application installs real images
        registry.write_global_images(
            &context,
            dummies.white.view(),
            dummies.white.view(),
            &linear_sampler,
        );
        let light_proxy = mesh::unit_sphere(&context, &command_pool, 12, 16)?;

        info!(
            "Renderer up: {}x{}, {} bloom levels, shadows {}/{}",
            extent.width,
            extent.height,
            bloom.levels(),
            settings.shadow_map_hi_size,
            settings.shadow_map_lo_size
        );

        Ok(Self {
            settings: settings.clone(),
            catalog,
            registry,
            shadow_hi,
            shadow_lo,
            geometry,
            water,
            bloom,
            post,
            gui,
            static_layout,
            skeletal_layout,
            grass_layout,
            surface_material,
            cubemap_material,
            ibl_layout,
            shadow_sampler,
            clamp_sampler,
            linear_sampler,
            dummies,
            sprite_images: None,
            light_proxy,
            instances: InstanceTable::new(),
            resources: Vec::new(),
            retire_queue: VecDeque::new(),
            ibl_set: None,
            debug_vertices: None,
            command_buffers,
            command_pool,
            frame_counter: 0,
            total_time: 0.0,
            warned_light_overflow: false,
            swapchain,
            surface,
            context,
        })
    }

    /// Record and present one frame.
    ///
    /// Aborts (returning `Ok`) when the swap-chain is stale; the
    /// size-dependent state is rebuilt before returning so the next call
    /// renders normally.
    pub fn render(
        &mut self,
        world: &mut World,
        graph: &mut SceneGraph,
        camera: &Camera,
        dt: f32,
    ) -> RenderResult<()> {
        self.frame_counter += 1;
        self.total_time += dt;
        self.collect_retired();

        let image_index = match self.swapchain.acquire()? {
            FrameAcquire::Acquired { image_index } => image_index,
            FrameAcquire::NeedsRecreate => {
                self.recreate()?;
                return Ok(());
            }
        };
        let frame = self.swapchain.current_frame();

        // skeletal playback feeds the per-resource bone rings
        for (_, node, renderer, tag) in
            world.view3::<TransformNode, MeshRenderer, SkeletalAnimationTag>()
        {
            if !tag.playing || !renderer.enabled {
                continue;
            }
            if let (Some(palette), Some(slot)) =
                (renderer.model.update_animation(dt), graph.instance_slot(node.0))
            {
                self.resources[slot.buffer as usize].write_bones(frame, &palette);
            }
        }

        let updated = graph.propagate(&mut self.instances);
        if updated > 0 {
            debug!("Propagated {updated} scene nodes");
        }
        self.instances.upload(frame);

        let water_height = world
            .view::<WaterSurface>()
            .next()
            .map(|(_, surface)| surface.height);

        let main_state = camera.state();
        let (lights, features) = self.write_frame_ubos(world, graph, camera, &main_state, water_height, frame);

        let cmd = self.command_buffers[frame];
        unsafe {
            self.context
                .device()
                .begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::builder())
                .map_err(VulkanError::Api)?;
        }

        let env = SubmitEnv {
            context: &self.context,
            catalog: &self.catalog,
            registry: &self.registry,
            resources: &self.resources,
            graph: &*graph,
            bloom: &self.bloom,
            light_proxy: &self.light_proxy,
            ibl_set: self.ibl_set,
            lighting_override: None,
            debug_vertices: None,
        };
        let mut water_env = SubmitEnv {
            lighting_override: None,
            ..env
        };
        let gui_env = SubmitEnv {
            debug_vertices: self.debug_vertices,
            ..env
        };
        let main_frame = FrameContext {
            frame_index: frame,
            image_index,
            command_buffer: cmd,
            camera: main_state.clone(),
            global_set: self.registry.global_set(frame, GlobalSlot::Main),
            extent: self.swapchain.extent(),
        };

        // shadow cascades; clear-only when a cascade has no caster so both
        // maps still end the frame in SHADER_READ_ONLY_OPTIMAL
        for (pass, slot) in [
            (&self.shadow_hi, CascadeSlot::Hi),
            (&self.shadow_lo, CascadeSlot::Lo),
        ] {
            let shadow_frame = FrameContext {
                extent: pass.extent(),
                ..main_frame.clone()
            };
            pass.begin(&self.context, cmd);
            if lights.cascade_active(slot) {
                SubmissionSystem::ShadowCast { cascade: slot }.submit(&env, &shadow_frame, world);
                SubmissionSystem::ShadowSkeletalCast { cascade: slot }
                    .submit(&env, &shadow_frame, world);
            }
            pass.end(&self.context, cmd);
        }

        // water instantiations of the 3D pass, half resolution
        if let Some(height) = water_height {
            for (target, slot, state) in [
                (0usize, GlobalSlot::Refraction, main_state.refraction(height)),
                (1, GlobalSlot::Reflection, main_state.reflection(height)),
            ] {
                water_env.lighting_override = Some(self.registry.water_lighting_set(target));
                let water_frame = FrameContext {
                    camera: state,
                    global_set: self.registry.global_set(frame, slot),
                    extent: self.water.extent(),
                    ..main_frame.clone()
                };
                if target == 0 {
                    self.water.begin_refraction(&self.context, &self.geometry, cmd);
                } else {
                    self.water.begin_reflection(&self.context, &self.geometry, cmd);
                }
                SubmissionSystem::PbrOpaque.submit(&water_env, &water_frame, world);
                SubmissionSystem::PbrSkeletal.submit(&water_env, &water_frame, world);
                SubmissionSystem::Grass {
                    time: self.total_time,
                }
                .submit(&water_env, &water_frame, world);
                SubmissionSystem::CubemapSky.submit(&water_env, &water_frame, world);
                self.geometry.next_subpass(&self.context, cmd);
                SubmissionSystem::DeferredLighting.submit(&water_env, &water_frame, world);
                self.geometry.next_subpass(&self.context, cmd);
                self.geometry.end(&self.context, cmd);
            }
        }

        // main 3D pass: G-buffer, lighting, transparency
        self.geometry.begin(&self.context, cmd);
        SubmissionSystem::PbrOpaque.submit(&env, &main_frame, world);
        SubmissionSystem::PbrSkeletal.submit(&env, &main_frame, world);
        SubmissionSystem::Grass {
            time: self.total_time,
        }
        .submit(&env, &main_frame, world);
        SubmissionSystem::CubemapSky.submit(&env, &main_frame, world);
        self.geometry.next_subpass(&self.context, cmd);
        if features.contains(ShaderFeatures::IBL) {
            SubmissionSystem::IblLighting.submit(&env, &main_frame, world);
        } else {
            SubmissionSystem::DeferredLighting.submit(&env, &main_frame, world);
        }
        self.geometry.next_subpass(&self.context, cmd);
        SubmissionSystem::Sprite3d.submit(&env, &main_frame, world);
        SubmissionSystem::PointLightProxy.submit(&env, &main_frame, world);
        self.geometry.end(&self.context, cmd);

        // bloom pyramid: down the chain, then additively back up
        for mip in 0..self.bloom.levels() {
            self.bloom.begin_down(&self.context, cmd, mip);
            SubmissionSystem::BloomDownsample { mip }.submit(&env, &main_frame, world);
            self.bloom.end(&self.context, cmd);
        }
        for mip in (0..self.bloom.levels().saturating_sub(1)).rev() {
            self.bloom.begin_up(&self.context, cmd, mip);
            SubmissionSystem::BloomUpsample { mip }.submit(&env, &main_frame, world);
            self.bloom.end(&self.context, cmd);
        }

        self.post.begin(&self.context, cmd, image_index);
        SubmissionSystem::PostProcess {
            exposure: self.settings.exposure,
            features,
        }
        .submit(&env, &main_frame, world);
        self.post.end(&self.context, cmd);

        self.gui.begin(&self.context, cmd, image_index);
        SubmissionSystem::SpriteGui.submit(&gui_env, &main_frame, world);
        SubmissionSystem::DebugOverlay.submit(&gui_env, &main_frame, world);
        self.gui.end(&self.context, cmd);

        unsafe {
            self.context
                .device()
                .end_command_buffer(cmd)
                .map_err(VulkanError::Api)?;
        }

        match self
            .swapchain
            .submit_present(&self.context, cmd, image_index)?
        {
            SubmitOutcome::Presented => Ok(()),
            SubmitOutcome::NeedsRecreate => self.recreate(),
        }
    }

    /// Write the shadow and global UBO rings for this frame and return the
    /// gathered light data plus the frame's feature bits
    fn write_frame_ubos(
        &mut self,
        world: &World,
        graph: &SceneGraph,
        camera: &Camera,
        main_state: &CameraState,
        water_height: Option<f32>,
        frame: usize,
    ) -> (FrameLights, ShaderFeatures) {
        let mut lights = FrameLights::default();

        for (_, node, light) in world.view2::<TransformNode, PointLight>() {
            if lights.point_count as usize >= MAX_POINT_LIGHTS {
                break;
            }
            let Some(m) = graph.try_world(node.0) else {
                continue;
            };
            lights.point[lights.point_count as usize] = PointLightGpu {
                position_radius: [m[(0, 3)], m[(1, 3)], m[(2, 3)], light.radius],
                color_intensity: [light.color.x, light.color.y, light.color.z, light.intensity],
            };
            lights.point_count += 1;
        }

        let mut overflow = 0usize;
        for (_, light) in world.view::<DirectionalLight>() {
            if lights.directional_count as usize >= MAX_DIRECTIONAL_LIGHTS {
                overflow += 1;
                continue;
            }
            let slot = match light.cascade {
                ShadowCascade::HiRes => CascadeSlot::Hi,
                ShadowCascade::LoRes => CascadeSlot::Lo,
            };
            let (projection, view) = cascade_matrices(light, camera.target);
            let shadow_ubo = ShadowUbo {
                projection: gpu_mat4(&projection),
                view: gpu_mat4(&view),
            };
            self.registry.write_shadow(frame, slot, &shadow_ubo);

            let direction = light.direction.normalize();
            lights.directional[lights.directional_count as usize] = DirectionalLightGpu::new(
                [direction.x, direction.y, direction.z],
                light.intensity,
                [light.color.x, light.color.y, light.color.z],
                &(projection * view),
                light.cascade.index(),
            );
            lights.active[slot as usize] = true;
            lights.directional_count += 1;
        }
        if overflow > 0 && !self.warned_light_overflow {
            warn!(
                "{overflow} directional light(s) beyond the {MAX_DIRECTIONAL_LIGHTS}-cascade \
                 limit are ignored"
            );
            self.warned_light_overflow = true;
        }

        let mut features = ShaderFeatures::BLOOM;
        if lights.directional_count > 0 {
            features |= ShaderFeatures::SHADOWS;
        }
        if self.settings.use_ibl && self.ibl_set.is_some() {
            features |= ShaderFeatures::IBL;
        }

        self.registry.write_global(
            frame,
            GlobalSlot::Main,
            &global_ubo(main_state, &lights, features),
        );
        if let Some(height) = water_height {
            self.registry.write_global(
                frame,
                GlobalSlot::Refraction,
                &global_ubo(&main_state.refraction(height), &lights, features),
            );
            self.registry.write_global(
                frame,
                GlobalSlot::Reflection,
                &global_ubo(&main_state.reflection(height), &lights, features),
            );
        }
        (lights, features)
    }

    /// Rebuild everything sized by the swap-chain after a resize
    fn recreate(&mut self) -> RenderResult<()> {
        self.context.wait_idle()?;
        self.swapchain.recreate(
            &self.context,
            &self.surface,
            self.swapchain.extent(),
            self.settings.present_mode,
        )?;
        let extent = self.swapchain.extent();

        self.geometry.recreate(&self.context, extent)?;
        self.water.recreate(&self.context, &self.geometry, extent)?;
        self.bloom.free_sets(self.registry.pool())?;
        self.bloom = BloomPyramid::new(
            &self.context,
            self.registry.pool(),
            &self.clamp_sampler,
            extent,
            self.settings.bloom_levels,
            self.geometry.targets().emission.view(),
        )?;
        self.post.recreate(&self.context, &self.swapchain)?;
        self.gui.recreate(&self.context, &self.swapchain)?;

        self.registry.rewrite_attachment_sets(
            &self.context,
            self.geometry.targets(),
            self.bloom.output_view(),
            &self.clamp_sampler,
        );
        self.registry.rewrite_water_lighting(
            &self.context,
            self.water.refraction_targets(),
            self.water.reflection_targets(),
        );
        self.instances.mark_all_dirty();
        debug!("Recreated frame state at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Create a static instance buffer; returns its id for slot allocation
    pub fn create_static_instances(&mut self, capacity: u32) -> RenderResult<u32> {
        let buffer = self.instances.create_buffer(&self.context, capacity)?;
        self.resources.push(ResourceDescriptor::static_instances(
            &self.context,
            self.registry.pool(),
            &self.static_layout,
            &self.instances,
            buffer,
        )?);
        Ok(buffer)
    }

    /// Create a skeletal instance buffer with its bone-palette ring
    pub fn create_skeletal_instances(&mut self, capacity: u32) -> RenderResult<u32> {
        let buffer = self.instances.create_buffer(&self.context, capacity)?;
        self.resources.push(ResourceDescriptor::skeletal_instances(
            &self.context,
            self.registry.pool(),
            &self.skeletal_layout,
            &self.instances,
            buffer,
        )?);
        Ok(buffer)
    }

    /// Create a grass instance buffer over `heightmap`
    pub fn create_grass_instances(
        &mut self,
        capacity: u32,
        heightmap: Texture,
    ) -> RenderResult<u32> {
        let buffer = self.instances.create_buffer(&self.context, capacity)?;
        self.resources.push(ResourceDescriptor::grass_instances(
            &self.context,
            self.registry.pool(),
            &self.grass_layout,
            &self.linear_sampler,
            &self.instances,
            buffer,
            heightmap,
        )?);
        Ok(buffer)
    }

    /// Reserve an instance record in `buffer` for a scene node
    pub fn allocate_instance_slot(
        &mut self,
        buffer: u32,
        material_index: u32,
    ) -> Option<InstanceSlot> {
        self.instances.allocate_slot(buffer, material_index)
    }

    /// Build a PBR material bound to this renderer's layouts and dummies
    pub fn create_pbr_material(
        &self,
        maps: MaterialMaps,
        base_color: [f32; 4],
    ) -> RenderResult<MaterialDescriptor> {
        Ok(MaterialDescriptor::pbr(
            &self.context,
            self.registry.pool(),
            &self.surface_material,
            &self.linear_sampler,
            &self.dummies,
            maps,
            base_color,
        )?)
    }

    /// Build a diffuse material bound to this renderer's layouts and dummies
    pub fn create_diffuse_material(
        &self,
        maps: MaterialMaps,
        base_color: [f32; 4],
    ) -> RenderResult<MaterialDescriptor> {
        Ok(MaterialDescriptor::diffuse(
            &self.context,
            self.registry.pool(),
            &self.surface_material,
            &self.linear_sampler,
            &self.dummies,
            maps,
            base_color,
        )?)
    }

    /// Build a sky cubemap material; `None` binds the black dummy cubemap
    pub fn create_cubemap_material(
        &self,
        environment: Option<Texture>,
    ) -> RenderResult<MaterialDescriptor> {
        Ok(MaterialDescriptor::cubemap(
            &self.context,
            self.registry.pool(),
            &self.cubemap_material,
            &self.linear_sampler,
            &self.dummies,
            environment,
        )?)
    }

    /// Queue a model for destruction once every in-flight frame referencing
    /// it has completed
    pub fn retire_model(&mut self, model: ModelHandle) {
        self.retire_queue.push_back((self.frame_counter, model));
    }

    fn collect_retired(&mut self) {
        while let Some((retired_at, _)) = self.retire_queue.front() {
            if retired_at + MAX_FRAMES_IN_FLIGHT as u64 > self.frame_counter {
                break;
            }
            self.retire_queue.pop_front();
        }
    }

    /// Install the spritesheet and font atlas bound by every global set.
    /// Idles the device since in-flight frames may reference the old images.
    pub fn set_sprite_images(
        &mut self,
        spritesheet: Texture,
        font_atlas: Texture,
    ) -> RenderResult<()> {
        self.context.wait_idle()?;
        self.registry.write_global_images(
            &self.context,
            spritesheet.view(),
            font_atlas.view(),
            &self.linear_sampler,
        );
        self.sprite_images = Some((spritesheet, font_atlas));
        Ok(())
    }

    /// Bind (or clear) the image-based-lighting environment set
    pub fn set_ibl_environment(&mut self, set: Option<vk::DescriptorSet>) {
        self.ibl_set = set;
    }

    /// Layout the IBL environment set must be allocated with
    pub fn ibl_layout(&self) -> &DescriptorSetLayout {
        &self.ibl_layout
    }

    /// Set (or clear) the debug-line vertex buffer drawn in the GUI pass
    pub fn set_debug_vertices(&mut self, vertices: Option<(vk::Buffer, u32)>) {
        self.debug_vertices = vertices;
    }

    /// Device entry point, for asset uploads
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// Pool for one-shot upload command buffers
    pub fn upload_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Current swap-chain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Current swap-chain aspect ratio
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.swapchain.extent();
        extent.width as f32 / extent.height.max(1) as f32
    }

    /// Refraction HDR view, for water-surface materials
    pub fn water_refraction_view(&self) -> vk::ImageView {
        self.water.refraction_view()
    }

    /// Reflection HDR view, for water-surface materials
    pub fn water_reflection_view(&self) -> vk::ImageView {
        self.water.reflection_view()
    }

    /// Block until the device is idle; call before dropping scene resources
    pub fn wait_idle(&self) -> RenderResult<()> {
        Ok(self.context.wait_idle()?)
    }
}

/// Per-frame gathered light data
#[derive(Default)]
struct FrameLights {
    point: [PointLightGpu; MAX_POINT_LIGHTS],
    point_count: u32,
    directional: [DirectionalLightGpu; MAX_DIRECTIONAL_LIGHTS],
    directional_count: u32,
    active: [bool; 2],
}

impl FrameLights {
    fn cascade_active(&self, slot: CascadeSlot) -> bool {
        self.active[slot as usize]
    }
}

fn global_ubo(state: &CameraState, lights: &FrameLights, features: ShaderFeatures) -> GlobalUbo {
    let mut ubo = GlobalUbo::default();
    ubo.projection = gpu_mat4(&state.projection);
    ubo.view = gpu_mat4(&state.view);
    ubo.point_lights = lights.point;
    ubo.point_light_count = lights.point_count;
    ubo.directional_lights = lights.directional;
    ubo.directional_light_count = lights.directional_count;
    ubo.features = features.bits();
    ubo
}

/// Orthographic projection and light-space view for one cascade, centred on
/// the camera's focus point
fn cascade_matrices(light: &DirectionalLight, focus: Vec3) -> (Mat4, Mat4) {
    let (half, depth) = CASCADE_VOLUMES[light.cascade.index() as usize];
    let direction = light.direction.normalize();
    let eye = focus - direction * (depth * 0.5);
    let up = if direction.y.abs() > 0.99 {
        Vec3::new(0.0, 0.0, 1.0)
    } else {
        Vec3::new(0.0, 1.0, 0.0)
    };
    let view = look_at(eye, focus, up);
    let projection = orthographic_vk(-half, half, -half, half, 0.1, depth);
    (projection, view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::foundation::math::Point3;

    fn test_light(cascade: ShadowCascade) -> DirectionalLight {
        DirectionalLight {
            direction: Vec3::new(0.0, -1.0, 0.3),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 2.0,
            cascade,
        }
    }

    #[test]
    fn cascade_focus_lands_at_volume_center() {
        let focus = Vec3::new(4.0, 0.0, -3.0);
        let (_, view) = cascade_matrices(&test_light(ShadowCascade::HiRes), focus);
        let in_light = view.transform_point(&Point3::new(focus.x, focus.y, focus.z));
        // focus projects onto the light axis at half the depth range
        assert_relative_eq!(in_light.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(in_light.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(in_light.z, -100.0, epsilon = 1e-3);
    }

    #[test]
    fn vertical_light_uses_alternate_up() {
        let light = DirectionalLight {
            direction: Vec3::new(0.0, -1.0, 0.0),
            ..test_light(ShadowCascade::LoRes)
        };
        let (projection, view) = cascade_matrices(&light, Vec3::new(0.0, 0.0, 0.0));
        // no NaNs from a degenerate cross product
        assert!(view.iter().all(|v| v.is_finite()));
        assert!(projection.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn retired_models_survive_in_flight_frames() {
        // queue semantics only; entries drop once retire + F <= now
        let mut queue: VecDeque<(u64, ())> = VecDeque::new();
        queue.push_back((10, ()));
        let now = 11u64;
        assert!(queue.front().is_some_and(|(at, _)| at + MAX_FRAMES_IN_FLIGHT as u64 > now));
        let now = 12u64;
        assert!(!queue.front().is_some_and(|(at, _)| at + MAX_FRAMES_IN_FLIGHT as u64 > now));
    }
}
