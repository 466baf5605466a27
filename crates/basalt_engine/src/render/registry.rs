//! Per-frame descriptor registry
//!
//! Owns the descriptor pool, the set layouts shared across pipelines, the
//! persistently mapped UBO rings and the per-frame sets: global (camera UBO
//! plus the spritesheet and font-atlas images, one slot each for the main,
//! refraction and reflection cameras), the two shadow cascades, the
//! shadow-map set (both map views and both cascade UBOs), the lighting
//! input-attachment set and the post-process set. Attachment-referencing
//! sets are rewritten wholesale on swap-chain recreation, after the device
//! idles.

use ash::vk;

use super::passes::GeometryTargets;
use super::ubo::{GlobalUbo, ShadowUbo};
use super::vulkan::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorWriter,
    MappedBuffer, Sampler, VulkanContext, VulkanResult, MAX_FRAMES_IN_FLIGHT,
};

/// Which camera a global set serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalSlot {
    /// The scene camera
    Main = 0,
    /// Water refraction camera (clipped)
    Refraction = 1,
    /// Water reflection camera (mirrored and clipped)
    Reflection = 2,
}

const GLOBAL_SLOTS: usize = 3;

/// Which shadow cascade a write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeSlot {
    /// 2048² near cascade
    Hi = 0,
    /// 1024² far cascade
    Lo = 1,
}

/// Descriptor pool, layouts, UBO rings and per-frame sets
pub struct DescriptorRegistry {
    pool: DescriptorPool,
    global_layout: DescriptorSetLayout,
    shadow_layout: DescriptorSetLayout,
    shadow_map_layout: DescriptorSetLayout,
    lighting_layout: DescriptorSetLayout,
    post_layout: DescriptorSetLayout,

    // rings: outer index frame slot, inner index GlobalSlot
    global_ubos: Vec<Vec<MappedBuffer>>,
    global_sets: Vec<Vec<vk::DescriptorSet>>,
    shadow_ubos: Vec<[MappedBuffer; 2]>,
    shadow_sets: Vec<[vk::DescriptorSet; 2]>,
    // per frame slot: both map views plus that slot's cascade UBOs
    shadow_map_sets: Vec<vk::DescriptorSet>,
    lighting_sets: Vec<vk::DescriptorSet>,
    // [refraction, reflection]; their framebuffers carry private G-buffers
    water_lighting_sets: [vk::DescriptorSet; 2],
    post_sets: Vec<vk::DescriptorSet>,
}

impl DescriptorRegistry {
    /// Build layouts, pool, rings and all static sets
    pub fn new(
        context: &VulkanContext,
        shadow_hi: vk::ImageView,
        shadow_lo: vk::ImageView,
        shadow_sampler: &Sampler,
    ) -> VulkanResult<Self> {
        let pool = DescriptorPool::new(context, 256)?;

        let global_layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(
                0,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )
            .sampled_image(1, vk::ShaderStageFlags::FRAGMENT)
            .sampled_image(2, vk::ShaderStageFlags::FRAGMENT)
            .build(context)?;
        let shadow_layout = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(context)?;
        let shadow_map_layout = DescriptorSetLayoutBuilder::new()
            .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
            .sampled_image(1, vk::ShaderStageFlags::FRAGMENT)
            .uniform_buffer(2, vk::ShaderStageFlags::FRAGMENT)
            .uniform_buffer(3, vk::ShaderStageFlags::FRAGMENT)
            .build(context)?;
        let lighting_layout = DescriptorSetLayoutBuilder::new()
            .input_attachment(0)
            .input_attachment(1)
            .input_attachment(2)
            .input_attachment(3)
            .input_attachment(4)
            .build(context)?;
        let post_layout = DescriptorSetLayoutBuilder::new()
            .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
            .sampled_image(1, vk::ShaderStageFlags::FRAGMENT)
            .build(context)?;

        let global_size = std::mem::size_of::<GlobalUbo>() as vk::DeviceSize;
        let shadow_size = std::mem::size_of::<ShadowUbo>() as vk::DeviceSize;

        let mut global_ubos = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut global_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut shadow_ubos = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut shadow_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut shadow_map_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let mut slots = Vec::with_capacity(GLOBAL_SLOTS);
            let mut sets = Vec::with_capacity(GLOBAL_SLOTS);
            for _ in 0..GLOBAL_SLOTS {
                let ubo = MappedBuffer::new(
                    context,
                    global_size,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                )?;
                let set = pool.allocate(&global_layout)?;
                DescriptorWriter::new()
                    .uniform_buffer(0, ubo.handle(), 0, global_size)
                    .write(context, set);
                slots.push(ubo);
                sets.push(set);
            }
            global_ubos.push(slots);
            global_sets.push(sets);

            let hi = MappedBuffer::new(context, shadow_size, vk::BufferUsageFlags::UNIFORM_BUFFER)?;
            let lo = MappedBuffer::new(context, shadow_size, vk::BufferUsageFlags::UNIFORM_BUFFER)?;
            let hi_set = pool.allocate(&shadow_layout)?;
            let lo_set = pool.allocate(&shadow_layout)?;
            DescriptorWriter::new()
                .uniform_buffer(0, hi.handle(), 0, shadow_size)
                .write(context, hi_set);
            DescriptorWriter::new()
                .uniform_buffer(0, lo.handle(), 0, shadow_size)
                .write(context, lo_set);

            // the map views are fixed-size; only the cascade UBOs rotate
            let map_set = pool.allocate(&shadow_map_layout)?;
            DescriptorWriter::new()
                .sampled_image(0, shadow_hi, shadow_sampler.handle())
                .sampled_image(1, shadow_lo, shadow_sampler.handle())
                .uniform_buffer(2, hi.handle(), 0, shadow_size)
                .uniform_buffer(3, lo.handle(), 0, shadow_size)
                .write(context, map_set);
            shadow_map_sets.push(map_set);

            shadow_ubos.push([hi, lo]);
            shadow_sets.push([hi_set, lo_set]);
        }

        let lighting_sets = pool.allocate_many(&lighting_layout, MAX_FRAMES_IN_FLIGHT)?;
        let water_lighting_sets = [
            pool.allocate(&lighting_layout)?,
            pool.allocate(&lighting_layout)?,
        ];
        let post_sets = pool.allocate_many(&post_layout, MAX_FRAMES_IN_FLIGHT)?;

        Ok(Self {
            pool,
            global_layout,
            shadow_layout,
            shadow_map_layout,
            lighting_layout,
            post_layout,
            global_ubos,
            global_sets,
            shadow_ubos,
            shadow_sets,
            shadow_map_sets,
            lighting_sets,
            water_lighting_sets,
            post_sets,
        })
    }

    /// Write the spritesheet and font-atlas bindings of every global set;
    /// caller must have idled the device first
    pub fn write_global_images(
        &mut self,
        context: &VulkanContext,
        spritesheet: vk::ImageView,
        font_atlas: vk::ImageView,
        sampler: &Sampler,
    ) {
        for sets in &self.global_sets {
            for set in sets {
                DescriptorWriter::new()
                    .sampled_image(1, spritesheet, sampler.handle())
                    .sampled_image(2, font_atlas, sampler.handle())
                    .write(context, *set);
            }
        }
    }

    /// Rewrite the attachment-referencing sets; caller must have idled the
    /// device first
    pub fn rewrite_attachment_sets(
        &mut self,
        context: &VulkanContext,
        targets: &GeometryTargets,
        bloom_output: vk::ImageView,
        clamp_sampler: &Sampler,
    ) {
        for frame in 0..MAX_FRAMES_IN_FLIGHT {
            DescriptorWriter::new()
                .input_attachment(0, targets.position.view())
                .input_attachment(1, targets.normal.view())
                .input_attachment(2, targets.albedo.view())
                .input_attachment(3, targets.material.view())
                .input_attachment(4, targets.emission.view())
                .write(context, self.lighting_sets[frame]);
            DescriptorWriter::new()
                .sampled_image(0, targets.hdr.view(), clamp_sampler.handle())
                .sampled_image(1, bloom_output, clamp_sampler.handle())
                .write(context, self.post_sets[frame]);
        }
    }

    /// Rewrite the water lighting sets against fresh half-resolution targets
    pub fn rewrite_water_lighting(
        &mut self,
        context: &VulkanContext,
        refraction: &GeometryTargets,
        reflection: &GeometryTargets,
    ) {
        for (set, targets) in self
            .water_lighting_sets
            .iter()
            .zip([refraction, reflection])
        {
            DescriptorWriter::new()
                .input_attachment(0, targets.position.view())
                .input_attachment(1, targets.normal.view())
                .input_attachment(2, targets.albedo.view())
                .input_attachment(3, targets.material.view())
                .input_attachment(4, targets.emission.view())
                .write(context, *set);
        }
    }

    /// Lighting set of one water target: 0 refraction, 1 reflection
    pub fn water_lighting_set(&self, target: usize) -> vk::DescriptorSet {
        self.water_lighting_sets[target]
    }

    /// Write one camera's globals for frame slot `frame`
    pub fn write_global(&self, frame: usize, slot: GlobalSlot, ubo: &GlobalUbo) {
        self.global_ubos[frame][slot as usize].write(0, ubo);
    }

    /// Write one cascade's matrices for frame slot `frame`
    pub fn write_shadow(&self, frame: usize, cascade: CascadeSlot, ubo: &ShadowUbo) {
        self.shadow_ubos[frame][cascade as usize].write(0, ubo);
    }

    /// Global set for one camera and frame slot
    pub fn global_set(&self, frame: usize, slot: GlobalSlot) -> vk::DescriptorSet {
        self.global_sets[frame][slot as usize]
    }

    /// Cascade UBO set for a shadow pass
    pub fn shadow_set(&self, frame: usize, cascade: CascadeSlot) -> vk::DescriptorSet {
        self.shadow_sets[frame][cascade as usize]
    }

    /// Set binding both shadow maps and cascade UBOs for the lighting subpass
    pub fn shadow_map_set(&self, frame: usize) -> vk::DescriptorSet {
        self.shadow_map_sets[frame]
    }

    /// Lighting input-attachment set for frame slot `frame`
    pub fn lighting_set(&self, frame: usize) -> vk::DescriptorSet {
        self.lighting_sets[frame]
    }

    /// Post-process sampling set for frame slot `frame`
    pub fn post_set(&self, frame: usize) -> vk::DescriptorSet {
        self.post_sets[frame]
    }

    /// The shared descriptor pool (materials and resources allocate here)
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Layout of the global sets
    pub fn global_layout(&self) -> &DescriptorSetLayout {
        &self.global_layout
    }

    /// Layout of the cascade UBO sets
    pub fn shadow_layout(&self) -> &DescriptorSetLayout {
        &self.shadow_layout
    }

    /// Layout of the shadow-map sampler set
    pub fn shadow_map_layout(&self) -> &DescriptorSetLayout {
        &self.shadow_map_layout
    }

    /// Layout of the lighting input-attachment set
    pub fn lighting_layout(&self) -> &DescriptorSetLayout {
        &self.lighting_layout
    }

    /// Layout of the post-process set
    pub fn post_layout(&self) -> &DescriptorSetLayout {
        &self.post_layout
    }
}
