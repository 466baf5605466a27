//! Descriptor set layouts, pools and write helpers

use ash::{vk, Device};

use super::context::{VulkanContext, VulkanError, VulkanResult};

/// Builder for a descriptor set layout, one binding at a time
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Uniform buffer binding
    pub fn uniform_buffer(self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stages)
    }

    /// Combined image sampler binding
    pub fn sampled_image(self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            1,
            stages,
        )
    }

    /// Input attachment binding (deferred lighting reads the G-buffer this way)
    pub fn input_attachment(self, binding: u32) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::INPUT_ATTACHMENT,
            1,
            vk::ShaderStageFlags::FRAGMENT,
        )
    }

    /// Storage buffer binding
    pub fn storage_buffer(self, binding: u32, stages: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::STORAGE_BUFFER, 1, stages)
    }

    fn binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stages)
                .build(),
        );
        self
    }

    /// Build the layout object
    pub fn build(self, context: &VulkanContext) -> VulkanResult<DescriptorSetLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);
        let layout = unsafe {
            context
                .device()
                .create_descriptor_set_layout(&create_info, None)
        }
        .map_err(VulkanError::Api)?;
        Ok(DescriptorSetLayout {
            device: context.raw_device(),
            layout,
        })
    }
}

impl Default for DescriptorSetLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned descriptor set layout
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool sized for the renderer's fixed descriptor population
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool with generous per-type capacities
    pub fn new(context: &VulkanContext, max_sets: u32) -> VulkanResult<Self> {
        let sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: max_sets * 4,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: max_sets * 8,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::INPUT_ATTACHMENT,
                descriptor_count: max_sets,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: max_sets * 2,
            },
        ];
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&sizes);
        let pool = unsafe { context.device().create_descriptor_pool(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self {
            device: context.raw_device(),
            pool,
        })
    }

    /// Allocate one set of the given layout
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets =
            unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)?;
        Ok(sets[0])
    }

    /// Allocate `count` sets of the same layout
    pub fn allocate_many(
        &self,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout.handle(); count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Return sets to the pool
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        unsafe { self.device.free_descriptor_sets(self.pool, sets) }.map_err(VulkanError::Api)
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Batched descriptor writes for one set
pub struct DescriptorWriter {
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    image_infos: Vec<vk::DescriptorImageInfo>,
    // (binding, descriptor type, index into the matching info vec)
    writes: Vec<(u32, vk::DescriptorType, usize)>,
}

impl DescriptorWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self {
            buffer_infos: Vec::new(),
            image_infos: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Bind a uniform buffer range
    pub fn uniform_buffer(
        mut self,
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> Self {
        self.buffer_infos.push(vk::DescriptorBufferInfo {
            buffer,
            offset,
            range,
        });
        self.writes.push((
            binding,
            vk::DescriptorType::UNIFORM_BUFFER,
            self.buffer_infos.len() - 1,
        ));
        self
    }

    /// Bind a storage buffer range
    pub fn storage_buffer(
        mut self,
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> Self {
        self.buffer_infos.push(vk::DescriptorBufferInfo {
            buffer,
            offset,
            range,
        });
        self.writes.push((
            binding,
            vk::DescriptorType::STORAGE_BUFFER,
            self.buffer_infos.len() - 1,
        ));
        self
    }

    /// Bind a sampled image in shader-read layout
    pub fn sampled_image(mut self, binding: u32, view: vk::ImageView, sampler: vk::Sampler) -> Self {
        self.image_infos.push(vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        });
        self.writes.push((
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            self.image_infos.len() - 1,
        ));
        self
    }

    /// Bind an input attachment view
    pub fn input_attachment(mut self, binding: u32, view: vk::ImageView) -> Self {
        self.image_infos.push(vk::DescriptorImageInfo {
            sampler: vk::Sampler::null(),
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        });
        self.writes.push((
            binding,
            vk::DescriptorType::INPUT_ATTACHMENT,
            self.image_infos.len() - 1,
        ));
        self
    }

    /// Flush all queued writes to `set`
    pub fn write(self, context: &VulkanContext, set: vk::DescriptorSet) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|&(binding, ty, index)| {
                let mut write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_type(ty);
                write = match ty {
                    vk::DescriptorType::UNIFORM_BUFFER | vk::DescriptorType::STORAGE_BUFFER => {
                        write.buffer_info(std::slice::from_ref(&self.buffer_infos[index]))
                    }
                    _ => write.image_info(std::slice::from_ref(&self.image_infos[index])),
                };
                write.build()
            })
            .collect();
        unsafe {
            context.device().update_descriptor_sets(&writes, &[]);
        }
    }
}

impl Default for DescriptorWriter {
    fn default() -> Self {
        Self::new()
    }
}
