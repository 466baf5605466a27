//! Images, image views, samplers and textures
//!
//! [`AttachmentImage`] backs render targets (G-buffer planes, shadow maps,
//! water targets, bloom mips); [`Texture`] is a sampled image uploaded from
//! CPU pixels through a staging buffer. Both own their memory and views.

use ash::{vk, Device};

use super::buffer::Buffer;
use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanResult};

fn create_image(
    context: &VulkanContext,
    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    mip_levels: u32,
    array_layers: u32,
    flags: vk::ImageCreateFlags,
) -> VulkanResult<(vk::Image, vk::DeviceMemory)> {
    let device = context.device();
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(mip_levels)
        .array_layers(array_layers)
        .format(format)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(usage)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .flags(flags);
    let image = unsafe { device.create_image(&image_info, None) }.map_err(VulkanError::Api)?;

    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let memory_type = context.find_memory_type(
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    let memory =
        unsafe { device.allocate_memory(&alloc_info, None) }.map_err(VulkanError::Api)?;
    unsafe { device.bind_image_memory(image, memory, 0) }.map_err(VulkanError::Api)?;
    Ok((image, memory))
}

fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    view_type: vk::ImageViewType,
    base_mip: u32,
    mip_count: u32,
    layer_count: u32,
) -> VulkanResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: base_mip,
            level_count: mip_count,
            base_array_layer: 0,
            layer_count,
        });
    unsafe { device.create_image_view(&view_info, None) }.map_err(VulkanError::Api)
}

/// Offscreen render target image (colour or depth) with one view per mip
pub struct AttachmentImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    /// View over all mips (for sampling the full chain)
    view: vk::ImageView,
    /// One render-target view per mip level
    mip_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
    aspect: vk::ImageAspectFlags,
}

impl AttachmentImage {
    /// Create a single-mip colour or depth attachment
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        Self::with_mips(context, extent, format, usage, aspect, 1)
    }

    /// Create an attachment with a mip chain (bloom pyramid)
    pub fn with_mips(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> VulkanResult<Self> {
        let (image, memory) = create_image(
            context,
            extent,
            format,
            usage,
            mip_levels,
            1,
            vk::ImageCreateFlags::empty(),
        )?;
        let device = context.raw_device();
        let view = create_view(
            &device,
            image,
            format,
            aspect,
            vk::ImageViewType::TYPE_2D,
            0,
            mip_levels,
            1,
        )?;
        let mut mip_views = Vec::with_capacity(mip_levels as usize);
        for mip in 0..mip_levels {
            mip_views.push(create_view(
                &device,
                image,
                format,
                aspect,
                vk::ImageViewType::TYPE_2D,
                mip,
                1,
                1,
            )?);
        }
        Ok(Self {
            device,
            image,
            memory,
            view,
            mip_views,
            format,
            extent,
            aspect,
        })
    }

    /// Image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// View over the whole mip chain
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// View over a single mip level
    pub fn mip_view(&self, mip: u32) -> vk::ImageView {
        self.mip_views[mip as usize]
    }

    /// Number of mip levels
    pub fn mip_count(&self) -> u32 {
        self.mip_views.len() as u32
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Mip-0 extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Extent of a given mip level (floored, clamped to 1)
    pub fn mip_extent(&self, mip: u32) -> vk::Extent2D {
        mip_extent(self.extent, mip)
    }

    /// Aspect flags of the image
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        unsafe {
            for view in &self.mip_views {
                self.device.destroy_image_view(*view, None);
            }
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Compute the extent of mip level `mip` for a base extent
pub fn mip_extent(base: vk::Extent2D, mip: u32) -> vk::Extent2D {
    vk::Extent2D {
        width: (base.width >> mip).max(1),
        height: (base.height >> mip).max(1),
    }
}

/// Texture sampler with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear filtering with repeat addressing; anisotropy off
    pub fn linear(context: &VulkanContext) -> VulkanResult<Self> {
        Self::create(context, vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT, false)
    }

    /// Linear filtering clamped to edge, for attachment sampling
    pub fn clamped(context: &VulkanContext) -> VulkanResult<Self> {
        Self::create(
            context,
            vk::Filter::LINEAR,
            vk::SamplerAddressMode::CLAMP_TO_EDGE,
            false,
        )
    }

    /// Shadow-map sampler: linear, clamp-to-border with white border so
    /// fragments outside the cascade frustum read as unshadowed
    pub fn shadow(context: &VulkanContext) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST);
        let sampler = unsafe { context.device().create_sampler(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self {
            device: context.raw_device(),
            sampler,
        })
    }

    fn create(
        context: &VulkanContext,
        filter: vk::Filter,
        address_mode: vk::SamplerAddressMode,
        anisotropy: bool,
    ) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(filter)
            .min_filter(filter)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { 16.0 } else { 1.0 })
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .max_lod(vk::LOD_CLAMP_NONE);
        let sampler = unsafe { context.device().create_sampler(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self {
            device: context.raw_device(),
            sampler,
        })
    }

    /// Sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Sampled texture uploaded from CPU pixel data
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl Texture {
    /// Upload RGBA8 pixels into a shader-readable 2D texture
    pub fn from_rgba8(
        context: &VulkanContext,
        pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self::upload(
            context,
            pool,
            vk::Extent2D { width, height },
            vk::Format::R8G8B8A8_UNORM,
            pixels,
            1,
            vk::ImageViewType::TYPE_2D,
        )
    }

    /// Upload six RGBA8 faces (+X, -X, +Y, -Y, +Z, -Z) into a cubemap
    pub fn cubemap_from_rgba8(
        context: &VulkanContext,
        pool: &CommandPool,
        face_size: u32,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        debug_assert_eq!(pixels.len(), (face_size * face_size * 4 * 6) as usize);
        Self::upload(
            context,
            pool,
            vk::Extent2D {
                width: face_size,
                height: face_size,
            },
            vk::Format::R8G8B8A8_UNORM,
            pixels,
            6,
            vk::ImageViewType::CUBE,
        )
    }

    /// 1x1 opaque white; the bind-anything fallback for missing albedo,
    /// roughness/metallic and emission maps
    pub fn dummy_white(context: &VulkanContext, pool: &CommandPool) -> VulkanResult<Self> {
        Self::from_rgba8(context, pool, 1, 1, &[255, 255, 255, 255])
    }

    /// 1x1 black pixel for missing emission maps
    pub fn dummy_black(context: &VulkanContext, pool: &CommandPool) -> VulkanResult<Self> {
        Self::from_rgba8(context, pool, 1, 1, &[0, 0, 0, 255])
    }

    /// 1x1 flat tangent-space normal for missing normal maps
    pub fn dummy_normal(context: &VulkanContext, pool: &CommandPool) -> VulkanResult<Self> {
        Self::from_rgba8(context, pool, 1, 1, &[128, 128, 255, 255])
    }

    /// 1x1 roughness/metallic/occlusion fallback: rough, non-metallic, unoccluded
    pub fn dummy_material(context: &VulkanContext, pool: &CommandPool) -> VulkanResult<Self> {
        Self::from_rgba8(context, pool, 1, 1, &[230, 0, 255, 255])
    }

    /// 1x1 black cubemap for scenes without an environment
    pub fn dummy_cubemap(context: &VulkanContext, pool: &CommandPool) -> VulkanResult<Self> {
        Self::cubemap_from_rgba8(context, pool, 1, &[0u8; 24])
    }

    fn upload(
        context: &VulkanContext,
        pool: &CommandPool,
        extent: vk::Extent2D,
        format: vk::Format,
        pixels: &[u8],
        layers: u32,
        view_type: vk::ImageViewType,
    ) -> VulkanResult<Self> {
        let flags = if view_type == vk::ImageViewType::CUBE {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };
        let (image, memory) = create_image(
            context,
            extent,
            format,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            1,
            layers,
            flags,
        )?;

        let staging = Buffer::new(
            context,
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_data(pixels)?;

        pool.one_time_submit(context, |device, cmd| {
            let range = vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: layers,
            };
            transition_layout(
                device,
                cmd,
                image,
                range,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );
            let region = vk::BufferImageCopy::builder()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: layers,
                })
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .build();
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.handle(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            transition_layout(
                device,
                cmd,
                image,
                range,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        })?;

        let device = context.raw_device();
        let view = create_view(
            &device,
            image,
            format,
            vk::ImageAspectFlags::COLOR,
            view_type,
            0,
            1,
            layers,
        )?;
        Ok(Self {
            device,
            image,
            memory,
            view,
        })
    }

    /// Shader-readable view
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn transition_layout(
    device: &Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let (src_access, src_stage) = match old_layout {
        vk::ImageLayout::UNDEFINED => (
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TOP_OF_PIPE,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        _ => (
            vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    };
    let (dst_access, dst_stage) = match new_layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        _ => (
            vk::AccessFlags::MEMORY_READ,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    };
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extent_halves_and_clamps() {
        let base = vk::Extent2D {
            width: 960,
            height: 540,
        };
        assert_eq!(mip_extent(base, 1).width, 480);
        assert_eq!(mip_extent(base, 1).height, 270);
        assert_eq!(mip_extent(base, 10).width, 1);
        assert_eq!(mip_extent(base, 10).height, 1);
    }
}
