//! Bloom mip pyramid: progressive downsample, additive tent upsample
//!
//! The pyramid is one half-resolution HDR image with `levels` mips. The
//! downsample chain renders mip i from mip i-1 (mip 0 from the scene's
//! emission attachment) with a 13-tap filter; the upsample chain walks back
//! up, adding a 3x3 tent of mip i+1 onto mip i. Post-process samples mip 0.

use ash::vk;

use crate::render::vulkan::{
    AttachmentImage, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter, Framebuffer, Sampler, VulkanContext, VulkanResult,
};

use super::{begin_pass, RenderPass, HDR_FORMAT};

/// Largest mip count that keeps every mip at least one texel
pub fn clamp_levels(base: vk::Extent2D, requested: u32) -> u32 {
    let limit = 32 - base.width.min(base.height).max(1).leading_zeros();
    requested.clamp(1, limit)
}

/// The bloom pyramid with both pass objects and per-mip machinery
pub struct BloomPyramid {
    image: AttachmentImage,
    down_pass: RenderPass,
    up_pass: RenderPass,
    framebuffers: Vec<Framebuffer>,
    sample_layout: DescriptorSetLayout,
    /// `mip_sets[i]` samples mip i
    mip_sets: Vec<vk::DescriptorSet>,
    /// Samples the full-resolution emission attachment (downsample source 0)
    scene_set: vk::DescriptorSet,
    base_extent: vk::Extent2D,
}

impl BloomPyramid {
    /// Build the pyramid for a swap-chain of `swapchain_extent`
    pub fn new(
        context: &VulkanContext,
        pool: &DescriptorPool,
        sampler: &Sampler,
        swapchain_extent: vk::Extent2D,
        requested_levels: u32,
        scene_emission: vk::ImageView,
    ) -> VulkanResult<Self> {
        let base_extent = vk::Extent2D {
            width: (swapchain_extent.width / 2).max(1),
            height: (swapchain_extent.height / 2).max(1),
        };
        let levels = clamp_levels(base_extent, requested_levels);

        let image = AttachmentImage::with_mips(
            context,
            base_extent,
            HDR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
            levels,
        )?;
        let down_pass = create_pass(context, vk::AttachmentLoadOp::DONT_CARE)?;
        let up_pass = create_pass(context, vk::AttachmentLoadOp::LOAD)?;

        let mut framebuffers = Vec::with_capacity(levels as usize);
        for mip in 0..levels {
            framebuffers.push(Framebuffer::new(
                context,
                down_pass.handle(),
                &[image.mip_view(mip)],
                image.mip_extent(mip),
            )?);
        }

        let sample_layout = DescriptorSetLayoutBuilder::new()
            .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
            .build(context)?;
        let mut mip_sets = Vec::with_capacity(levels as usize);
        for mip in 0..levels {
            let set = pool.allocate(&sample_layout)?;
            DescriptorWriter::new()
                .sampled_image(0, image.mip_view(mip), sampler.handle())
                .write(context, set);
            mip_sets.push(set);
        }
        let scene_set = pool.allocate(&sample_layout)?;
        DescriptorWriter::new()
            .sampled_image(0, scene_emission, sampler.handle())
            .write(context, scene_set);

        Ok(Self {
            image,
            down_pass,
            up_pass,
            framebuffers,
            sample_layout,
            mip_sets,
            scene_set,
            base_extent,
        })
    }

    /// Number of mips in the pyramid
    pub fn levels(&self) -> u32 {
        self.image.mip_count()
    }

    /// Downsample pass handle (pipelines target this)
    pub fn down_pass(&self) -> vk::RenderPass {
        self.down_pass.handle()
    }

    /// Upsample pass handle
    pub fn up_pass(&self) -> vk::RenderPass {
        self.up_pass.handle()
    }

    /// Layout of the sampling sets
    pub fn sample_layout(&self) -> &DescriptorSetLayout {
        &self.sample_layout
    }

    /// Set sampling mip `mip`
    pub fn mip_set(&self, mip: u32) -> vk::DescriptorSet {
        self.mip_sets[mip as usize]
    }

    /// Set sampling the scene's emission attachment
    pub fn scene_set(&self) -> vk::DescriptorSet {
        self.scene_set
    }

    /// Extent of mip `mip`
    pub fn mip_extent(&self, mip: u32) -> vk::Extent2D {
        self.image.mip_extent(mip)
    }

    /// Mip 0 view for the post-process descriptor
    pub fn output_view(&self) -> vk::ImageView {
        self.image.mip_view(0)
    }

    /// Begin the downsample pass writing into mip `mip`
    pub fn begin_down(&self, context: &VulkanContext, cmd: vk::CommandBuffer, mip: u32) {
        begin_pass(
            context.device(),
            cmd,
            self.down_pass.handle(),
            self.framebuffers[mip as usize].handle(),
            self.image.mip_extent(mip),
            &[],
        );
    }

    /// Begin the upsample pass accumulating into mip `mip`
    pub fn begin_up(&self, context: &VulkanContext, cmd: vk::CommandBuffer, mip: u32) {
        begin_pass(
            context.device(),
            cmd,
            self.up_pass.handle(),
            self.framebuffers[mip as usize].handle(),
            self.image.mip_extent(mip),
            &[],
        );
    }

    /// End the current bloom pass
    pub fn end(&self, context: &VulkanContext, cmd: vk::CommandBuffer) {
        unsafe {
            context.device().cmd_end_render_pass(cmd);
        }
    }

    /// Base (mip 0) extent
    pub fn base_extent(&self) -> vk::Extent2D {
        self.base_extent
    }

    /// Return this pyramid's sampling sets to `pool` before rebuilding it
    pub fn free_sets(&mut self, pool: &DescriptorPool) -> VulkanResult<()> {
        let mut sets = std::mem::take(&mut self.mip_sets);
        sets.push(self.scene_set);
        pool.free(&sets)
    }
}

fn create_pass(context: &VulkanContext, load_op: vk::AttachmentLoadOp) -> VulkanResult<RenderPass> {
    let initial_layout = if load_op == vk::AttachmentLoadOp::LOAD {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    } else {
        vk::ImageLayout::UNDEFINED
    };
    let attachment = vk::AttachmentDescription::builder()
        .format(HDR_FORMAT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(load_op)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(initial_layout)
        .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .build();

    let color_ref = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_ref)
        .build();

    // chained blits: the previous level's fragment reads must finish before
    // this level's colour writes, and vice versa on the way out
    let dependencies = [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::SHADER_READ,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::COLOR_ATTACHMENT_READ,
            dependency_flags: vk::DependencyFlags::empty(),
        },
        vk::SubpassDependency {
            src_subpass: 0,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::SHADER_READ,
            dependency_flags: vk::DependencyFlags::empty(),
        },
    ];

    let attachments = [attachment];
    let subpasses = [subpass];
    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    RenderPass::new(context, &create_info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::mip_extent;

    #[test]
    fn levels_clamp_to_smallest_dimension() {
        let base = vk::Extent2D {
            width: 960,
            height: 540,
        };
        // 540 supports mips down to 1 texel: 540, 270, 135, 67, 33, 16, 8, 4, 2, 1
        assert_eq!(clamp_levels(base, 6), 6);
        assert_eq!(clamp_levels(base, 64), 10);
        assert_eq!(
            clamp_levels(
                vk::Extent2D {
                    width: 4,
                    height: 4
                },
                6
            ),
            3
        );
    }

    #[test]
    fn mip_chain_extents_halve() {
        let base = vk::Extent2D {
            width: 960,
            height: 540,
        };
        let extents: Vec<(u32, u32)> = (0..6)
            .map(|m| {
                let e = mip_extent(base, m);
                (e.width, e.height)
            })
            .collect();
        assert_eq!(
            extents,
            vec![
                (960, 540),
                (480, 270),
                (240, 135),
                (120, 67),
                (60, 33),
                (30, 16)
            ]
        );
    }
}
