//! Post-process pass: tonemap HDR + bloom into the swap-chain image

use ash::vk;

use crate::render::vulkan::{Framebuffer, Swapchain, VulkanContext, VulkanResult};

use super::{begin_pass, RenderPass};

/// Fullscreen tonemap pass targeting the swap-chain
pub struct PostPass {
    render_pass: RenderPass,
    framebuffers: Vec<Framebuffer>,
    extent: vk::Extent2D,
}

impl PostPass {
    /// Build the pass and one framebuffer per swap-chain image
    pub fn new(context: &VulkanContext, swapchain: &Swapchain) -> VulkanResult<Self> {
        let attachment = vk::AttachmentDescription::builder()
            .format(swapchain.format().format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            // the GUI pass draws over the image next
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let color_ref = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_ref)
            .build();
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        };

        let attachments = [attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];
        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        let render_pass = RenderPass::new(context, &create_info)?;

        let framebuffers = build_framebuffers(context, render_pass.handle(), swapchain)?;
        Ok(Self {
            render_pass,
            framebuffers,
            extent: swapchain.extent(),
        })
    }

    /// Rebuild the swap-chain framebuffers after a recreate
    pub fn recreate(&mut self, context: &VulkanContext, swapchain: &Swapchain) -> VulkanResult<()> {
        self.framebuffers = build_framebuffers(context, self.render_pass.handle(), swapchain)?;
        self.extent = swapchain.extent();
        Ok(())
    }

    /// Render pass handle
    pub fn pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Current extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Begin the pass over swap-chain image `image_index`
    pub fn begin(&self, context: &VulkanContext, cmd: vk::CommandBuffer, image_index: u32) {
        begin_pass(
            context.device(),
            cmd,
            self.render_pass.handle(),
            self.framebuffers[image_index as usize].handle(),
            self.extent,
            &[],
        );
    }

    /// End the pass
    pub fn end(&self, context: &VulkanContext, cmd: vk::CommandBuffer) {
        unsafe {
            context.device().cmd_end_render_pass(cmd);
        }
    }
}

fn build_framebuffers(
    context: &VulkanContext,
    pass: vk::RenderPass,
    swapchain: &Swapchain,
) -> VulkanResult<Vec<Framebuffer>> {
    swapchain
        .views()
        .iter()
        .map(|&view| Framebuffer::new(context, pass, &[view], swapchain.extent()))
        .collect()
}
