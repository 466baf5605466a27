//! Shadow cascade pass: depth-only into a sampled shadow map
//!
//! Two instances exist per renderer, hi-res and lo-res. The map always runs,
//! clear-only when no directional light uses the cascade, so it ends every
//! frame in a defined `SHADER_READ_ONLY_OPTIMAL` state.

use ash::vk;

use crate::render::vulkan::{
    AttachmentImage, Framebuffer, VulkanContext, VulkanResult,
};

use super::{begin_pass, RenderPass, SHADOW_DEPTH_FORMAT};

/// Depth-only cascade pass with its fixed-size map and framebuffer
pub struct ShadowPass {
    render_pass: RenderPass,
    depth: AttachmentImage,
    framebuffer: Framebuffer,
    extent: vk::Extent2D,
}

impl ShadowPass {
    /// Create a cascade pass with a square map of `size` texels
    pub fn new(context: &VulkanContext, size: u32) -> VulkanResult<Self> {
        let attachment = vk::AttachmentDescription::builder()
            .format(SHADOW_DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .build();

        let depth_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .depth_stencil_attachment(&depth_ref)
            .build();

        // the lighting subpass samples the map, so order depth writes
        // before fragment reads of the following passes
        let dependency = vk::SubpassDependency {
            src_subpass: 0,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access_mask: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::SHADER_READ,
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

        let extent = vk::Extent2D {
            width: size,
            height: size,
        };
        let depth = AttachmentImage::new(
            context,
            extent,
            SHADOW_DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::DEPTH,
        )?;
        let framebuffer =
            Framebuffer::new(context, render_pass.handle(), &[depth.view()], extent)?;

        Ok(Self {
            render_pass,
            depth,
            framebuffer,
            extent,
        })
    }

    /// Render pass handle (pipelines target this)
    pub fn pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Shadow map view for the lighting descriptor
    pub fn map_view(&self) -> vk::ImageView {
        self.depth.view()
    }

    /// Map extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Begin the pass, clearing depth to the far plane
    pub fn begin(&self, context: &VulkanContext, cmd: vk::CommandBuffer) {
        let clear = [vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        }];
        begin_pass(
            context.device(),
            cmd,
            self.render_pass.handle(),
            self.framebuffer.handle(),
            self.extent,
            &clear,
        );
    }

    /// End the pass
    pub fn end(&self, context: &VulkanContext, cmd: vk::CommandBuffer) {
        unsafe {
            context.device().cmd_end_render_pass(cmd);
        }
    }
}
