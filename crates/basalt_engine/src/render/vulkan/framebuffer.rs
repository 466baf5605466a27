//! Framebuffer wrapper with RAII cleanup

use ash::{vk, Device};

use super::context::{VulkanContext, VulkanError, VulkanResult};

/// Owned framebuffer bound to a render pass and a set of attachment views
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments` for `render_pass`
    pub fn new(
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe { context.device().create_framebuffer(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self {
            device: context.raw_device(),
            framebuffer,
            extent,
        })
    }

    /// Framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Framebuffer extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
