//! The fixed render-pass graph
//!
//! Execution order each frame: shadow hi → shadow lo → water refraction →
//! water reflection → 3D (G-buffer / lighting / transparency subpasses) →
//! bloom pyramid → post-process → GUI. Pass objects are immutable after
//! creation; only framebuffers and their attachment images are rebuilt when
//! the swap-chain recreates.

pub mod bloom;
pub mod geometry;
pub mod gui;
pub mod post;
pub mod shadow;
pub mod water;

pub use bloom::BloomPyramid;
pub use geometry::{GeometryPass, GeometryTargets};
pub use gui::GuiPass;
pub use post::PostPass;
pub use shadow::ShadowPass;
pub use water::WaterPass;

use ash::{vk, Device};

use super::vulkan::{VulkanContext, VulkanError, VulkanResult};

/// G-buffer plane format (position, normal, material, emission)
pub const GBUFFER_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
/// Albedo plane format
pub const ALBEDO_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
/// HDR scene colour format
pub const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
/// Shadow map depth format
pub const SHADOW_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Owned `vk::RenderPass` with RAII cleanup
pub struct RenderPass {
    device: Device,
    pass: vk::RenderPass,
}

impl RenderPass {
    /// Wrap a create-info into an owned pass
    pub fn new(
        context: &VulkanContext,
        create_info: &vk::RenderPassCreateInfo,
    ) -> VulkanResult<Self> {
        let pass = unsafe { context.device().create_render_pass(create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self {
            device: context.raw_device(),
            pass,
        })
    }

    /// Render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.pass, None);
        }
    }
}

/// Record `vkCmdBeginRenderPass` with an inline subpass
pub(crate) fn begin_pass(
    device: &Device,
    cmd: vk::CommandBuffer,
    pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    clear_values: &[vk::ClearValue],
) {
    let begin_info = vk::RenderPassBeginInfo::builder()
        .render_pass(pass)
        .framebuffer(framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        })
        .clear_values(clear_values);
    unsafe {
        device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
    }
}
