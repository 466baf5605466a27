//! Water refraction and reflection targets
//!
//! Both targets reuse the 3D pass object at half the swap-chain extent. The
//! refraction pass renders the scene clipped below the surface, the
//! reflection pass renders it mirrored and clipped above; both HDR results
//! are exposed through the renderer for water-surface materials drawn in the
//! transparency subpass.

use ash::vk;

use crate::render::vulkan::{Framebuffer, VulkanContext, VulkanResult};

use super::geometry::{GeometryPass, GeometryTargets};

/// Compute the half-resolution water extent (clamped to 1)
pub fn water_extent(swapchain: vk::Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: (swapchain.width / 2).max(1),
        height: (swapchain.height / 2).max(1),
    }
}

struct WaterTarget {
    targets: GeometryTargets,
    framebuffer: Framebuffer,
}

impl WaterTarget {
    fn new(
        context: &VulkanContext,
        pass: &GeometryPass,
        extent: vk::Extent2D,
        depth_format: vk::Format,
    ) -> VulkanResult<Self> {
        let targets = GeometryTargets::new(context, extent, depth_format)?;
        let framebuffer = Framebuffer::new(context, pass.pass(), &targets.views(), extent)?;
        Ok(Self {
            targets,
            framebuffer,
        })
    }
}

/// Half-resolution refraction and reflection instantiations of the 3D pass
pub struct WaterPass {
    refraction: WaterTarget,
    reflection: WaterTarget,
    extent: vk::Extent2D,
    depth_format: vk::Format,
}

impl WaterPass {
    /// Allocate both target sets for a swap-chain of `swapchain_extent`
    pub fn new(
        context: &VulkanContext,
        geometry: &GeometryPass,
        swapchain_extent: vk::Extent2D,
        depth_format: vk::Format,
    ) -> VulkanResult<Self> {
        let extent = water_extent(swapchain_extent);
        Ok(Self {
            refraction: WaterTarget::new(context, geometry, extent, depth_format)?,
            reflection: WaterTarget::new(context, geometry, extent, depth_format)?,
            extent,
            depth_format,
        })
    }

    /// Rebuild both target sets after a swap-chain resize
    pub fn recreate(
        &mut self,
        context: &VulkanContext,
        geometry: &GeometryPass,
        swapchain_extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        let extent = water_extent(swapchain_extent);
        self.refraction = WaterTarget::new(context, geometry, extent, self.depth_format)?;
        self.reflection = WaterTarget::new(context, geometry, extent, self.depth_format)?;
        self.extent = extent;
        Ok(())
    }

    /// Target extent (half swap-chain resolution)
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Begin the refraction instantiation of the 3D pass
    pub fn begin_refraction(
        &self,
        context: &VulkanContext,
        geometry: &GeometryPass,
        cmd: vk::CommandBuffer,
    ) {
        geometry.begin_with(context, cmd, self.refraction.framebuffer.handle(), self.extent);
    }

    /// Begin the reflection instantiation of the 3D pass
    pub fn begin_reflection(
        &self,
        context: &VulkanContext,
        geometry: &GeometryPass,
        cmd: vk::CommandBuffer,
    ) {
        geometry.begin_with(context, cmd, self.reflection.framebuffer.handle(), self.extent);
    }

    /// Refraction HDR colour, sampled by the water-surface shader
    pub fn refraction_view(&self) -> vk::ImageView {
        self.refraction.targets.hdr.view()
    }

    /// Reflection HDR colour, sampled by the water-surface shader
    pub fn reflection_view(&self) -> vk::ImageView {
        self.reflection.targets.hdr.view()
    }

    /// Refraction G-buffer targets, for the lighting input-attachment set
    pub fn refraction_targets(&self) -> &GeometryTargets {
        &self.refraction.targets
    }

    /// Reflection G-buffer targets, for the lighting input-attachment set
    pub fn reflection_targets(&self) -> &GeometryTargets {
        &self.reflection.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_extent_is_half_resolution() {
        let extent = water_extent(vk::Extent2D {
            width: 1920,
            height: 1080,
        });
        assert_eq!(extent.width, 960);
        assert_eq!(extent.height, 540);
    }

    #[test]
    fn water_extent_never_reaches_zero() {
        let extent = water_extent(vk::Extent2D {
            width: 1,
            height: 1,
        });
        assert_eq!(extent.width, 1);
        assert_eq!(extent.height, 1);
    }
}
