//! Presentation surface wrapper

use ash::extensions::khr::Surface as SurfaceLoader;
use ash::{vk, Entry, Instance};

use super::context::{VulkanError, VulkanResult};
use super::window::Window;

/// Vulkan surface plus its extension loader
pub struct Surface {
    loader: SurfaceLoader,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create the surface for a window
    pub fn new(entry: &Entry, instance: &Instance, window: &mut Window) -> VulkanResult<Self> {
        let loader = SurfaceLoader::new(entry, instance);
        let surface = window
            .create_vulkan_surface(instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        Ok(Self { loader, surface })
    }

    /// Surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Whether the queue family can present to this surface
    pub fn supports_present(
        &self,
        device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(device, queue_family, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Surface capabilities (extent bounds, image counts, transforms)
    pub fn capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Supported surface formats
    pub fn formats(&self, device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_formats(device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Supported present modes
    pub fn present_modes(
        &self,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_present_modes(device, self.surface)
        }
        .map_err(VulkanError::Api)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}
