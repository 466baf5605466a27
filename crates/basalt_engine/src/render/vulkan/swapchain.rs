//! Swap-chain lifecycle: creation, acquire/present, recreation
//!
//! Owns surface format and present-mode selection, the swap-chain images and
//! views, and the per-frame synchronization objects. Frame pacing is driven by
//! [`MAX_FRAMES_IN_FLIGHT`]: `acquire` waits on the slot's in-flight fence,
//! `submit_present` signals it, and the current frame index advances modulo
//! the in-flight count on present *and* on the early-out recreate path.

use ash::extensions::khr;
use ash::{vk, Device};
use log::{debug, warn};

use crate::config::PresentModePreference;

use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::surface::Surface;
use super::sync::FrameSync;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Result of acquiring the next swap-chain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAcquire {
    /// Image acquired and ready to record into
    Acquired {
        /// Index of the acquired swap-chain image
        image_index: u32,
    },
    /// Swap-chain is stale (resize, minimize); recreate and retry next frame
    NeedsRecreate,
}

/// Result of submitting and presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Frame was presented
    Presented,
    /// Present reported the swap-chain out of date or suboptimal
    NeedsRecreate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    FrameInProgress,
}

/// Swap-chain with images, views, pacing state and per-frame sync
pub struct Swapchain {
    device: Device,
    loader: khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    frame_sync: Vec<FrameSync>,
    current_frame: usize,
    state: FrameState,
}

impl Swapchain {
    /// Create the swap-chain for `surface` at `extent`
    pub fn new(
        context: &VulkanContext,
        surface: &Surface,
        extent: vk::Extent2D,
        preference: PresentModePreference,
    ) -> VulkanResult<Self> {
        let mut frame_sync = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            frame_sync.push(FrameSync::new(context.raw_device())?);
        }
        let depth_format = select_depth_format(context)?;
        let (loader, swapchain, images, views, format, present_mode, actual_extent) =
            create_swapchain(context, surface, extent, preference, None)?;
        debug!(
            "Swapchain created: {}x{} {:?} {:?}, {} images",
            actual_extent.width,
            actual_extent.height,
            format.format,
            present_mode,
            images.len()
        );
        Ok(Self {
            device: context.raw_device(),
            loader,
            swapchain,
            images,
            views,
            format,
            depth_format,
            present_mode,
            extent: actual_extent,
            frame_sync,
            current_frame: 0,
            state: FrameState::Idle,
        })
    }

    /// Rebuild the swap-chain after a resize, keeping the per-frame sync
    /// objects. Returns [`VulkanError::FormatChanged`] if the surface no
    /// longer supports the original colour format or the depth format moved.
    pub fn recreate(
        &mut self,
        context: &VulkanContext,
        surface: &Surface,
        extent: vk::Extent2D,
        preference: PresentModePreference,
    ) -> VulkanResult<()> {
        context.wait_idle()?;
        debug_assert_eq!(self.state, FrameState::Idle);

        let old_format = self.format;
        let (loader, swapchain, images, views, format, present_mode, actual_extent) =
            create_swapchain(context, surface, extent, preference, Some(self.swapchain))?;
        self.destroy_swapchain_objects();
        self.loader = loader;
        self.swapchain = swapchain;
        self.images = images;
        self.views = views;
        self.format = format;
        self.present_mode = present_mode;
        self.extent = actual_extent;

        if format.format != old_format.format || format.color_space != old_format.color_space {
            return Err(VulkanError::FormatChanged(format!(
                "colour {:?}/{:?} became {:?}/{:?}",
                old_format.format, old_format.color_space, format.format, format.color_space
            )));
        }
        let depth_format = select_depth_format(context)?;
        if depth_format != self.depth_format {
            return Err(VulkanError::FormatChanged(format!(
                "depth {:?} became {:?}",
                self.depth_format, depth_format
            )));
        }
        debug!(
            "Swapchain recreated: {}x{}",
            actual_extent.width, actual_extent.height
        );
        Ok(())
    }

    /// Wait for the current frame slot and acquire the next image.
    ///
    /// On a stale swap-chain this returns [`FrameAcquire::NeedsRecreate`] and
    /// advances the frame index so the next call uses fresh sync objects.
    pub fn acquire(&mut self) -> VulkanResult<FrameAcquire> {
        debug_assert_eq!(self.state, FrameState::Idle);
        let sync = &self.frame_sync[self.current_frame];
        sync.in_flight.wait()?;

        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available.handle(),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    warn!("Swapchain suboptimal on acquire");
                }
                sync.in_flight.reset()?;
                self.state = FrameState::FrameInProgress;
                Ok(FrameAcquire::Acquired { image_index })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
                Ok(FrameAcquire::NeedsRecreate)
            }
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Submit `cmd` for the acquired image and present it
    pub fn submit_present(
        &mut self,
        context: &VulkanContext,
        cmd: vk::CommandBuffer,
        image_index: u32,
    ) -> VulkanResult<SubmitOutcome> {
        debug_assert_eq!(self.state, FrameState::FrameInProgress);
        let sync = &self.frame_sync[self.current_frame];

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.device
                .queue_submit(
                    context.graphics_queue(),
                    &[submit_info.build()],
                    sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let result = unsafe {
            self.loader
                .queue_present(context.present_queue(), &present_info)
        };

        self.state = FrameState::Idle;
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        match result {
            Ok(false) => Ok(SubmitOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SubmitOutcome::NeedsRecreate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Current frame-in-flight slot
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Swap-chain image views, one per image
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// Number of swap-chain images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Surface format in use
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Depth attachment format selected at creation
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Present mode in use
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Swap-chain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn destroy_swapchain_objects(&mut self) {
        unsafe {
            for view in self.views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        self.images.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_swapchain_objects();
    }
}

type SwapchainObjects = (
    khr::Swapchain,
    vk::SwapchainKHR,
    Vec<vk::Image>,
    Vec<vk::ImageView>,
    vk::SurfaceFormatKHR,
    vk::PresentModeKHR,
    vk::Extent2D,
);

fn create_swapchain(
    context: &VulkanContext,
    surface: &Surface,
    extent: vk::Extent2D,
    preference: PresentModePreference,
    old_swapchain: Option<vk::SwapchainKHR>,
) -> VulkanResult<SwapchainObjects> {
    let capabilities = surface.capabilities(context.physical().device)?;
    let formats = surface.formats(context.physical().device)?;
    let present_modes = surface.present_modes(context.physical().device)?;

    let format = select_surface_format(&formats);
    let present_mode = select_present_mode(&present_modes, preference);
    let actual_extent = clamp_extent(extent, &capabilities);

    let mut image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        image_count = image_count.min(capabilities.max_image_count);
    }

    let mut create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface.handle())
        .min_image_count(image_count)
        .image_format(format.format)
        .image_color_space(format.color_space)
        .image_extent(actual_extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true);
    if let Some(old) = old_swapchain {
        create_info = create_info.old_swapchain(old);
    }

    let loader = khr::Swapchain::new(context.instance(), context.device());
    let swapchain =
        unsafe { loader.create_swapchain(&create_info, None) }.map_err(VulkanError::Api)?;
    let images = unsafe { loader.get_swapchain_images(swapchain) }.map_err(VulkanError::Api)?;

    let mut views = Vec::with_capacity(images.len());
    for &image in &images {
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { context.device().create_image_view(&view_info, None) }
            .map_err(VulkanError::Api)?;
        views.push(view);
    }

    Ok((
        loader,
        swapchain,
        images,
        views,
        format,
        present_mode,
        actual_extent,
    ))
}

/// Prefer B8G8R8A8_SRGB with sRGB-nonlinear colour space
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0])
}

/// Honour the configured preference, falling back to FIFO which is always
/// available
pub fn select_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentModePreference,
) -> vk::PresentModeKHR {
    let wanted = match preference {
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
    };
    if modes.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn clamp_extent(extent: vk::Extent2D, capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

fn select_depth_format(context: &VulkanContext) -> VulkanResult<vk::Format> {
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];
    for format in candidates {
        let props = unsafe {
            context
                .instance()
                .get_physical_device_format_properties(context.physical().device, format)
        };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(format);
        }
    }
    Err(VulkanError::InvalidOperation {
        reason: "no supported depth attachment format".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_bgra_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let selected = select_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(
            select_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn present_mode_honours_preference_with_fifo_fallback() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            select_present_mode(&modes, PresentModePreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            select_present_mode(&modes, PresentModePreference::Immediate),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn clamp_extent_respects_surface_bounds() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        let clamped = clamp_extent(
            vk::Extent2D {
                width: 16,
                height: 8192,
            },
            &capabilities,
        );
        assert_eq!(clamped.width, 64);
        assert_eq!(clamped.height, 4096);
    }
}
