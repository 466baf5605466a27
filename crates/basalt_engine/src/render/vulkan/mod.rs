//! Vulkan backend primitives
//!
//! RAII wrappers over `ash` for the objects the renderer composes: context,
//! window surface, swap-chain, synchronization, buffers, images, descriptor
//! machinery, shader modules and framebuffers.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptors;
pub mod framebuffer;
pub mod image;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod window;

pub use buffer::{Buffer, MappedBuffer};
pub use commands::CommandPool;
pub use context::{VulkanContext, VulkanError, VulkanResult};
pub use descriptors::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorWriter,
};
pub use framebuffer::Framebuffer;
pub use image::{mip_extent, AttachmentImage, Sampler, Texture};
pub use shader::{BlendMode, GraphicsPipeline, PipelineConfig, ShaderModule};
pub use surface::Surface;
pub use swapchain::{FrameAcquire, SubmitOutcome, Swapchain, MAX_FRAMES_IN_FLIGHT};
pub use sync::{Fence, FrameSync, Semaphore};
pub use window::Window;
