//! Per-frame context handed through the pass submissions

use ash::vk;

use super::camera::CameraState;

/// Everything a submission needs about the frame being recorded.
///
/// Built by `begin_frame`; the water passes derive variants with their own
/// camera state, global set and extent, the main passes use it as-is.
#[derive(Clone)]
pub struct FrameContext {
    /// Frame-in-flight slot index
    pub frame_index: usize,
    /// Acquired swap-chain image
    pub image_index: u32,
    /// Command buffer being recorded
    pub command_buffer: vk::CommandBuffer,
    /// Camera snapshot for this instantiation of the pass graph
    pub camera: CameraState,
    /// Global descriptor set matching `camera`
    pub global_set: vk::DescriptorSet,
    /// Render area of the current pass instantiation
    pub extent: vk::Extent2D,
}
