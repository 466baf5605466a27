//! Command pool and recording helpers

use ash::{vk, Device};

use super::context::{VulkanContext, VulkanError, VulkanResult};

/// Command pool with RAII cleanup
pub struct CommandPool {
    device: Device,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a resettable command pool on the graphics family
    pub fn new(context: &VulkanContext) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(context.physical().graphics_family);
        let pool = unsafe { context.device().create_command_pool(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self {
            device: context.raw_device(),
            pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Record and synchronously submit a one-shot command buffer.
    ///
    /// Used for resource uploads and layout transitions at load time; waits
    /// on the graphics queue, so never call this mid-frame.
    pub fn one_time_submit<F>(&self, context: &VulkanContext, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let cmd = self.allocate(1)?[0];
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        record(&self.device, cmd);
        unsafe {
            self.device.end_command_buffer(cmd).map_err(VulkanError::Api)?;
            let buffers = [cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);
            self.device
                .queue_submit(context.graphics_queue(), &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device
                .queue_wait_idle(context.graphics_queue())
                .map_err(VulkanError::Api)?;
            self.device.free_command_buffers(self.pool, &buffers);
        }
        Ok(())
    }

    /// Pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
