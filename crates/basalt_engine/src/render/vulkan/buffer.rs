//! GPU buffer management
//!
//! RAII buffers with direct memory allocation, following the standard
//! create → query requirements → allocate → bind sequence. Two flavours:
//! [`Buffer`] for device-local or transient data, and [`MappedBuffer`] for
//! host-visible memory that stays persistently mapped for per-frame writes
//! (uniform ring, instance arrays).

use ash::{vk, Device};

use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanResult};

/// GPU buffer with automatically managed memory
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer =
            unsafe { device.create_buffer(&buffer_info, None) }.map_err(VulkanError::Api)?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type =
            context.find_memory_type(requirements.memory_type_bits, properties)?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory =
            unsafe { device.allocate_memory(&alloc_info, None) }.map_err(VulkanError::Api)?;
        unsafe { device.bind_buffer_memory(buffer, memory, 0) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Create a device-local buffer filled with `data` through a staging copy
    pub fn device_local_with_data<T: Copy>(
        context: &VulkanContext,
        pool: &CommandPool,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let size = std::mem::size_of_val(data) as vk::DeviceSize;
        let staging = Buffer::new(
            context,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_data(data)?;

        let buffer = Buffer::new(
            context,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        pool.one_time_submit(context, |device, cmd| {
            let region = vk::BufferCopy::builder().size(size).build();
            unsafe { device.cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[region]) };
        })?;

        Ok(buffer)
    }

    /// Map, copy `data` from the start of the buffer, unmap
    pub fn write_data<T: Copy>(&self, data: &[T]) -> VulkanResult<()> {
        let size = std::mem::size_of_val(data);
        debug_assert!(size as vk::DeviceSize <= self.size);
        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr().cast::<u8>(), ptr.cast::<u8>(), size);
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Allocated size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Host-visible, host-coherent buffer that stays mapped for its lifetime.
///
/// Frame-in-flight fencing guarantees the GPU never reads a region while the
/// CPU writes it, so writes need no further synchronization.
pub struct MappedBuffer {
    buffer: Buffer,
    mapped: *mut u8,
}

impl MappedBuffer {
    /// Create and persistently map a host-visible buffer
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            context,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let mapped = unsafe {
            buffer
                .device
                .map_memory(buffer.memory, 0, size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        }
        .cast::<u8>();
        Ok(Self { buffer, mapped })
    }

    /// Write one POD value at a byte offset
    pub fn write<T: bytemuck::Pod>(&self, offset: vk::DeviceSize, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        debug_assert!(offset + bytes.len() as vk::DeviceSize <= self.buffer.size);
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mapped.add(offset as usize),
                bytes.len(),
            );
        }
    }

    /// Write a POD slice at a byte offset
    pub fn write_slice<T: bytemuck::Pod>(&self, offset: vk::DeviceSize, values: &[T]) {
        let bytes = bytemuck::cast_slice::<T, u8>(values);
        debug_assert!(offset + bytes.len() as vk::DeviceSize <= self.buffer.size);
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mapped.add(offset as usize),
                bytes.len(),
            );
        }
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Allocated size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        unsafe {
            self.buffer.device.unmap_memory(self.buffer.memory);
        }
    }
}
