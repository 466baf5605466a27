//! Vulkan context management
//!
//! Low-level instance, physical-device and logical-device initialization.
//! Everything downstream (swap-chain, passes, pipelines) borrows the
//! [`VulkanContext`] rather than owning raw handles.

use ash::extensions::khr::Swapchain as SwapchainLoader;
#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use super::surface::Surface;
use super::window::Window;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable physical device or queue family found
    #[error("No suitable device: {0}")]
    NoSuitableDevice(String),

    /// No suitable memory type found for an allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Surface colour or depth format changed across a swap-chain recreate.
    /// The descriptor and pass objects baked the old formats; fatal.
    #[error("Surface format changed across recreate: {0}")]
    FormatChanged(String),

    /// A SPIR-V artifact could not be loaded at startup
    #[error("Shader load failed: {path}: {reason}")]
    ShaderLoad {
        /// Path of the missing or invalid artifact
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Selected physical device and its cached properties
pub struct PhysicalDeviceInfo {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties (limits, vendor, name)
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Graphics-capable queue family index
    pub graphics_family: u32,
    /// Present-capable queue family index
    pub present_family: u32,
}

/// Owned Vulkan context: entry, instance, device and queues
pub struct VulkanContext {
    entry: Entry,
    instance: Instance,
    physical: PhysicalDeviceInfo,
    device: Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    #[cfg(debug_assertions)]
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanContext {
    /// Create instance, pick a device and build the logical device.
    ///
    /// `window` supplies the required instance extensions; the surface used
    /// for present-support queries is created by the caller afterwards via
    /// [`Surface::new`], so device selection takes a temporary surface here.
    pub fn new(window: &mut Window, app_name: &str, enable_validation: bool) -> VulkanResult<(Self, Surface)> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}"))
        })?;

        let instance = Self::create_instance(&entry, window, app_name, enable_validation)?;

        #[cfg(debug_assertions)]
        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let surface = Surface::new(&entry, &instance, window)?;
        let physical = Self::pick_physical_device(&instance, &surface)?;
        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(physical.properties.device_name.as_ptr()) }.to_string_lossy()
        );

        let (device, graphics_queue, present_queue) = Self::create_device(&instance, &physical)?;

        Ok((
            Self {
                entry,
                instance,
                physical,
                device,
                graphics_queue,
                present_queue,
                #[cfg(debug_assertions)]
                debug_utils,
            },
            surface,
        ))
    }

    fn create_instance(
        entry: &Entry,
        window: &mut Window,
        app_name: &str,
        enable_validation: bool,
    ) -> VulkanResult<Instance> {
        let app_name_cstr = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let engine_name_cstr = CString::new("basalt").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.get_required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}"))
        })?;
        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();
        #[allow(unused_mut)]
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if cfg!(debug_assertions) && enable_validation {
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        unsafe { entry.create_instance(&create_info, None) }.map_err(VulkanError::Api)
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(
        entry: &Entry,
        instance: &Instance,
    ) -> VulkanResult<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));
        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &Instance,
        surface: &Surface,
    ) -> VulkanResult<PhysicalDeviceInfo> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;
        let mut fallback: Option<PhysicalDeviceInfo> = None;

        for device in devices {
            let Some((graphics, present)) = Self::find_queue_families(instance, surface, device)?
            else {
                continue;
            };
            if !Self::supports_swapchain(instance, device)? {
                continue;
            }
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let memory_properties =
                unsafe { instance.get_physical_device_memory_properties(device) };
            let info = PhysicalDeviceInfo {
                device,
                properties,
                memory_properties,
                graphics_family: graphics,
                present_family: present,
            };
            if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
                return Ok(info);
            }
            fallback.get_or_insert(info);
        }

        fallback.ok_or_else(|| {
            VulkanError::NoSuitableDevice("no device with graphics+present and swapchain".into())
        })
    }

    fn find_queue_families(
        instance: &Instance,
        surface: &Surface,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Option<(u32, u32)>> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let mut graphics = None;
        let mut present = None;
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics.is_none() {
                graphics = Some(index);
            }
            if surface.supports_present(device, index)? && present.is_none() {
                present = Some(index);
            }
        }
        Ok(graphics.zip(present))
    }

    fn supports_swapchain(instance: &Instance, device: vk::PhysicalDevice) -> VulkanResult<bool> {
        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(VulkanError::Api)?;
        Ok(extensions.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        }))
    }

    fn create_device(
        instance: &Instance,
        physical: &PhysicalDeviceInfo,
    ) -> VulkanResult<(Device, vk::Queue, vk::Queue)> {
        let mut unique_families = vec![physical.graphics_family];
        if physical.present_family != physical.graphics_family {
            unique_families.push(physical.present_family);
        }
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        // Geometry shaders carry the water clip plane on drivers without
        // shaderClipDistance; independent blend keeps the G-buffer writes
        // per-attachment in the transparency subpass.
        let features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .shader_clip_distance(true)
            .independent_blend(true);

        let extension_names = [SwapchainLoader::name().as_ptr()];
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None) }
            .map_err(VulkanError::Api)?;
        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
        Ok((device, graphics_queue, present_queue))
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance handle
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Logical device (cheap to clone; `ash::Device` is internally ref-counted handles)
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Clone of the logical device for RAII wrappers
    pub fn raw_device(&self) -> Device {
        self.device.clone()
    }

    /// Selected physical device info
    pub fn physical(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Block until the device is idle (shutdown and descriptor recreation only)
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::Api)
    }

    /// Find a memory type index satisfying the filter and property flags
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<u32> {
        let mem = &self.physical.memory_properties;
        for i in 0..mem.memory_type_count {
            let supported = type_filter & (1 << i) != 0;
            let adequate = mem.memory_types[i as usize]
                .property_flags
                .contains(properties);
            if supported && adequate {
                return Ok(i);
            }
        }
        Err(VulkanError::NoSuitableMemoryType)
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let Some((utils, messenger)) = self.debug_utils.take() {
                utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _kind: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[vulkan] {message}");
    } else {
        log::warn!("[vulkan] {message}");
    }
    vk::FALSE
}
