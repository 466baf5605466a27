//! SPIR-V shader loading and graphics pipeline construction
//!
//! Every pipeline in the pass graph is built through [`PipelineConfig`];
//! viewport and scissor are always dynamic so pipelines survive swap-chain
//! recreation untouched.

use std::ffi::CStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ash::{vk, Device};

use super::context::{VulkanContext, VulkanError, VulkanResult};

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, bytes: &[u8]) -> VulkanResult<Self> {
        // SPIR-V words are u32-aligned
        let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(VulkanError::ShaderLoad {
                path: String::new(),
                reason: "SPIR-V bytecode is not u32-aligned".to_string(),
            });
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(VulkanError::Api)?;
        Ok(Self { device, module })
    }

    /// Load shader from a SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| VulkanError::ShaderLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| VulkanError::ShaderLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::from_bytes(device, &bytes)
    }

    /// Shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage_info(
        &self,
        stage: vk::ShaderStageFlags,
        entry_point: &CStr,
    ) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(entry_point)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Per-attachment blend behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Overwrite the destination
    Opaque,
    /// Standard source-over alpha blending
    Alpha,
    /// Additive (light accumulation, bloom upsample)
    Additive,
}

impl BlendMode {
    fn attachment_state(self) -> vk::PipelineColorBlendAttachmentState {
        let base = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        match self {
            BlendMode::Opaque => base.blend_enable(false).build(),
            BlendMode::Alpha => base
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build(),
            BlendMode::Additive => base
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::ONE)
                .dst_color_blend_factor(vk::BlendFactor::ONE)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build(),
        }
    }
}

/// Everything that varies between the renderer's pipeline variants
pub struct PipelineConfig<'a> {
    /// Vertex shader SPIR-V path
    pub vertex_shader: &'a Path,
    /// Fragment shader SPIR-V path, or `None` for depth-only pipelines
    pub fragment_shader: Option<&'a Path>,
    /// Vertex binding descriptions
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attribute descriptions
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Target render pass
    pub render_pass: vk::RenderPass,
    /// Subpass index within the render pass
    pub subpass: u32,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Blend mode applied to every colour attachment of the subpass
    pub blend: BlendMode,
    /// Number of colour attachments in the subpass
    pub color_attachment_count: u32,
    /// Depth test enabled
    pub depth_test: bool,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Depth comparison
    pub depth_compare: vk::CompareOp,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Front-face winding
    pub front_face: vk::FrontFace,
    /// Static depth bias (shadow casters); `None` disables
    pub depth_bias: Option<(f32, f32)>,
    /// Descriptor set layouts, in set-index order
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Push constant ranges
    pub push_constants: Vec<vk::PushConstantRange>,
}

impl<'a> PipelineConfig<'a> {
    /// Baseline config: opaque, depth tested and written, back-face culled
    pub fn new(
        vertex_shader: &'a Path,
        fragment_shader: Option<&'a Path>,
        render_pass: vk::RenderPass,
    ) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            render_pass,
            subpass: 0,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            blend: BlendMode::Opaque,
            color_attachment_count: 1,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS_OR_EQUAL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_bias: None,
            set_layouts: Vec::new(),
            push_constants: Vec::new(),
        }
    }
}

/// Graphics pipeline with its layout, RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Build a pipeline from `config`
    pub fn new(context: &VulkanContext, config: &PipelineConfig) -> VulkanResult<Self> {
        let device = context.raw_device();

        let vertex_module = ShaderModule::from_file(device.clone(), config.vertex_shader)?;
        let fragment_module = config
            .fragment_shader
            .map(|path| ShaderModule::from_file(device.clone(), path))
            .transpose()?;

        let entry = CStr::from_bytes_with_nul(b"main\0").map_err(|_| {
            VulkanError::InvalidOperation {
                reason: "invalid shader entry point".to_string(),
            }
        })?;
        let mut shader_stages =
            vec![vertex_module.stage_info(vk::ShaderStageFlags::VERTEX, entry)];
        if let Some(fragment) = &fragment_module {
            shader_stages.push(fragment.stage_info(vk::ShaderStageFlags::FRAGMENT, entry));
        }

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&config.vertex_bindings)
            .vertex_attribute_descriptions(&config.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(config.topology)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; the counts still have to be set
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let mut rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(config.depth_bias.is_some());
        if let Some((constant, slope)) = config.depth_bias {
            rasterizer = rasterizer
                .depth_bias_constant_factor(constant)
                .depth_bias_slope_factor(slope);
        }

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(config.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0..config
            .color_attachment_count)
            .map(|_| config.blend.attachment_state())
            .collect();
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&config.set_layouts)
            .push_constant_ranges(&config.push_constants);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(config.render_pass)
            .subpass(config.subpass);

        let pipeline = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info.build()],
                None,
            )
        }
        .map_err(|(_, e)| {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            VulkanError::Api(e)
        })?[0];

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Bind the pipeline and set viewport and scissor to cover `extent`
    pub fn bind(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
