//! The 3D pass: G-buffer fill, deferred lighting, transparency
//!
//! One render pass with three subpasses. Subpass 0 writes the five G-buffer
//! planes and depth, with the sky cubemap filling the background; subpass 1
//! reads the planes as input attachments and accumulates lit colour into the
//! HDR target; subpass 2 draws forward transparency (sprites, light proxies,
//! water surfaces) over the HDR target with the shared depth. The water
//! passes reuse this pass object at half extent.

use ash::vk;

use crate::render::vulkan::{
    AttachmentImage, Framebuffer, VulkanContext, VulkanResult,
};

use super::{begin_pass, RenderPass, ALBEDO_FORMAT, GBUFFER_FORMAT, HDR_FORMAT};

/// Subpass index of the G-buffer fill
pub const SUBPASS_GBUFFER: u32 = 0;
/// Subpass index of the deferred lighting
pub const SUBPASS_LIGHTING: u32 = 1;
/// Subpass index of forward transparency
pub const SUBPASS_TRANSPARENCY: u32 = 2;

/// Number of colour attachments written by the G-buffer subpass
pub const GBUFFER_PLANE_COUNT: u32 = 5;

/// The attachment images one instantiation of the 3D pass renders into
pub struct GeometryTargets {
    /// World-space position (w unused)
    pub position: AttachmentImage,
    /// World-space normal
    pub normal: AttachmentImage,
    /// Base colour
    pub albedo: AttachmentImage,
    /// Roughness / metallic / ambient occlusion
    pub material: AttachmentImage,
    /// Emissive colour, also the bloom pyramid's source
    pub emission: AttachmentImage,
    /// Scene depth
    pub depth: AttachmentImage,
    /// Lit HDR colour, sampled by post-process
    pub hdr: AttachmentImage,
}

impl GeometryTargets {
    /// Allocate all attachment images at `extent`
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        depth_format: vk::Format,
    ) -> VulkanResult<Self> {
        let plane = |format| {
            AttachmentImage::new(
                context,
                extent,
                format,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT,
                vk::ImageAspectFlags::COLOR,
            )
        };
        Ok(Self {
            position: plane(GBUFFER_FORMAT)?,
            normal: plane(GBUFFER_FORMAT)?,
            albedo: plane(ALBEDO_FORMAT)?,
            material: plane(GBUFFER_FORMAT)?,
            // emission is also the bloom pyramid's source, so it is sampled
            // outside the pass
            emission: AttachmentImage::new(
                context,
                extent,
                GBUFFER_FORMAT,
                vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::INPUT_ATTACHMENT
                    | vk::ImageUsageFlags::SAMPLED,
                vk::ImageAspectFlags::COLOR,
            )?,
            depth: AttachmentImage::new(
                context,
                extent,
                depth_format,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                vk::ImageAspectFlags::DEPTH,
            )?,
            hdr: AttachmentImage::new(
                context,
                extent,
                HDR_FORMAT,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                vk::ImageAspectFlags::COLOR,
            )?,
        })
    }

    /// Attachment views in render-pass order
    pub fn views(&self) -> [vk::ImageView; 7] {
        [
            self.position.view(),
            self.normal.view(),
            self.albedo.view(),
            self.material.view(),
            self.emission.view(),
            self.depth.view(),
            self.hdr.view(),
        ]
    }
}

/// The three-subpass 3D render pass with its full-resolution targets
pub struct GeometryPass {
    render_pass: RenderPass,
    targets: GeometryTargets,
    framebuffer: Framebuffer,
    extent: vk::Extent2D,
    depth_format: vk::Format,
    clear_color: [f32; 4],
}

impl GeometryPass {
    /// Build the pass object and its targets at `extent`
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        depth_format: vk::Format,
        clear_color: [f32; 4],
    ) -> VulkanResult<Self> {
        let render_pass = create_pass(context, depth_format)?;
        let targets = GeometryTargets::new(context, extent, depth_format)?;
        let framebuffer =
            Framebuffer::new(context, render_pass.handle(), &targets.views(), extent)?;
        Ok(Self {
            render_pass,
            targets,
            framebuffer,
            extent,
            depth_format,
            clear_color,
        })
    }

    /// Rebuild targets and framebuffer at a new extent; the pass object is
    /// reused since the attachment formats are fixed
    pub fn recreate(&mut self, context: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<()> {
        self.targets = GeometryTargets::new(context, extent, self.depth_format)?;
        self.framebuffer = Framebuffer::new(
            context,
            self.render_pass.handle(),
            &self.targets.views(),
            extent,
        )?;
        self.extent = extent;
        Ok(())
    }

    /// Render pass handle
    pub fn pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// The pass's attachment images
    pub fn targets(&self) -> &GeometryTargets {
        &self.targets
    }

    /// Current extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Begin the pass over the pass's own framebuffer
    pub fn begin(&self, context: &VulkanContext, cmd: vk::CommandBuffer) {
        self.begin_with(
            context,
            cmd,
            self.framebuffer.handle(),
            self.extent,
        );
    }

    /// Begin the pass over an external framebuffer (water targets)
    pub fn begin_with(
        &self,
        context: &VulkanContext,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) {
        let zero = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 0.0],
            },
        };
        let clear_values = [
            zero,
            zero,
            zero,
            zero,
            zero,
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
        ];
        begin_pass(
            context.device(),
            cmd,
            self.render_pass.handle(),
            framebuffer,
            extent,
            &clear_values,
        );
    }

    /// Advance to the next subpass
    pub fn next_subpass(&self, context: &VulkanContext, cmd: vk::CommandBuffer) {
        unsafe {
            context
                .device()
                .cmd_next_subpass(cmd, vk::SubpassContents::INLINE);
        }
    }

    /// End the pass
    pub fn end(&self, context: &VulkanContext, cmd: vk::CommandBuffer) {
        unsafe {
            context.device().cmd_end_render_pass(cmd);
        }
    }
}

fn create_pass(context: &VulkanContext, depth_format: vk::Format) -> VulkanResult<RenderPass> {
    let color_plane = |format| {
        vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .build()
    };
    let attachments = [
        color_plane(GBUFFER_FORMAT), // 0 position
        color_plane(GBUFFER_FORMAT), // 1 normal
        color_plane(ALBEDO_FORMAT),  // 2 albedo
        color_plane(GBUFFER_FORMAT), // 3 material
        vk::AttachmentDescription::builder() // 4 emission, kept for bloom
            .format(GBUFFER_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .build(),
        vk::AttachmentDescription::builder() // 5 depth
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .build(),
        vk::AttachmentDescription::builder() // 6 HDR colour
            .format(HDR_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .build(),
    ];

    let gbuffer_refs: Vec<vk::AttachmentReference> = (0..GBUFFER_PLANE_COUNT)
        .map(|i| vk::AttachmentReference {
            attachment: i,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect();
    let depth_ref = vk::AttachmentReference {
        attachment: 5,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let input_refs: Vec<vk::AttachmentReference> = (0..GBUFFER_PLANE_COUNT)
        .map(|i| vk::AttachmentReference {
            attachment: i,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        })
        .collect();
    let hdr_ref = [vk::AttachmentReference {
        attachment: 6,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    // depth is untouched by the lighting subpass but used again after it
    let lighting_preserve = [5u32];

    let subpasses = [
        vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&gbuffer_refs)
            .depth_stencil_attachment(&depth_ref)
            .build(),
        vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&hdr_ref)
            .input_attachments(&input_refs)
            .preserve_attachments(&lighting_preserve)
            .build(),
        vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&hdr_ref)
            .input_attachments(&input_refs)
            .depth_stencil_attachment(&depth_ref)
            .build(),
    ];

    let dependencies = [
        vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: SUBPASS_GBUFFER,
            src_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::SHADER_READ,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        },
        vk::SubpassDependency {
            src_subpass: SUBPASS_GBUFFER,
            dst_subpass: SUBPASS_LIGHTING,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::INPUT_ATTACHMENT_READ,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
        // transparency tests against the depth subpass 0 wrote and its light
        // proxies read the G-buffer planes
        vk::SubpassDependency {
            src_subpass: SUBPASS_GBUFFER,
            dst_subpass: SUBPASS_TRANSPARENCY,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::INPUT_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
        vk::SubpassDependency {
            src_subpass: SUBPASS_LIGHTING,
            dst_subpass: SUBPASS_TRANSPARENCY,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            dependency_flags: vk::DependencyFlags::BY_REGION,
        },
        vk::SubpassDependency {
            src_subpass: SUBPASS_TRANSPARENCY,
            dst_subpass: vk::SUBPASS_EXTERNAL,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
            src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags::SHADER_READ,
            dependency_flags: vk::DependencyFlags::empty(),
        },
    ];

    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    RenderPass::new(context, &create_info)
}
