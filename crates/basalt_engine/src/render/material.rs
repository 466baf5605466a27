//! Material descriptors and the shared fallback textures
//!
//! A [`MaterialDescriptor`] owns its textures and one descriptor set; slots
//! without a texture bind the shared dummies so every sampler in the shader
//! always has defined contents. Sets live until the owning model is retired
//! through the renderer's deferred-destruction queue.

use ash::vk;

use super::vulkan::{
    CommandPool, DescriptorPool, DescriptorSetLayout, DescriptorWriter, Sampler, Texture,
    VulkanContext, VulkanResult,
};

/// Shared 1x1 fallbacks bound wherever a material slot has no texture
pub struct DummyTextures {
    /// Opaque white, for albedo slots
    pub white: Texture,
    /// Opaque black, for emission slots
    pub black: Texture,
    /// Flat tangent-space normal
    pub normal: Texture,
    /// Rough non-metallic surface parameters
    pub material: Texture,
    /// Black environment cubemap
    pub cubemap: Texture,
}

impl DummyTextures {
    /// Upload all dummies
    pub fn new(context: &VulkanContext, pool: &CommandPool) -> VulkanResult<Self> {
        Ok(Self {
            white: Texture::dummy_white(context, pool)?,
            black: Texture::dummy_black(context, pool)?,
            normal: Texture::dummy_normal(context, pool)?,
            material: Texture::dummy_material(context, pool)?,
            cubemap: Texture::dummy_cubemap(context, pool)?,
        })
    }
}

/// Which shading model a material uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Unlit/lambert textured
    Diffuse,
    /// Metallic-roughness PBR
    Pbr,
    /// Environment cubemap (sky)
    Cubemap,
}

/// Optional texture maps for a surface material
#[derive(Default)]
pub struct MaterialMaps {
    /// Base colour
    pub albedo: Option<Texture>,
    /// Tangent-space normals
    pub normal: Option<Texture>,
    /// R roughness, G metallic, B ambient occlusion
    pub material: Option<Texture>,
    /// Emissive colour
    pub emission: Option<Texture>,
}

/// A material's GPU state: owned textures plus one descriptor set
pub struct MaterialDescriptor {
    kind: MaterialKind,
    set: vk::DescriptorSet,
    // owned so the views in `set` outlive every frame that binds them
    _maps: MaterialMaps,
    _environment: Option<Texture>,
    base_color: [f32; 4],
}

impl MaterialDescriptor {
    /// Diffuse material; missing maps bind the dummies
    pub fn diffuse(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
        sampler: &Sampler,
        dummies: &DummyTextures,
        maps: MaterialMaps,
        base_color: [f32; 4],
    ) -> VulkanResult<Self> {
        Self::surface(
            context,
            pool,
            layout,
            sampler,
            dummies,
            maps,
            base_color,
            MaterialKind::Diffuse,
        )
    }

    /// Metallic-roughness PBR material; missing maps bind the dummies
    pub fn pbr(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
        sampler: &Sampler,
        dummies: &DummyTextures,
        maps: MaterialMaps,
        base_color: [f32; 4],
    ) -> VulkanResult<Self> {
        Self::surface(
            context,
            pool,
            layout,
            sampler,
            dummies,
            maps,
            base_color,
            MaterialKind::Pbr,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn surface(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
        sampler: &Sampler,
        dummies: &DummyTextures,
        maps: MaterialMaps,
        base_color: [f32; 4],
        kind: MaterialKind,
    ) -> VulkanResult<Self> {
        let set = pool.allocate(layout)?;
        let albedo = maps.albedo.as_ref().map_or(dummies.white.view(), Texture::view);
        let normal = maps
            .normal
            .as_ref()
            .map_or(dummies.normal.view(), Texture::view);
        let material = maps
            .material
            .as_ref()
            .map_or(dummies.material.view(), Texture::view);
        let emission = maps
            .emission
            .as_ref()
            .map_or(dummies.black.view(), Texture::view);
        DescriptorWriter::new()
            .sampled_image(0, albedo, sampler.handle())
            .sampled_image(1, normal, sampler.handle())
            .sampled_image(2, material, sampler.handle())
            .sampled_image(3, emission, sampler.handle())
            .write(context, set);
        Ok(Self {
            kind,
            set,
            _maps: maps,
            _environment: None,
            base_color,
        })
    }

    /// Sky cubemap material; a missing environment binds the black dummy
    pub fn cubemap(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
        sampler: &Sampler,
        dummies: &DummyTextures,
        environment: Option<Texture>,
    ) -> VulkanResult<Self> {
        let set = pool.allocate(layout)?;
        let view = environment
            .as_ref()
            .map_or(dummies.cubemap.view(), Texture::view);
        DescriptorWriter::new()
            .sampled_image(0, view, sampler.handle())
            .write(context, set);
        Ok(Self {
            kind: MaterialKind::Cubemap,
            set,
            _maps: MaterialMaps::default(),
            _environment: environment,
            base_color: [1.0, 1.0, 1.0, 1.0],
        })
    }

    /// Shading model
    pub fn kind(&self) -> MaterialKind {
        self.kind
    }

    /// Descriptor set to bind for draws using this material
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }

    /// Base colour factor multiplied with the albedo map
    pub fn base_color(&self) -> [f32; 4] {
        self.base_color
    }
}

/// Descriptor set layout for surface materials (albedo, normal, material,
/// emission)
pub fn surface_material_layout(context: &VulkanContext) -> VulkanResult<DescriptorSetLayout> {
    super::vulkan::DescriptorSetLayoutBuilder::new()
        .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
        .sampled_image(1, vk::ShaderStageFlags::FRAGMENT)
        .sampled_image(2, vk::ShaderStageFlags::FRAGMENT)
        .sampled_image(3, vk::ShaderStageFlags::FRAGMENT)
        .build(context)
}

/// Descriptor set layout for cubemap materials
pub fn cubemap_material_layout(context: &VulkanContext) -> VulkanResult<DescriptorSetLayout> {
    super::vulkan::DescriptorSetLayoutBuilder::new()
        .sampled_image(0, vk::ShaderStageFlags::FRAGMENT)
        .build(context)
}
