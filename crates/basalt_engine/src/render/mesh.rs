//! Meshes, vertex layouts, skeletal animation and the refcounted model
//!
//! A [`Model`] owns its vertex/index buffers, a primitive list referencing
//! material slots, and an optional [`Skeleton`]. [`ModelHandle`] is the
//! shared reference the ECS stores; the renderer retires the GPU resources
//! through its deferred-destruction queue once the last handle drops.

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use ash::vk;

use crate::foundation::math::{Mat4, Transform};

use super::material::MaterialDescriptor;
use super::ubo::{BoneUbo, MAX_BONES};
use super::vulkan::{Buffer, CommandPool, VulkanContext, VulkanResult};

/// Static mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Tangent (w = bitangent sign)
    pub tangent: [f32; 4],
}

unsafe impl bytemuck::Zeroable for Vertex {}
unsafe impl bytemuck::Pod for Vertex {}

impl Vertex {
    /// Binding description for the full vertex stream
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions: position, normal, uv, tangent
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 32,
            },
        ]
    }

    /// Position-only attributes for depth-only shadow pipelines; the stride
    /// stays the full vertex so the same buffer binds unchanged
    pub fn position_only_attributes() -> Vec<vk::VertexInputAttributeDescription> {
        vec![vk::VertexInputAttributeDescription {
            binding: 0,
            location: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        }]
    }
}

/// Skinned mesh vertex: static layout plus joint indices and weights
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SkinnedVertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Tangent (w = bitangent sign)
    pub tangent: [f32; 4],
    /// Bone palette indices
    pub joints: [u32; 4],
    /// Skinning weights, summing to one
    pub weights: [f32; 4],
}

unsafe impl bytemuck::Zeroable for SkinnedVertex {}
unsafe impl bytemuck::Pod for SkinnedVertex {}

impl SkinnedVertex {
    /// Binding description for the skinned vertex stream
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<SkinnedVertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions: static layout plus joints and weights
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        let mut attributes = Vertex::attribute_descriptions();
        attributes.push(vk::VertexInputAttributeDescription {
            binding: 0,
            location: 4,
            format: vk::Format::R32G32B32A32_UINT,
            offset: 48,
        });
        attributes.push(vk::VertexInputAttributeDescription {
            binding: 0,
            location: 5,
            format: vk::Format::R32G32B32A32_SFLOAT,
            offset: 64,
        });
        attributes
    }

    /// Position-only attributes for skeletal shadow casting: position plus
    /// joints and weights, the shadow vertex shader still skins
    pub fn shadow_attributes() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 4,
                format: vk::Format::R32G32B32A32_UINT,
                offset: 48,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 5,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 64,
            },
        ]
    }
}

/// One draw range of a model, referencing a material slot
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    /// First index of the range
    pub index_offset: u32,
    /// Number of indices
    pub index_count: u32,
    /// Slot into the model's material list
    pub material_index: usize,
}

/// One joint of a skeleton; joints are stored parent-before-child
#[derive(Debug, Clone)]
pub struct Joint {
    /// Parent joint index, `None` for the root
    pub parent: Option<usize>,
    /// Inverse bind-pose matrix
    pub inverse_bind: Mat4,
    /// Rest-pose local transform
    pub local: Transform,
}

/// A sampled animation clip: per-keyframe local poses for every joint
#[derive(Debug, Clone)]
pub struct AnimationClip {
    /// Clip length in seconds
    pub duration: f32,
    /// Keyframe times, ascending
    pub times: Vec<f32>,
    /// `poses[k][j]` is joint `j`'s local transform at keyframe `k`
    pub poses: Vec<Vec<Transform>>,
}

impl AnimationClip {
    /// Sample joint-local transforms at `time` (wrapped into the clip),
    /// lerping between the surrounding keyframes
    pub fn sample(&self, time: f32, out: &mut [Transform]) {
        if self.times.is_empty() {
            return;
        }
        let t = if self.duration > 0.0 {
            time.rem_euclid(self.duration)
        } else {
            0.0
        };
        let next = self.times.partition_point(|&kt| kt <= t);
        let (a, b, alpha) = if next == 0 {
            (0, 0, 0.0)
        } else if next >= self.times.len() {
            let last = self.times.len() - 1;
            (last, last, 0.0)
        } else {
            let prev = next - 1;
            let span = self.times[next] - self.times[prev];
            let alpha = if span > 0.0 {
                (t - self.times[prev]) / span
            } else {
                0.0
            };
            (prev, next, alpha)
        };
        for (joint, slot) in out.iter_mut().enumerate() {
            let pa = &self.poses[a][joint];
            let pb = &self.poses[b][joint];
            *slot = lerp_transform(pa, pb, alpha);
        }
    }
}

fn lerp_transform(a: &Transform, b: &Transform, t: f32) -> Transform {
    Transform {
        translation: a.translation.lerp(&b.translation, t),
        rotation: a.rotation.lerp(&b.rotation, t),
        scale: a.scale.lerp(&b.scale, t),
    }
}

/// Skeleton with its clip and playback state
#[derive(Debug)]
pub struct Skeleton {
    joints: Vec<Joint>,
    clip: Option<AnimationClip>,
    time: f32,
}

impl Skeleton {
    /// Build a skeleton; `joints` must be ordered parent-before-child
    pub fn new(joints: Vec<Joint>, clip: Option<AnimationClip>) -> Self {
        debug_assert!(joints.len() <= MAX_BONES);
        debug_assert!(joints
            .iter()
            .enumerate()
            .all(|(i, j)| j.parent.map_or(true, |p| p < i)));
        Self {
            joints,
            clip,
            time: 0.0,
        }
    }

    /// Number of joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Advance playback and compute the bone palette
    pub fn update_animation(&mut self, dt: f32) -> BoneUbo {
        self.time += dt;
        let mut locals: Vec<Transform> = self.joints.iter().map(|j| j.local).collect();
        if let Some(clip) = &self.clip {
            clip.sample(self.time, &mut locals);
        }

        let mut worlds = vec![Mat4::identity(); self.joints.len()];
        let mut palette = BoneUbo::default();
        for (i, joint) in self.joints.iter().enumerate() {
            let local = locals[i].to_matrix();
            worlds[i] = match joint.parent {
                Some(p) => worlds[p] * local,
                None => local,
            };
            palette.bones[i] = (worlds[i] * joint.inverse_bind).into();
        }
        palette
    }
}

/// Geometry kind of a model, determining the vertex layout it was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    /// Static [`Vertex`] stream
    Static,
    /// [`SkinnedVertex`] stream with a skeleton
    Skinned,
}

/// GPU model: buffers, primitives, materials, optional skeleton
pub struct Model {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    primitives: Vec<Primitive>,
    materials: Vec<MaterialDescriptor>,
    skeleton: Option<Mutex<Skeleton>>,
    kind: MeshKind,
    index_count: u32,
}

impl Model {
    /// Upload a static mesh
    pub fn from_vertices(
        context: &VulkanContext,
        pool: &CommandPool,
        vertices: &[Vertex],
        indices: &[u32],
        primitives: Vec<Primitive>,
        materials: Vec<MaterialDescriptor>,
    ) -> VulkanResult<Self> {
        let vertex_buffer = Buffer::device_local_with_data(
            context,
            pool,
            vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = Buffer::device_local_with_data(
            context,
            pool,
            indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        Ok(Self {
            vertex_buffer,
            index_buffer,
            primitives,
            materials,
            skeleton: None,
            kind: MeshKind::Static,
            index_count: indices.len() as u32,
        })
    }

    /// Upload a skinned mesh with its skeleton
    pub fn from_skinned_vertices(
        context: &VulkanContext,
        pool: &CommandPool,
        vertices: &[SkinnedVertex],
        indices: &[u32],
        primitives: Vec<Primitive>,
        materials: Vec<MaterialDescriptor>,
        skeleton: Skeleton,
    ) -> VulkanResult<Self> {
        let vertex_buffer = Buffer::device_local_with_data(
            context,
            pool,
            vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = Buffer::device_local_with_data(
            context,
            pool,
            indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        Ok(Self {
            vertex_buffer,
            index_buffer,
            primitives,
            materials,
            skeleton: Some(Mutex::new(skeleton)),
            kind: MeshKind::Skinned,
            index_count: indices.len() as u32,
        })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Draw ranges
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Material descriptors, indexed by [`Primitive::material_index`]
    pub fn materials(&self) -> &[MaterialDescriptor] {
        &self.materials
    }

    /// Total index count over all primitives
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Vertex layout this model was built with
    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    /// Advance skeletal playback and return the fresh bone palette;
    /// `None` for static models
    pub fn update_animation(&self, dt: f32) -> Option<BoneUbo> {
        self.skeleton
            .as_ref()
            .and_then(|s| s.lock().ok())
            .map(|mut skeleton| skeleton.update_animation(dt))
    }
}

/// Shared handle to a [`Model`]
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<Model>,
}

impl ModelHandle {
    /// Wrap a freshly loaded model
    pub fn new(model: Model) -> Self {
        Self {
            inner: Arc::new(model),
        }
    }

    /// Number of live handles, used by the deferred-destruction queue
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// The shared model
    pub fn model(&self) -> &Model {
        &self.inner
    }
}

impl Deref for ModelHandle {
    type Target = Model;

    fn deref(&self) -> &Model {
        &self.inner
    }
}

/// Build a unit UV sphere; used for the point-light proxy volumes
pub fn unit_sphere(
    context: &VulkanContext,
    pool: &CommandPool,
    rings: u32,
    segments: u32,
) -> VulkanResult<Model> {
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for ring in 0..=rings {
        let v = ring as f32 / rings as f32;
        let phi = v * std::f32::consts::PI;
        for segment in 0..=segments {
            let u = segment as f32 / segments as f32;
            let theta = u * std::f32::consts::TAU;
            let position = [
                phi.sin() * theta.cos(),
                phi.cos(),
                phi.sin() * theta.sin(),
            ];
            vertices.push(Vertex {
                position,
                normal: position,
                uv: [u, v],
                tangent: [1.0, 0.0, 0.0, 1.0],
            });
        }
    }
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * (segments + 1) + segment;
            let b = a + segments + 1;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    // no primitives: the proxy is drawn whole, without materials
    Model::from_vertices(context, pool, &vertices, &indices, Vec::new(), Vec::new())
}

/// Build a unit quad in the XY plane, centred at the origin
pub fn unit_quad(
    context: &VulkanContext,
    pool: &CommandPool,
    materials: Vec<MaterialDescriptor>,
) -> VulkanResult<Model> {
    let normal = [0.0, 0.0, 1.0];
    let tangent = [1.0, 0.0, 0.0, 1.0];
    let vertices = [
        Vertex {
            position: [-0.5, -0.5, 0.0],
            normal,
            uv: [0.0, 1.0],
            tangent,
        },
        Vertex {
            position: [0.5, -0.5, 0.0],
            normal,
            uv: [1.0, 1.0],
            tangent,
        },
        Vertex {
            position: [0.5, 0.5, 0.0],
            normal,
            uv: [1.0, 0.0],
            tangent,
        },
        Vertex {
            position: [-0.5, 0.5, 0.0],
            normal,
            uv: [0.0, 0.0],
            tangent,
        },
    ];
    let indices = [0u32, 1, 2, 2, 3, 0];
    let primitives = vec![Primitive {
        index_offset: 0,
        index_count: 6,
        material_index: 0,
    }];
    Model::from_vertices(context, pool, &vertices, &indices, primitives, materials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn vertex_strides_match_attribute_offsets() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
        assert_eq!(std::mem::size_of::<SkinnedVertex>(), 80);
        let attrs = SkinnedVertex::attribute_descriptions();
        assert_eq!(attrs[4].offset, 48);
        assert_eq!(attrs[5].offset, 64);
    }

    #[test]
    fn clip_sampling_lerps_between_keyframes() {
        let rest = Transform::identity();
        let mut moved = Transform::identity();
        moved.translation = Vec3::new(2.0, 0.0, 0.0);
        let clip = AnimationClip {
            duration: 1.0,
            times: vec![0.0, 1.0],
            poses: vec![vec![rest], vec![moved]],
        };
        let mut out = vec![rest];
        clip.sample(0.5, &mut out);
        assert_relative_eq!(out[0].translation.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn clip_sampling_wraps_past_duration() {
        let mut a = Transform::identity();
        a.translation.x = 1.0;
        let mut b = Transform::identity();
        b.translation.x = 3.0;
        let clip = AnimationClip {
            duration: 2.0,
            times: vec![0.0, 2.0],
            poses: vec![vec![a], vec![b]],
        };
        let mut out = vec![Transform::identity()];
        clip.sample(2.5, &mut out); // wraps to t = 0.5
        assert_relative_eq!(out[0].translation.x, 1.5, epsilon = 1e-6);
    }

    #[test]
    fn bone_palette_chains_parent_transforms() {
        let root = Joint {
            parent: None,
            inverse_bind: Mat4::identity(),
            local: Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        };
        let child = Joint {
            parent: Some(0),
            inverse_bind: Mat4::identity(),
            local: Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        };
        let mut skeleton = Skeleton::new(vec![root, child], None);
        let palette = skeleton.update_animation(0.0);
        // child world translation accumulates both offsets
        assert_relative_eq!(palette.bones[1][3][1], 2.0, epsilon = 1e-6);
    }
}
