//! Mesh submissions: G-buffer fill and shadow casting

use ash::vk;

use crate::ecs::components::{GrassField, MeshRenderer, SkeletalAnimationTag, TransformNode};
use crate::ecs::World;
use crate::render::frame::FrameContext;
use crate::render::mesh::{MeshKind, Model};
use crate::render::registry::CascadeSlot;
use crate::render::vulkan::GraphicsPipeline;
use crate::scene::InstanceSlot;

use super::{bind_sets, push_block, SubmitEnv, SurfacePush};

fn clip_plane(frame: &FrameContext) -> [f32; 4] {
    frame
        .camera
        .clip_plane
        .map_or([0.0; 4], |p| [p.x, p.y, p.z, p.w])
}

/// Bind buffers and issue one indexed draw per primitive of `model`, with
/// the instance record selected through `first_instance`
fn draw_model(
    env: &SubmitEnv,
    frame: &FrameContext,
    pipeline: &GraphicsPipeline,
    model: &Model,
    slot: InstanceSlot,
    mut push: SurfacePush,
) {
    let device = env.context.device();
    let cmd = frame.command_buffer;
    unsafe {
        device.cmd_bind_vertex_buffers(cmd, 0, &[model.vertex_buffer()], &[0]);
        device.cmd_bind_index_buffer(cmd, model.index_buffer(), 0, vk::IndexType::UINT32);
    }
    let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
    for primitive in model.primitives() {
        let material = &model.materials()[primitive.material_index];
        bind_sets(env.context, cmd, pipeline.layout(), 2, &[material.set()]);
        push.base_color = material.base_color();
        push_block(env.context, cmd, pipeline.layout(), stages, &push);
        unsafe {
            device.cmd_draw_indexed(
                cmd,
                primitive.index_count,
                1,
                primitive.index_offset,
                0,
                slot.index,
            );
        }
    }
}

/// Static meshes into the G-buffer subpass
pub fn submit_pbr_opaque(env: &SubmitEnv, frame: &FrameContext, world: &World) {
    let pipeline = &env.catalog.pbr_opaque;
    pipeline.bind(frame.command_buffer, frame.extent);
    let mut bound_buffer = None;
    for (entity, node, renderer) in world.view2::<TransformNode, MeshRenderer>() {
        if !renderer.enabled || renderer.model.kind() != MeshKind::Static {
            continue;
        }
        if world.get_component::<SkeletalAnimationTag>(entity).is_some()
            || world.get_component::<GrassField>(entity).is_some()
        {
            continue;
        }
        let Some(slot) = env.graph.instance_slot(node.0) else {
            continue;
        };
        if bound_buffer != Some(slot.buffer) {
            bind_sets(
                env.context,
                frame.command_buffer,
                pipeline.layout(),
                0,
                &[
                    frame.global_set,
                    env.resources[slot.buffer as usize].set(frame.frame_index),
                ],
            );
            bound_buffer = Some(slot.buffer);
        }
        let push = SurfacePush {
            clip_plane: clip_plane(frame),
            base_color: [1.0; 4],
            grass: [0.0; 4],
        };
        draw_model(env, frame, pipeline, &renderer.model, slot, push);
    }
}

/// Skinned meshes into the G-buffer subpass
pub fn submit_pbr_skeletal(env: &SubmitEnv, frame: &FrameContext, world: &World) {
    let pipeline = &env.catalog.pbr_skeletal;
    pipeline.bind(frame.command_buffer, frame.extent);
    for (_, node, renderer, _tag) in
        world.view3::<TransformNode, MeshRenderer, SkeletalAnimationTag>()
    {
        if !renderer.enabled || renderer.model.kind() != MeshKind::Skinned {
            continue;
        }
        let Some(slot) = env.graph.instance_slot(node.0) else {
            continue;
        };
        bind_sets(
            env.context,
            frame.command_buffer,
            pipeline.layout(),
            0,
            &[
                frame.global_set,
                env.resources[slot.buffer as usize].set(frame.frame_index),
            ],
        );
        let push = SurfacePush {
            clip_plane: clip_plane(frame),
            base_color: [1.0; 4],
            grass: [0.0; 4],
        };
        draw_model(env, frame, pipeline, &renderer.model, slot, push);
    }
}

/// Grass fields into the G-buffer subpass
pub fn submit_grass(env: &SubmitEnv, frame: &FrameContext, world: &World, time: f32) {
    let pipeline = &env.catalog.grass;
    pipeline.bind(frame.command_buffer, frame.extent);
    for (_, node, renderer, field) in world.view3::<TransformNode, MeshRenderer, GrassField>() {
        if !renderer.enabled {
            continue;
        }
        let Some(slot) = env.graph.instance_slot(node.0) else {
            continue;
        };
        bind_sets(
            env.context,
            frame.command_buffer,
            pipeline.layout(),
            0,
            &[
                frame.global_set,
                env.resources[slot.buffer as usize].set(frame.frame_index),
            ],
        );
        let push = SurfacePush {
            clip_plane: clip_plane(frame),
            base_color: [1.0; 4],
            grass: [field.height_scale, field.wind_strength, time, 0.0],
        };
        draw_model(env, frame, pipeline, &renderer.model, slot, push);
    }
}

fn shadow_draw(
    env: &SubmitEnv,
    frame: &FrameContext,
    pipeline: &GraphicsPipeline,
    model: &Model,
    slot: InstanceSlot,
    cascade: CascadeSlot,
) {
    let device = env.context.device();
    let cmd = frame.command_buffer;
    bind_sets(
        env.context,
        cmd,
        pipeline.layout(),
        0,
        &[
            env.registry.shadow_set(frame.frame_index, cascade),
            env.resources[slot.buffer as usize].set(frame.frame_index),
        ],
    );
    unsafe {
        device.cmd_bind_vertex_buffers(cmd, 0, &[model.vertex_buffer()], &[0]);
        device.cmd_bind_index_buffer(cmd, model.index_buffer(), 0, vk::IndexType::UINT32);
        device.cmd_draw_indexed(cmd, model.index_count(), 1, 0, 0, slot.index);
    }
}

/// Static casters, depth only, into one cascade
pub fn submit_shadow_cast(
    env: &SubmitEnv,
    frame: &FrameContext,
    world: &World,
    cascade: CascadeSlot,
) {
    let pipeline = &env.catalog.shadow_cast;
    pipeline.bind(frame.command_buffer, frame.extent);
    for (entity, node, renderer) in world.view2::<TransformNode, MeshRenderer>() {
        if !renderer.enabled || renderer.model.kind() != MeshKind::Static {
            continue;
        }
        if world.get_component::<SkeletalAnimationTag>(entity).is_some() {
            continue;
        }
        let Some(slot) = env.graph.instance_slot(node.0) else {
            continue;
        };
        shadow_draw(env, frame, pipeline, &renderer.model, slot, cascade);
    }
}

/// Skinned casters, depth only, into one cascade
pub fn submit_shadow_skeletal_cast(
    env: &SubmitEnv,
    frame: &FrameContext,
    world: &World,
    cascade: CascadeSlot,
) {
    let pipeline = &env.catalog.shadow_skeletal_cast;
    pipeline.bind(frame.command_buffer, frame.extent);
    for (_, node, renderer, _tag) in
        world.view3::<TransformNode, MeshRenderer, SkeletalAnimationTag>()
    {
        if !renderer.enabled || renderer.model.kind() != MeshKind::Skinned {
            continue;
        }
        let Some(slot) = env.graph.instance_slot(node.0) else {
            continue;
        };
        shadow_draw(env, frame, pipeline, &renderer.model, slot, cascade);
    }
}
