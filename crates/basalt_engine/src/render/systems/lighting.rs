//! Deferred shading submissions: fullscreen lighting in subpass 1 and the
//! additive point-light volumes drawn over it in subpass 2

use ash::vk;
use log::warn;

use crate::ecs::components::{PointLight, TransformNode};
use crate::ecs::World;
use crate::render::frame::FrameContext;

use super::{bind_sets, push_block, LightPush, SubmitEnv};

fn lighting_set(env: &SubmitEnv, frame: &FrameContext) -> vk::DescriptorSet {
    env.lighting_override
        .unwrap_or_else(|| env.registry.lighting_set(frame.frame_index))
}

/// Fullscreen analytic lighting over the G-buffer
pub fn submit_deferred(env: &SubmitEnv, frame: &FrameContext) {
    let pipeline = &env.catalog.deferred_lighting;
    pipeline.bind(frame.command_buffer, frame.extent);
    bind_sets(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        0,
        &[
            frame.global_set,
            lighting_set(env, frame),
            env.registry.shadow_map_set(frame.frame_index),
        ],
    );
    unsafe {
        env.context.device().cmd_draw(frame.command_buffer, 3, 1, 0, 0);
    }
}

/// Fullscreen image-based lighting; falls back to analytic when no
/// environment is bound
pub fn submit_ibl(env: &SubmitEnv, frame: &FrameContext) {
    let Some(ibl_set) = env.ibl_set else {
        warn!("IBL lighting requested without an environment; using analytic");
        submit_deferred(env, frame);
        return;
    };
    let pipeline = &env.catalog.ibl_lighting;
    pipeline.bind(frame.command_buffer, frame.extent);
    bind_sets(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        0,
        &[
            frame.global_set,
            lighting_set(env, frame),
            env.registry.shadow_map_set(frame.frame_index),
            ibl_set,
        ],
    );
    unsafe {
        env.context.device().cmd_draw(frame.command_buffer, 3, 1, 0, 0);
    }
}

/// Additive point-light volumes over the G-buffer
pub fn submit_point_lights(env: &SubmitEnv, frame: &FrameContext, world: &World) {
    let pipeline = &env.catalog.point_light_proxy;
    let proxy = env.light_proxy;
    let device = env.context.device();
    let cmd = frame.command_buffer;

    let mut bound = false;
    for (_, node, light) in world.view2::<TransformNode, PointLight>() {
        // a component can outlive its graph node for a frame
        let Some(world_matrix) = env.graph.try_world(node.0) else {
            continue;
        };
        if !bound {
            pipeline.bind(cmd, frame.extent);
            bind_sets(
                env.context,
                cmd,
                pipeline.layout(),
                0,
                &[
                    frame.global_set,
                    lighting_set(env, frame),
                ],
            );
            unsafe {
                device.cmd_bind_vertex_buffers(cmd, 0, &[proxy.vertex_buffer()], &[0]);
                device.cmd_bind_index_buffer(cmd, proxy.index_buffer(), 0, vk::IndexType::UINT32);
            }
            bound = true;
        }
        let push = LightPush {
            position_radius: [
                world_matrix[(0, 3)],
                world_matrix[(1, 3)],
                world_matrix[(2, 3)],
                light.radius,
            ],
            color_intensity: [light.color.x, light.color.y, light.color.z, light.intensity],
        };
        push_block(
            env.context,
            cmd,
            pipeline.layout(),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            &push,
        );
        unsafe {
            device.cmd_draw_indexed(cmd, proxy.index_count(), 1, 0, 0, 0);
        }
    }
}
