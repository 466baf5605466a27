//! Overlay submissions: sky, sprites, and the debug line layer

use ash::vk;

use crate::ecs::components::{
    CubemapSky, MeshRenderer, SpriteRenderer2D, SpriteRenderer3D, TransformNode,
};
use crate::ecs::World;
use crate::foundation::math::Mat4;
use crate::render::frame::FrameContext;
use crate::render::material::MaterialKind;
use crate::render::ubo::gpu_mat4;

use super::{bind_sets, push_block, SpritePush, SubmitEnv};

/// Cells per row of the global spritesheet
const SHEET_COLUMNS: f32 = 8.0;

fn sprite_stages() -> vk::ShaderStageFlags {
    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
}

/// Sky cubemap at the far plane, filling the G-buffer background
pub fn submit_sky(env: &SubmitEnv, frame: &FrameContext, world: &World) {
    let pipeline = &env.catalog.cubemap_sky;
    let device = env.context.device();
    let cmd = frame.command_buffer;
    for (_, renderer, _sky) in world.view2::<MeshRenderer, CubemapSky>() {
        let model = renderer.model.model();
        let Some(material) = model
            .materials()
            .iter()
            .find(|m| m.kind() == MaterialKind::Cubemap)
        else {
            continue;
        };
        pipeline.bind(cmd, frame.extent);
        bind_sets(
            env.context,
            cmd,
            pipeline.layout(),
            0,
            &[frame.global_set, material.set()],
        );
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[model.vertex_buffer()], &[0]);
            device.cmd_bind_index_buffer(cmd, model.index_buffer(), 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(cmd, model.index_count(), 1, 0, 0, 0);
        }
        // one sky per scene
        break;
    }
}

/// World-space billboards in the transparency subpass
pub fn submit_sprites_3d(env: &SubmitEnv, frame: &FrameContext, world: &World) {
    let pipeline = &env.catalog.sprite_3d;
    let device = env.context.device();
    let cmd = frame.command_buffer;
    let mut bound = false;
    for (_, node, renderer, sprite) in
        world.view3::<TransformNode, MeshRenderer, SpriteRenderer3D>()
    {
        if !renderer.enabled {
            continue;
        }
        let model = renderer.model.model();
        let Some(material) = model.materials().first() else {
            continue;
        };
        if !bound {
            pipeline.bind(cmd, frame.extent);
            bind_sets(env.context, cmd, pipeline.layout(), 0, &[frame.global_set]);
            bound = true;
        }
        bind_sets(env.context, cmd, pipeline.layout(), 1, &[material.set()]);

        let Some(world_matrix) = env.graph.try_world(node.0) else {
            continue;
        };
        // bake the sprite size into the quad's basis vectors
        let mut placement = *world_matrix;
        for row in 0..3 {
            placement[(row, 0)] *= sprite.size.x;
            placement[(row, 1)] *= sprite.size.y;
        }
        let push = SpritePush {
            model: gpu_mat4(&placement),
            tint: sprite.tint,
            cell: [sprite.sheet_cell as f32, SHEET_COLUMNS, 0.0, 0.0],
        };
        push_block(env.context, cmd, pipeline.layout(), sprite_stages(), &push);
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[model.vertex_buffer()], &[0]);
            device.cmd_bind_index_buffer(cmd, model.index_buffer(), 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(cmd, model.index_count(), 1, 0, 0, 0);
        }
    }
}

/// Screen-space sprites in the GUI pass, back-to-front by layer
pub fn submit_sprites_gui(env: &SubmitEnv, frame: &FrameContext, world: &World) {
    let mut sprites: Vec<(i32, SpritePush, &MeshRenderer)> = Vec::new();
    for (_, node, renderer, sprite) in
        world.view3::<TransformNode, MeshRenderer, SpriteRenderer2D>()
    {
        if !renderer.enabled {
            continue;
        }
        let Some(world_matrix) = env.graph.try_world(node.0) else {
            continue;
        };
        let push = SpritePush {
            model: screen_placement(
                [world_matrix[(0, 3)], world_matrix[(1, 3)]],
                [sprite.size.x, sprite.size.y],
                frame.extent,
            ),
            tint: sprite.tint,
            cell: [sprite.sheet_cell as f32, SHEET_COLUMNS, 0.0, 0.0],
        };
        sprites.push((sprite.layer, push, renderer));
    }
    if sprites.is_empty() {
        return;
    }
    sprites.sort_by_key(|(layer, _, _)| *layer);

    let pipeline = &env.catalog.sprite_gui;
    let device = env.context.device();
    let cmd = frame.command_buffer;
    pipeline.bind(cmd, frame.extent);
    for (_, push, renderer) in &sprites {
        let model = renderer.model.model();
        let Some(material) = model.materials().first() else {
            continue;
        };
        bind_sets(
            env.context,
            cmd,
            pipeline.layout(),
            0,
            &[frame.global_set, material.set()],
        );
        push_block(env.context, cmd, pipeline.layout(), sprite_stages(), push);
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[model.vertex_buffer()], &[0]);
            device.cmd_bind_index_buffer(cmd, model.index_buffer(), 0, vk::IndexType::UINT32);
            device.cmd_draw_indexed(cmd, model.index_count(), 1, 0, 0, 0);
        }
    }
}

/// Debug lines in the GUI pass, drawn from a pre-filled vertex buffer
pub fn submit_debug(env: &SubmitEnv, frame: &FrameContext) {
    let Some((buffer, vertex_count)) = env.debug_vertices else {
        return;
    };
    if vertex_count == 0 {
        return;
    }
    let pipeline = &env.catalog.debug_overlay;
    let device = env.context.device();
    let cmd = frame.command_buffer;
    pipeline.bind(cmd, frame.extent);
    bind_sets(env.context, cmd, pipeline.layout(), 0, &[frame.global_set]);
    let push = SpritePush {
        model: gpu_mat4(&Mat4::identity()),
        tint: [1.0; 4],
        cell: [0.0; 4],
    };
    push_block(env.context, cmd, pipeline.layout(), sprite_stages(), &push);
    unsafe {
        device.cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]);
        device.cmd_draw(cmd, vertex_count, 1, 0, 0);
    }
}

/// Column-major placement mapping a pixel rect to clip space
fn screen_placement(origin: [f32; 2], size: [f32; 2], extent: vk::Extent2D) -> [[f32; 4]; 4] {
    let sx = 2.0 * size[0] / extent.width as f32;
    let sy = 2.0 * size[1] / extent.height as f32;
    let tx = 2.0 * origin[0] / extent.width as f32 - 1.0;
    let ty = 2.0 * origin[1] / extent.height as f32 - 1.0;
    [
        [sx, 0.0, 0.0, 0.0],
        [0.0, sy, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [tx, ty, 0.0, 1.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_placement_maps_pixels_to_clip() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        // a 400x300 sprite at the origin spans half of each axis
        let m = screen_placement([0.0, 0.0], [400.0, 300.0], extent);
        assert!((m[0][0] - 1.0).abs() < 1e-6);
        assert!((m[1][1] - 1.0).abs() < 1e-6);
        assert!((m[3][0] + 1.0).abs() < 1e-6);
        assert!((m[3][1] + 1.0).abs() < 1e-6);

        // centre of the screen lands at clip origin
        let m = screen_placement([400.0, 300.0], [32.0, 32.0], extent);
        assert!(m[3][0].abs() < 1e-6);
        assert!(m[3][1].abs() < 1e-6);
    }
}
