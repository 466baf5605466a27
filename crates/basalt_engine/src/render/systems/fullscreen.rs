//! Fullscreen-triangle submissions: bloom pyramid steps and the tonemap

use ash::vk;

use crate::render::frame::FrameContext;
use crate::render::ubo::ShaderFeatures;

use super::{bind_sets, push_block, FullscreenPush, SubmitEnv};

/// Tent-filter radius of the bloom upsample, in source texels
const BLOOM_FILTER_RADIUS: f32 = 1.0;

fn texel_size(extent: vk::Extent2D) -> [f32; 2] {
    [1.0 / extent.width as f32, 1.0 / extent.height as f32]
}

/// One 13-tap downsample writing pyramid level `mip`
///
/// Level 0 reads the scene HDR target; deeper levels read the level above.
pub fn submit_bloom_down(env: &SubmitEnv, frame: &FrameContext, mip: u32) {
    let pipeline = &env.catalog.bloom_downsample;
    let (source_set, source_extent) = if mip == 0 {
        (env.bloom.scene_set(), frame.extent)
    } else {
        (env.bloom.mip_set(mip - 1), env.bloom.mip_extent(mip - 1))
    };
    pipeline.bind(frame.command_buffer, env.bloom.mip_extent(mip));
    bind_sets(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        0,
        &[source_set],
    );
    let texel = texel_size(source_extent);
    let push = FullscreenPush {
        params: [texel[0], texel[1], 0.0, 0.0],
    };
    push_block(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        vk::ShaderStageFlags::FRAGMENT,
        &push,
    );
    unsafe {
        env.context.device().cmd_draw(frame.command_buffer, 3, 1, 0, 0);
    }
}

/// One tent-filter upsample accumulating level `mip + 1` into `mip`
pub fn submit_bloom_up(env: &SubmitEnv, frame: &FrameContext, mip: u32) {
    let pipeline = &env.catalog.bloom_upsample;
    pipeline.bind(frame.command_buffer, env.bloom.mip_extent(mip));
    bind_sets(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        0,
        &[env.bloom.mip_set(mip + 1)],
    );
    let texel = texel_size(env.bloom.mip_extent(mip + 1));
    let push = FullscreenPush {
        params: [texel[0], texel[1], BLOOM_FILTER_RADIUS, 0.0],
    };
    push_block(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        vk::ShaderStageFlags::FRAGMENT,
        &push,
    );
    unsafe {
        env.context.device().cmd_draw(frame.command_buffer, 3, 1, 0, 0);
    }
}

/// Tonemap the HDR scene plus bloom into the swap image
pub fn submit_post(env: &SubmitEnv, frame: &FrameContext, exposure: f32, features: ShaderFeatures) {
    let pipeline = &env.catalog.post_process;
    pipeline.bind(frame.command_buffer, frame.extent);
    bind_sets(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        0,
        &[env.registry.post_set(frame.frame_index)],
    );
    let push = FullscreenPush {
        // feature bits travel through the float push block unchanged
        params: [
            exposure,
            f32::from_bits(features.bits()),
            0.0,
            0.0,
        ],
    };
    push_block(
        env.context,
        frame.command_buffer,
        pipeline.layout(),
        vk::ShaderStageFlags::FRAGMENT,
        &push,
    );
    unsafe {
        env.context.device().cmd_draw(frame.command_buffer, 3, 1, 0, 0);
    }
}
