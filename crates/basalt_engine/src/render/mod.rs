//! Rendering: the deferred Vulkan frame renderer
//!
//! The frame-facing surface is [`Renderer`]; everything else supports it.
//! `vulkan` holds the backend primitives (context, swap-chain, buffers,
//! images, descriptors, pipelines), `passes` the fixed render-pass graph,
//! `systems` the per-pipeline-variant draw submission, and `registry` the
//! per-frame descriptor orchestration.

pub mod camera;
pub mod frame;
pub mod instances;
pub mod material;
pub mod mesh;
pub mod passes;
pub mod pipelines;
pub mod registry;
pub mod renderer;
pub mod systems;
pub mod ubo;
pub mod vulkan;

pub use camera::Camera;
pub use frame::FrameContext;
pub use renderer::{RenderError, Renderer};
