//! # Basalt Engine
//!
//! A deferred Vulkan frame renderer driven by an entity-component scene graph.
//!
//! The crate owns the per-frame GPU orchestration: swap-chain lifecycle, the
//! fixed render-pass graph (shadow cascades, water reflection/refraction, the
//! three-subpass deferred 3D pass, bloom and post-processing), descriptor-set
//! and uniform-ring management, and the transform-cache propagation that feeds
//! draw submission. Asset parsing, input, audio and game logic are external
//! collaborators; the renderer consumes their finished outputs only.
//!
//! ## Frame shape
//!
//! ```text
//! begin_frame -> shadows (hi/lo cascade) -> water (refraction, reflection)
//!             -> 3D (g-buffer / lighting / transparency) -> bloom -> post -> gui
//!             -> end_frame (submit + present)
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use basalt_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     basalt_engine::foundation::logging::init();
//!     let settings = RendererSettings::default();
//!     let mut window = Window::new("basalt", settings.width, settings.height)?;
//!     let mut renderer = Renderer::new(&mut window, &settings)?;
//!     let mut world = World::new();
//!     let mut graph = SceneGraph::new();
//!     let camera = Camera::perspective(
//!         Vec3::new(0.0, 3.0, 8.0),
//!         60.0_f32.to_radians(),
//!         16.0 / 9.0,
//!         0.1,
//!         512.0,
//!     );
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.render(&mut world, &mut graph, &camera, 1.0 / 60.0)?;
//!     }
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod scene;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::RendererSettings,
        ecs::{Entity, World},
        ecs::components::{
            CubemapSky, DirectionalLight, GrassField, MeshRenderer, PointLight,
            SpriteRenderer2D, SpriteRenderer3D, WaterSurface,
        },
        foundation::math::{Mat4, Transform, Vec3},
        render::{Camera, Renderer, RenderError},
        render::vulkan::Window,
        scene::{NodeId, SceneGraph},
    };
}
