//! Demo scene for the basalt deferred renderer
//!
//! Builds a small world — ground, orbiting cubes, a sky box, water, point
//! lights and a HUD sprite — and runs the frame loop until the window closes.

use std::error::Error;

use glfw::{Action, Key, WindowEvent};
use log::info;

use basalt_engine::ecs::components::{ShadowCascade, TransformNode};
use basalt_engine::foundation::math::Vec2;
use basalt_engine::foundation::time::Timer;
use basalt_engine::prelude::*;
use basalt_engine::render::material::MaterialMaps;
use basalt_engine::render::mesh::{self, Model, ModelHandle, Primitive, Vertex};
use basalt_engine::render::Renderer;
use basalt_engine::scene::InstanceSlot;

const INSTANCE_CAPACITY: u32 = 64;

fn main() -> Result<(), Box<dyn Error>> {
    basalt_engine::foundation::logging::init_with_default("info");

    let settings = RendererSettings::load_or_default("basalt.toml");
    let mut window = Window::new("basalt viewer", settings.width, settings.height)?;
    let mut renderer = Renderer::new(&mut window, &settings)?;

    let mut world = World::new();
    let mut graph = SceneGraph::new();
    let mut camera = Camera::perspective(
        Vec3::new(0.0, 4.0, 10.0),
        60.0_f32.to_radians(),
        renderer.aspect_ratio(),
        0.1,
        512.0,
    );
    camera.target = Vec3::new(0.0, 0.5, 0.0);

    let buffer = renderer.create_static_instances(INSTANCE_CAPACITY)?;
    let mut scene = SceneBuilder {
        renderer: &mut renderer,
        world: &mut world,
        graph: &mut graph,
        buffer,
    };

    let ground = scene.ground()?;
    let cubes = scene.cubes()?;
    scene.sky()?;
    scene.lights();
    scene.water();
    scene.hud()?;
    info!("Scene built: ground {ground:?}, {} cubes", cubes.len());

    let mut timer = Timer::new();
    while !window.should_close() {
        window.poll_events();
        let events: Vec<WindowEvent> = window.flush_events().map(|(_, e)| e).collect();
        for event in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                    window.set_should_close(true);
                }
                WindowEvent::FramebufferSize(..) => {
                    // the swap-chain notices on its own; just keep the
                    // projection in step once it has recreated
                    camera.set_aspect_ratio(renderer.aspect_ratio());
                }
                _ => {}
            }
        }

        timer.update();
        let dt = timer.delta_time();
        let elapsed = timer.total_time();

        // orbit the camera slowly and spin the cubes
        let angle = elapsed * 0.2;
        camera.position = Vec3::new(angle.cos() * 10.0, 4.0, angle.sin() * 10.0);
        for (i, &node) in cubes.iter().enumerate() {
            let phase = i as f32 * 2.1;
            let mut local = *graph.local(node);
            local.rotation.y = elapsed * 0.8 + phase;
            local.translation.y = 1.0 + (elapsed + phase).sin() * 0.4;
            graph.set_local(node, local);
        }

        renderer.render(&mut world, &mut graph, &camera, dt)?;
    }

    renderer.wait_idle()?;
    Ok(())
}

/// Everything needed to assemble demo entities
struct SceneBuilder<'a> {
    renderer: &'a mut Renderer,
    world: &'a mut World,
    graph: &'a mut SceneGraph,
    buffer: u32,
}

impl SceneBuilder<'_> {
    fn spawn_mesh(
        &mut self,
        model: ModelHandle,
        local: Transform,
        parent: Option<NodeId>,
    ) -> Result<NodeId, Box<dyn Error>> {
        let entity = self.world.spawn();
        let node = self.graph.add_node(parent, Some(entity), local);
        let slot: InstanceSlot = self
            .renderer
            .allocate_instance_slot(self.buffer, 0)
            .ok_or("instance buffer full")?;
        self.graph.set_instance_slot(node, slot);
        self.world.add_component(entity, TransformNode(node));
        self.world.add_component(
            entity,
            MeshRenderer {
                model,
                enabled: true,
            },
        );
        Ok(node)
    }

    fn ground(&mut self) -> Result<NodeId, Box<dyn Error>> {
        let material =
            self.renderer
                .create_pbr_material(MaterialMaps::default(), [0.25, 0.3, 0.25, 1.0])?;
        let model = mesh::unit_quad(
            self.renderer.context(),
            self.renderer.upload_pool(),
            vec![material],
        )?;
        let local = Transform {
            translation: Vec3::new(0.0, -1.0, 0.0),
            rotation: Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
            scale: Vec3::new(60.0, 60.0, 1.0),
        };
        self.spawn_mesh(ModelHandle::new(model), local, None)
    }

    fn cubes(&mut self) -> Result<Vec<NodeId>, Box<dyn Error>> {
        let colors = [
            [0.8, 0.3, 0.2, 1.0],
            [0.2, 0.6, 0.8, 1.0],
            [0.9, 0.8, 0.2, 1.0],
        ];
        let mut nodes = Vec::new();
        for (i, color) in colors.into_iter().enumerate() {
            let material = self.renderer.create_pbr_material(MaterialMaps::default(), color)?;
            let model = ModelHandle::new(cube_model(self.renderer, material)?);
            let local = Transform {
                translation: Vec3::new(i as f32 * 3.0 - 3.0, 1.0, 0.0),
                ..Transform::identity()
            };
            nodes.push(self.spawn_mesh(model, local, None)?);
        }
        // a small satellite under the middle cube shows hierarchy
        let material = self
            .renderer
            .create_pbr_material(MaterialMaps::default(), [0.9, 0.9, 0.95, 1.0])?;
        let model = ModelHandle::new(cube_model(self.renderer, material)?);
        let local = Transform {
            translation: Vec3::new(0.0, 1.5, 0.0),
            scale: Vec3::new(0.3, 0.3, 0.3),
            ..Transform::identity()
        };
        self.spawn_mesh(model, local, Some(nodes[1]))?;
        Ok(nodes)
    }

    fn sky(&mut self) -> Result<(), Box<dyn Error>> {
        let material = self.renderer.create_cubemap_material(None)?;
        let model = ModelHandle::new(cube_model(self.renderer, material)?);
        let entity = self.world.spawn();
        self.world.add_component(
            entity,
            MeshRenderer {
                model,
                enabled: true,
            },
        );
        self.world.add_component(entity, CubemapSky);
        Ok(())
    }

    fn lights(&mut self) {
        let sun = self.world.spawn();
        self.world.add_component(
            sun,
            DirectionalLight {
                direction: Vec3::new(-0.4, -1.0, -0.3),
                color: Vec3::new(1.0, 0.96, 0.9),
                intensity: 3.0,
                cascade: ShadowCascade::HiRes,
            },
        );
        let fill = self.world.spawn();
        self.world.add_component(
            fill,
            DirectionalLight {
                direction: Vec3::new(0.6, -1.0, 0.5),
                color: Vec3::new(0.4, 0.45, 0.6),
                intensity: 0.8,
                cascade: ShadowCascade::LoRes,
            },
        );

        for (position, color) in [
            (Vec3::new(-4.0, 2.0, 3.0), Vec3::new(1.0, 0.3, 0.2)),
            (Vec3::new(4.0, 2.0, -3.0), Vec3::new(0.2, 0.4, 1.0)),
        ] {
            let entity = self.world.spawn();
            let node = self
                .graph
                .add_node(None, Some(entity), Transform::from_translation(position));
            self.world.add_component(entity, TransformNode(node));
            self.world.add_component(
                entity,
                PointLight {
                    color,
                    intensity: 8.0,
                    radius: 6.0,
                },
            );
        }
    }

    fn water(&mut self) {
        let entity = self.world.spawn();
        self.world.add_component(entity, WaterSurface { height: -0.5 });
    }

    fn hud(&mut self) -> Result<(), Box<dyn Error>> {
        let material = self
            .renderer
            .create_diffuse_material(MaterialMaps::default(), [1.0, 1.0, 1.0, 0.8])?;
        let model = mesh::unit_quad(
            self.renderer.context(),
            self.renderer.upload_pool(),
            vec![material],
        )?;
        let entity = self.world.spawn();
        let node = self.graph.add_node(
            None,
            Some(entity),
            Transform::from_translation(Vec3::new(48.0, 48.0, 0.0)),
        );
        self.world.add_component(entity, TransformNode(node));
        self.world.add_component(
            entity,
            MeshRenderer {
                model: ModelHandle::new(model),
                enabled: true,
            },
        );
        self.world.add_component(
            entity,
            SpriteRenderer2D {
                size: Vec2::new(64.0, 64.0),
                tint: [1.0, 1.0, 1.0, 0.8],
                layer: 0,
                sheet_cell: 0,
            },
        );
        Ok(())
    }
}

/// Axis-aligned unit cube with per-face normals
fn cube_model(
    renderer: &Renderer,
    material: basalt_engine::render::material::MaterialDescriptor,
) -> Result<Model, Box<dyn Error>> {
    // (normal, tangent, four corners)
    let faces: [([f32; 3], [f32; 4], [[f32; 3]; 4]); 6] = [
        (
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 1.0],
            [
                [-0.5, -0.5, 0.5],
                [0.5, -0.5, 0.5],
                [0.5, 0.5, 0.5],
                [-0.5, 0.5, 0.5],
            ],
        ),
        (
            [0.0, 0.0, -1.0],
            [-1.0, 0.0, 0.0, 1.0],
            [
                [0.5, -0.5, -0.5],
                [-0.5, -0.5, -0.5],
                [-0.5, 0.5, -0.5],
                [0.5, 0.5, -0.5],
            ],
        ),
        (
            [1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0, 1.0],
            [
                [0.5, -0.5, 0.5],
                [0.5, -0.5, -0.5],
                [0.5, 0.5, -0.5],
                [0.5, 0.5, 0.5],
            ],
        ),
        (
            [-1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 1.0],
            [
                [-0.5, -0.5, -0.5],
                [-0.5, -0.5, 0.5],
                [-0.5, 0.5, 0.5],
                [-0.5, 0.5, -0.5],
            ],
        ),
        (
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0, 1.0],
            [
                [-0.5, 0.5, 0.5],
                [0.5, 0.5, 0.5],
                [0.5, 0.5, -0.5],
                [-0.5, 0.5, -0.5],
            ],
        ),
        (
            [0.0, -1.0, 0.0],
            [1.0, 0.0, 0.0, 1.0],
            [
                [-0.5, -0.5, -0.5],
                [0.5, -0.5, -0.5],
                [0.5, -0.5, 0.5],
                [-0.5, -0.5, 0.5],
            ],
        ),
    ];
    let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, tangent, corners) in faces {
        let base = vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(uvs) {
            vertices.push(Vertex {
                position: corner,
                normal,
                uv,
                tangent,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    let primitives = vec![Primitive {
        index_offset: 0,
        index_count: indices.len() as u32,
        material_index: 0,
    }];
    Ok(Model::from_vertices(
        renderer.context(),
        renderer.upload_pool(),
        &vertices,
        &indices,
        primitives,
        vec![material],
    )?)
}
