//! Scene graph demo
//!
//! Builds a small scene, runs a few frames with one update thread and two
//! render threads (one context each), then destroys part of the scene and
//! shows its GPU ids being deleted on the right context.
//!
//! Pass a `.toml` or `.ron` config path as the first argument to override
//! the defaults.

use log::{error, info, warn};
use parking_lot::RwLock;
use scene_core::bounding::BoundingBox;
use scene_core::buffer::{BufferRegistry, IndexBufferData};
use scene_core::config::{Config, SceneConfig};
use scene_core::foundation::logging;
use scene_core::prelude::*;
use scene_core::render::state::{CullFace, CullState, Light, LightState, ZBufferState};
use std::sync::{Arc, Barrier};
use std::thread;

const FRAMES: usize = 6;
const TEARDOWN_FRAME: usize = 4;
const FRAME_TIME: f64 = 1.0 / 60.0;

struct DemoScene {
    root: SpatialKey,
    ring: SpatialKey,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SceneConfig::load_from_file(&path)?,
        None => SceneConfig::default(),
    };
    config.validate()?;
    logging::init_with_level(&config.engine.log_level);

    let tasks = Arc::new(TaskQueueManager::new(config.tasks.clone()));
    let registry = Arc::new(BufferRegistry::new(Arc::clone(&tasks)));
    let scene = RwLock::new(SceneGraph::with_config(config.render.clone()));
    let demo = build_scene(&mut scene.write())?;
    info!("Scene built with {} spatials", scene.read().len());

    let barrier = Barrier::new(3);
    let deleted: Vec<usize> = thread::scope(|s| {
        let renderers: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|name| {
                let (scene, registry, barrier) = (&scene, &registry, &barrier);
                s.spawn(move || render_loop(name, scene, registry, barrier, demo.root))
            })
            .collect();

        update_loop(&scene, &registry, &barrier, &demo);
        renderers.into_iter().map(|handle| handle.join().unwrap_or(0)).collect()
    });
    info!("Render threads deleted {:?} buffer ids", deleted);

    // Nobody renders into these contexts any more: whatever is still queued
    // is never freed.
    let released = registry.clean_all(None);
    for context in tasks.contexts() {
        let abandoned = tasks.remove_context(context);
        if abandoned > 0 {
            warn!("Context {:?} dropped {} pending tasks", context, abandoned);
        }
    }
    info!("Released {} ids at shutdown, {} buffers still tracked", released, registry.live_count());
    Ok(())
}

fn quad(name: &str, size: f32) -> (String, MeshData) {
    let mut data = MeshData::from_vertices(vec![
        -size, -size, 0.0, //
        size, -size, 0.0, //
        size, size, 0.0, //
        -size, size, 0.0,
    ]);
    data.set_indices(Some(IndexBufferData::new(vec![0, 1, 2, 0, 2, 3], 1)));
    data.set_solid_color(ColorRgba::WHITE);
    (name.to_string(), data)
}

fn build_scene(scene: &mut SceneGraph) -> SceneResult<DemoScene> {
    let root = scene.create_node("root");
    scene.set_render_state(root, ZBufferState::default())?;
    scene.set_render_state(
        root,
        RenderState::Light(LightState::with_lights(vec![
            Light::directional(Vec3::new(-0.3, -1.0, -0.2), ColorRgba::WHITE),
            Light::point(Point3::new(0.0, 4.0, 0.0), 12.0, ColorRgba::WHITE),
        ])),
    )?;

    let ring = scene.create_node("ring");
    scene.attach_child(root, ring)?;
    scene.spatial_mut(ring)?.set_data_mode(DataMode::Vbo);
    scene.add_controller(
        ring,
        FnController::new(|time, scene: &mut SceneGraph, target| {
            let angle = time as f32 * 0.5;
            if let Ok(spatial) = scene.spatial(target) {
                let rotation = Quat::from_axis_angle(&Vec3::y_axis(), angle)
                    * spatial.local_transform().rotation;
                if let Err(err) = scene.set_rotation(target, rotation) {
                    error!("Ring controller failed: {}", err);
                }
            }
        }),
    )?;

    for i in 0..4 {
        let (name, data) = quad(&format!("panel{i}"), 0.5);
        let panel = scene.create_mesh(name, data);
        let angle = i as f32 * std::f32::consts::FRAC_PI_2;
        scene.set_translation(panel, Vec3::new(3.0 * angle.cos(), 0.0, 3.0 * angle.sin()))?;
        scene.attach_child(ring, panel)?;
    }
    let culled = scene.child_named(ring, "panel0").unwrap_or(ring);
    scene.set_render_state(culled, CullState::new(CullFace::Back))?;

    let (name, data) = quad("floor", 6.0);
    let floor = scene.create_mesh(name, data);
    let flat = Quat::from_axis_angle(&Vec3::x_axis(), -std::f32::consts::FRAC_PI_2);
    scene.set_rotation(floor, flat)?;
    scene.spatial_mut(floor)?.set_data_mode(DataMode::VboInterleaved);
    scene.attach_child(root, floor)?;

    let (name, data) = quad("far_away", 1.0);
    let far = scene.create_mesh(name, data);
    scene.set_translation(far, Vec3::new(0.0, 0.0, -500.0))?;
    scene.attach_child(root, far)?;

    Ok(DemoScene { root, ring })
}

fn update_loop(
    scene: &RwLock<SceneGraph>,
    registry: &BufferRegistry,
    barrier: &Barrier,
    demo: &DemoScene,
) {
    for frame in 0..FRAMES {
        {
            let mut scene = scene.write();
            if frame == TEARDOWN_FRAME {
                match scene.destroy(demo.ring) {
                    Ok(removed) => info!("Frame {}: destroyed ring ({} spatials)", frame, removed),
                    Err(err) => error!("Frame {}: {}", frame, err),
                }
                let queued = registry.clean_expired(None);
                info!("Frame {}: queued {} expired ids for deletion", frame, queued);
            }
            if let Err(err) = scene.update_geometric_state(demo.root, FRAME_TIME) {
                error!("Frame {}: update failed: {}", frame, err);
            }
        }
        // Update done, render threads may draw
        barrier.wait();
        // Render threads done
        barrier.wait();
    }
}

fn render_loop(
    name: &str,
    scene: &RwLock<SceneGraph>,
    registry: &Arc<BufferRegistry>,
    barrier: &Barrier,
    root: SpatialKey,
) -> usize {
    let mut renderer = HeadlessRenderer::new(Arc::clone(registry));
    renderer.set_view_volume(Some(BoundingBox::new(
        Point3::new(-20.0, -20.0, -20.0),
        Point3::new(20.0, 20.0, 20.0),
    )));

    for frame in 0..FRAMES {
        barrier.wait();
        renderer.clear_frame();
        if let Err(err) = scene.read().draw(root, &mut renderer) {
            error!("[{}] frame {}: draw failed: {}", name, frame, err);
        }
        let executed = renderer.execute_tasks();
        info!(
            "[{}] frame {}: {} draws, {} uploads, {} tasks run",
            name,
            frame,
            renderer.draws().len(),
            renderer.uploads(),
            executed
        );
        barrier.wait();
    }
    renderer.deleted_ids().len()
}
