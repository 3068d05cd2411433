use crate::foundation::math::{ColorRgba, Point3, Vec3};
use crate::render::state::{
    BlendFactor, BlendParams, BlendState, CullFace, CullState, Light, LightState, ZBufferState,
};
use crate::render::{RenderState, StateStacks, StateType};
use crate::scene::{LightCombineMode, SceneGraph};
use std::sync::Arc;

#[test]
fn test_nearest_cull_override_wins() {
    let mut graph = SceneGraph::new();
    let a = graph.create_node("A");
    let between = graph.create_node("between");
    let b = graph.create_node("B");
    graph.attach_child(a, between).unwrap();
    graph.attach_child(between, b).unwrap();
    graph.set_render_state(a, CullState::new(CullFace::Front)).unwrap();
    graph.set_render_state(b, CullState::new(CullFace::Back)).unwrap();
    graph.update_geometric_state(a, 0.0).unwrap();

    let face =
        |key| graph.spatial(key).unwrap().render_state(StateType::Cull).as_cull().unwrap().face;
    assert_eq!(face(b), CullFace::Back);
    assert_eq!(face(between), CullFace::Front);
    assert_eq!(face(a), CullFace::Front);
}

#[test]
fn test_unset_types_resolve_to_defaults() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node("root");
    graph.update_geometric_state(root, 0.0).unwrap();

    let spatial = graph.spatial(root).unwrap();
    for state_type in StateType::ALL {
        assert_eq!(*spatial.render_state(state_type), *RenderState::default_for(state_type));
    }
}

#[test]
fn test_shared_override_is_not_copied() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node("root");
    let leaf = graph.create_node("leaf");
    graph.attach_child(root, leaf).unwrap();
    let shared = Arc::new(RenderState::from(ZBufferState::default()));
    graph.set_shared_render_state(root, Arc::clone(&shared)).unwrap();
    graph.update_geometric_state(root, 0.0).unwrap();

    let resolved = graph.spatial(leaf).unwrap().render_state(StateType::ZBuffer);
    assert!(Arc::ptr_eq(&resolved, &shared));
}

#[test]
fn test_override_change_reaches_descendants_only_after_update() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node("root");
    let leaf = graph.create_node("leaf");
    graph.attach_child(root, leaf).unwrap();
    graph.set_render_state(root, CullState::new(CullFace::Front)).unwrap();
    graph.update_geometric_state(root, 0.0).unwrap();

    let previous = graph.set_render_state(root, CullState::new(CullFace::FrontAndBack)).unwrap();
    assert_eq!(previous.unwrap().as_cull().unwrap().face, CullFace::Front);
    let face = |graph: &SceneGraph| {
        graph.spatial(leaf).unwrap().render_state(StateType::Cull).as_cull().unwrap().face
    };
    assert_eq!(face(&graph), CullFace::Front);
    graph.update_geometric_state(root, 0.0).unwrap();
    assert_eq!(face(&graph), CullFace::FrontAndBack);

    graph.clear_render_state(root, StateType::Cull).unwrap();
    graph.update_geometric_state(root, 0.0).unwrap();
    assert_eq!(
        *graph.spatial(leaf).unwrap().render_state(StateType::Cull),
        *RenderState::default_for(StateType::Cull)
    );
}

#[test]
fn test_blend_toggle_keeps_ancestor_params() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node("root");
    let leaf = graph.create_node("leaf");
    graph.attach_child(root, leaf).unwrap();
    let params = BlendParams {
        source: BlendFactor::SourceAlpha,
        destination: BlendFactor::OneMinusSourceAlpha,
    };
    graph
        .set_render_state(root, BlendState { enabled: true, params: Some(params) })
        .unwrap();
    graph
        .set_render_state(leaf, BlendState { enabled: false, params: None })
        .unwrap();
    graph.update_geometric_state(root, 0.0).unwrap();

    let resolved = graph.spatial(leaf).unwrap().render_state(StateType::Blend);
    let blend = resolved.as_blend().unwrap();
    assert!(!blend.enabled);
    assert_eq!(blend.params, Some(params));
}

#[test]
fn test_light_combine_modes() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node("root");
    let leaf = graph.create_node("leaf");
    graph.attach_child(root, leaf).unwrap();

    let sun = Light::directional(Vec3::new(0.0, -1.0, 0.0), ColorRgba::WHITE);
    let lamp = Light::point(Point3::new(0.0, 2.0, 0.0), 5.0, ColorRgba::WHITE);
    graph
        .set_render_state(root, RenderState::Light(LightState::with_lights(vec![sun.clone()])))
        .unwrap();
    graph
        .set_render_state(leaf, RenderState::Light(LightState::with_lights(vec![lamp.clone()])))
        .unwrap();

    let lights = |graph: &mut SceneGraph, mode| {
        graph.set_light_combine_mode(leaf, mode).unwrap();
        graph.update_geometric_state(root, 0.0).unwrap();
        let state = graph.spatial(leaf).unwrap().render_state(StateType::Light);
        state.as_light().unwrap().lights.clone()
    };

    assert_eq!(lights(&mut graph, LightCombineMode::CombineFirst), vec![sun.clone(), lamp.clone()]);
    assert_eq!(
        lights(&mut graph, LightCombineMode::CombineClosest),
        vec![lamp.clone(), sun.clone()]
    );
    assert_eq!(lights(&mut graph, LightCombineMode::Replace), vec![lamp.clone()]);
    assert!(lights(&mut graph, LightCombineMode::Off).is_empty());
}

#[test]
fn test_resolution_from_supplied_stacks_leaves_them_balanced() {
    let mut graph = SceneGraph::new();
    let root = graph.create_node("root");
    let mid = graph.create_node("mid");
    let leaf = graph.create_node("leaf");
    graph.attach_child(root, mid).unwrap();
    graph.attach_child(mid, leaf).unwrap();
    graph.set_render_state(root, CullState::new(CullFace::Front)).unwrap();
    graph.set_render_state(mid, ZBufferState::default()).unwrap();

    let mut stacks = StateStacks::new();
    stacks.push_overrides(graph.spatial(root).unwrap());
    let before: Vec<usize> = StateType::ALL.iter().map(|&t| stacks.stack(t).len()).collect();
    graph.update_world_render_states_with(mid, true, &mut stacks).unwrap();
    let after: Vec<usize> = StateType::ALL.iter().map(|&t| stacks.stack(t).len()).collect();
    assert_eq!(before, after);

    let face = graph.spatial(leaf).unwrap().render_state(StateType::Cull).as_cull().unwrap().face;
    assert_eq!(face, CullFace::Front);
}
