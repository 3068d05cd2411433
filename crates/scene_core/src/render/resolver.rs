//! Render state inheritance
//!
//! Resolution keeps one stack per [`StateType`]. Walking down the tree, each
//! spatial pushes its own overrides, the effective state for every type is
//! extracted from the current stack (the spatial itself counts as nearest),
//! children are visited with the extended stacks, and exactly the pushed
//! types are popped again on the way back.
//!
//! How a stack collapses into one effective state is a per-type
//! [`StateExtractor`]. The default keeps the nearest override; blend and
//! light states combine with their ancestors.

use super::state::{BlendState, LightState, RenderState, StateType};
use crate::foundation::collections::SpatialKey;
use crate::scene::{LightCombineMode, SceneGraph, Spatial};
use std::sync::Arc;

/// Collapse an ancestor stack (root first, nearest last) into the effective
/// state for `spatial`. Only called with a non-empty stack.
pub type StateExtractor = fn(&[Arc<RenderState>], &SceneGraph, SpatialKey) -> Arc<RenderState>;

/// Effective states of one spatial, indexed by [`StateType::index`]
pub type ResolvedStates = [Arc<RenderState>; StateType::COUNT];

/// Per-type override stacks used during resolution
#[derive(Debug, Default, Clone)]
pub struct StateStacks {
    stacks: [Vec<Arc<RenderState>>; StateType::COUNT],
}

impl StateStacks {
    /// Empty stacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a state onto the stack of its type
    pub fn push(&mut self, state: Arc<RenderState>) {
        self.stacks[state.state_type().index()].push(state);
    }

    /// Pop the nearest state of `state_type`
    pub fn pop(&mut self, state_type: StateType) -> Option<Arc<RenderState>> {
        self.stacks[state_type.index()].pop()
    }

    /// Current stack for `state_type`, root first
    pub fn stack(&self, state_type: StateType) -> &[Arc<RenderState>] {
        &self.stacks[state_type.index()]
    }

    /// Whether every stack is empty
    pub fn is_empty(&self) -> bool {
        self.stacks.iter().all(Vec::is_empty)
    }

    /// Push every override of `spatial`, returning the types pushed
    pub(crate) fn push_overrides(&mut self, spatial: &Spatial) -> Vec<StateType> {
        let mut pushed = Vec::new();
        for state_type in StateType::ALL {
            if let Some(state) = spatial.render_state_override(state_type) {
                self.push(Arc::clone(state));
                pushed.push(state_type);
            }
        }
        pushed
    }

    /// Pop exactly the types returned by [`StateStacks::push_overrides`]
    pub(crate) fn pop_pushed(&mut self, pushed: &[StateType]) {
        for state_type in pushed.iter().rev() {
            self.pop(*state_type);
        }
    }
}

/// Table of extractors, one per state type
#[derive(Clone)]
pub struct RenderStateResolver {
    extractors: [StateExtractor; StateType::COUNT],
}

impl Default for RenderStateResolver {
    fn default() -> Self {
        let mut extractors: [StateExtractor; StateType::COUNT] = [nearest_wins; StateType::COUNT];
        extractors[StateType::Blend.index()] = combine_blend;
        extractors[StateType::Light.index()] = combine_lights;
        Self { extractors }
    }
}

impl std::fmt::Debug for RenderStateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderStateResolver").finish_non_exhaustive()
    }
}

impl RenderStateResolver {
    /// Resolver with the default extractors
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the extractor for one type
    pub fn set_extractor(&mut self, state_type: StateType, extractor: StateExtractor) {
        self.extractors[state_type.index()] = extractor;
    }

    /// Extractor currently used for `state_type`
    pub fn extractor(&self, state_type: StateType) -> StateExtractor {
        self.extractors[state_type.index()]
    }

    /// Effective state of one type; an empty stack yields the type's default
    pub fn extract(
        &self,
        state_type: StateType,
        stacks: &StateStacks,
        graph: &SceneGraph,
        spatial: SpatialKey,
    ) -> Arc<RenderState> {
        let stack = stacks.stack(state_type);
        if stack.is_empty() {
            RenderState::default_for(state_type)
        } else {
            (self.extractors[state_type.index()])(stack, graph, spatial)
        }
    }

    /// Effective states of every type
    pub fn resolve(
        &self,
        stacks: &StateStacks,
        graph: &SceneGraph,
        spatial: SpatialKey,
    ) -> ResolvedStates {
        std::array::from_fn(|i| self.extract(StateType::ALL[i], stacks, graph, spatial))
    }
}

/// Nearest override wins
pub fn nearest_wins(
    stack: &[Arc<RenderState>],
    _graph: &SceneGraph,
    _spatial: SpatialKey,
) -> Arc<RenderState> {
    match stack.last() {
        Some(state) => Arc::clone(state),
        None => RenderState::default_for(StateType::Cull),
    }
}

/// Nearest blend toggle, with parameters from the nearest state that sets them
pub fn combine_blend(
    stack: &[Arc<RenderState>],
    _graph: &SceneGraph,
    _spatial: SpatialKey,
) -> Arc<RenderState> {
    let Some(nearest) = stack.last() else {
        return RenderState::default_for(StateType::Blend);
    };
    let Some(toggle) = nearest.as_blend() else {
        return Arc::clone(nearest);
    };
    if toggle.params.is_some() {
        return Arc::clone(nearest);
    }

    let params = stack
        .iter()
        .rev()
        .filter_map(|state| state.as_blend())
        .find_map(|blend| blend.params);
    if params.is_none() {
        return Arc::clone(nearest);
    }
    Arc::new(RenderState::Blend(BlendState {
        enabled: toggle.enabled,
        params,
    }))
}

/// Accumulate lights according to the spatial's effective light combine mode
///
/// Disabled states never contribute lights. `CombineClosestEnabled` stops at
/// the first disabled state walking up from the spatial.
pub fn combine_lights(
    stack: &[Arc<RenderState>],
    graph: &SceneGraph,
    spatial: SpatialKey,
) -> Arc<RenderState> {
    let states = || stack.iter().filter_map(|state| state.as_light());

    let mut combined = LightState::default();
    match graph.light_combine_mode(spatial) {
        LightCombineMode::Off => {}
        LightCombineMode::Replace => {
            if let Some(nearest) = states().last() {
                combined = nearest.clone();
            }
        }
        LightCombineMode::CombineFirst => {
            for state in states().filter(|s| s.enabled) {
                combined.lights.extend(state.lights.iter().cloned());
            }
        }
        LightCombineMode::CombineClosest | LightCombineMode::Inherit => {
            for state in states().rev().filter(|s| s.enabled) {
                combined.lights.extend(state.lights.iter().cloned());
            }
        }
        LightCombineMode::CombineClosestEnabled => {
            for state in states().rev() {
                if !state.enabled {
                    break;
                }
                combined.lights.extend(state.lights.iter().cloned());
            }
        }
    }
    combined.enabled = combined.enabled || !combined.lights.is_empty();
    Arc::new(RenderState::Light(combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::state::{BlendFactor, BlendParams, CullFace, CullState};

    fn cull(face: CullFace) -> Arc<RenderState> {
        Arc::new(RenderState::Cull(CullState::new(face)))
    }

    #[test]
    fn test_push_and_pop_pushed_balance() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("node");
        graph.set_render_state(node, CullState::new(CullFace::Back)).unwrap();

        let mut stacks = StateStacks::new();
        let pushed = stacks.push_overrides(graph.spatial(node).unwrap());
        assert_eq!(pushed, vec![StateType::Cull]);
        assert_eq!(stacks.stack(StateType::Cull).len(), 1);

        stacks.pop_pushed(&pushed);
        assert!(stacks.is_empty());
    }

    #[test]
    fn test_empty_stack_yields_default() {
        let graph = SceneGraph::new();
        let resolver = RenderStateResolver::new();
        let key = SpatialKey::default();
        let state = resolver.extract(StateType::ZBuffer, &StateStacks::new(), &graph, key);
        assert!(Arc::ptr_eq(&state, &RenderState::default_for(StateType::ZBuffer)));
    }

    #[test]
    fn test_nearest_wins() {
        let graph = SceneGraph::new();
        let stack = [cull(CullFace::Front), cull(CullFace::Back)];
        let state = nearest_wins(&stack, &graph, SpatialKey::default());
        assert_eq!(state.as_cull().map(|c| c.face), Some(CullFace::Back));
    }

    #[test]
    fn test_blend_toggle_inherits_params() {
        let graph = SceneGraph::new();
        let params = BlendParams {
            source: BlendFactor::One,
            destination: BlendFactor::One,
        };
        let stack = [
            Arc::new(RenderState::Blend(BlendState { enabled: false, params: Some(params) })),
            Arc::new(RenderState::Blend(BlendState { enabled: true, params: None })),
        ];
        let state = combine_blend(&stack, &graph, SpatialKey::default());
        let blend = state.as_blend().unwrap();
        assert!(blend.enabled);
        assert_eq!(blend.params, Some(params));
    }

    #[test]
    fn test_custom_extractor_replaces_default() {
        fn always_front(_: &[Arc<RenderState>], _: &SceneGraph, _: SpatialKey) -> Arc<RenderState> {
            Arc::new(RenderState::Cull(CullState::new(CullFace::Front)))
        }

        let graph = SceneGraph::new();
        let mut resolver = RenderStateResolver::new();
        resolver.set_extractor(StateType::Cull, always_front);

        let mut stacks = StateStacks::new();
        stacks.push(cull(CullFace::Back));
        let state = resolver.extract(StateType::Cull, &stacks, &graph, SpatialKey::default());
        assert_eq!(state.as_cull().map(|c| c.face), Some(CullFace::Front));
    }
}
