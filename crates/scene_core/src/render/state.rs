//! Render states
//!
//! A closed set of fixed-function states. A spatial overrides at most one
//! state per [`StateType`]; anything it does not override is inherited from
//! the nearest ancestor, or falls back to [`RenderState::default_for`].

use crate::foundation::math::{ColorRgba, Point3, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Render state categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateType {
    /// Face culling
    Cull,
    /// Alpha blending
    Blend,
    /// Depth testing and writing
    ZBuffer,
    /// Line rasterization
    Wireframe,
    /// Surface material
    Material,
    /// Lights affecting the geometry
    Light,
}

impl StateType {
    /// Number of state types
    pub const COUNT: usize = 6;

    /// Every state type, in application order
    pub const ALL: [StateType; Self::COUNT] = [
        StateType::Cull,
        StateType::Blend,
        StateType::ZBuffer,
        StateType::Wireframe,
        StateType::Material,
        StateType::Light,
    ];

    /// Dense index used by per-type tables
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Which faces are culled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullFace {
    /// Draw every face
    #[default]
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
    /// Cull everything
    FrontAndBack,
}

/// Face culling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CullState {
    /// Whether culling is active
    pub enabled: bool,
    /// Faces culled when active
    pub face: CullFace,
}

impl CullState {
    /// Enabled state culling `face`
    pub fn new(face: CullFace) -> Self {
        Self { enabled: true, face }
    }
}

impl Default for CullState {
    fn default() -> Self {
        Self::new(CullFace::None)
    }
}

/// Blend equation factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SourceColor,
    OneMinusSourceColor,
    SourceAlpha,
    OneMinusSourceAlpha,
    DestinationAlpha,
    OneMinusDestinationAlpha,
}

/// Source and destination factors of a blend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendParams {
    /// Factor applied to the incoming fragment
    pub source: BlendFactor,
    /// Factor applied to the framebuffer
    pub destination: BlendFactor,
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            source: BlendFactor::SourceAlpha,
            destination: BlendFactor::OneMinusSourceAlpha,
        }
    }
}

/// Alpha blending state
///
/// A blend state may only toggle blending and leave `params` unset, in which
/// case the nearest ancestor's parameters apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendState {
    /// Whether blending is active
    pub enabled: bool,
    /// Blend factors, inherited when `None`
    pub params: Option<BlendParams>,
}

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TestFunction {
    Never,
    Less,
    #[default]
    LessOrEqual,
    Equal,
    Greater,
    GreaterOrEqual,
    NotEqual,
    Always,
}

/// Depth buffer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZBufferState {
    /// Whether depth testing is active
    pub enabled: bool,
    /// Whether depth values are written
    pub writable: bool,
    /// Comparison used when testing
    pub function: TestFunction,
}

impl Default for ZBufferState {
    fn default() -> Self {
        Self {
            enabled: true,
            writable: true,
            function: TestFunction::LessOrEqual,
        }
    }
}

/// Line rendering of polygons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireframeState {
    /// Whether polygons are drawn as lines
    pub enabled: bool,
    /// Line width in pixels
    pub line_width: f32,
}

impl Default for WireframeState {
    fn default() -> Self {
        Self {
            enabled: false,
            line_width: 1.0,
        }
    }
}

/// Fixed-function surface material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialState {
    /// Whether the material is applied
    pub enabled: bool,
    /// Ambient reflectance
    pub ambient: ColorRgba,
    /// Diffuse reflectance
    pub diffuse: ColorRgba,
    /// Specular reflectance
    pub specular: ColorRgba,
    /// Emitted light
    pub emissive: ColorRgba,
    /// Specular exponent
    pub shininess: f32,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            enabled: true,
            ambient: ColorRgba::new(0.2, 0.2, 0.2, 1.0),
            diffuse: ColorRgba::new(0.8, 0.8, 0.8, 1.0),
            specular: ColorRgba::BLACK,
            emissive: ColorRgba::BLACK,
            shininess: 0.0,
        }
    }
}

/// Shape of a light source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Infinitely distant light
    Directional {
        /// Direction the light travels in
        direction: Vec3,
    },
    /// Omnidirectional light at a position
    Point {
        /// World position
        position: Point3,
        /// Distance at which the light no longer contributes
        range: f32,
    },
}

/// A single light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Light shape
    pub kind: LightKind,
    /// Emitted color
    pub color: ColorRgba,
    /// Disabled lights are kept but contribute nothing
    pub enabled: bool,
}

impl Light {
    /// Create an enabled directional light
    pub fn directional(direction: Vec3, color: ColorRgba) -> Self {
        Self {
            kind: LightKind::Directional { direction },
            color,
            enabled: true,
        }
    }

    /// Create an enabled point light
    pub fn point(position: Point3, range: f32, color: ColorRgba) -> Self {
        Self {
            kind: LightKind::Point { position, range },
            color,
            enabled: true,
        }
    }

    /// Distance from `at` used to rank lights; directional lights rank first
    pub fn distance_to(&self, at: &Point3) -> f32 {
        match &self.kind {
            LightKind::Directional { .. } => f32::NEG_INFINITY,
            LightKind::Point { position, .. } => (position - at).magnitude(),
        }
    }
}

/// Set of lights, combined along the hierarchy according to the
/// spatial's light combine mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    /// Whether lighting is active
    pub enabled: bool,
    /// Lights in this state
    pub lights: Vec<Light>,
}

impl LightState {
    /// Enabled state holding `lights`
    pub fn with_lights(lights: Vec<Light>) -> Self {
        Self { enabled: true, lights }
    }
}

/// One render state of any type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum RenderState {
    Cull(CullState),
    Blend(BlendState),
    ZBuffer(ZBufferState),
    Wireframe(WireframeState),
    Material(MaterialState),
    Light(LightState),
}

static DEFAULT_STATES: OnceLock<[Arc<RenderState>; StateType::COUNT]> = OnceLock::new();

impl RenderState {
    /// Category of this state
    pub fn state_type(&self) -> StateType {
        match self {
            RenderState::Cull(_) => StateType::Cull,
            RenderState::Blend(_) => StateType::Blend,
            RenderState::ZBuffer(_) => StateType::ZBuffer,
            RenderState::Wireframe(_) => StateType::Wireframe,
            RenderState::Material(_) => StateType::Material,
            RenderState::Light(_) => StateType::Light,
        }
    }

    /// Whether the state is active
    pub fn is_enabled(&self) -> bool {
        match self {
            RenderState::Cull(s) => s.enabled,
            RenderState::Blend(s) => s.enabled,
            RenderState::ZBuffer(s) => s.enabled,
            RenderState::Wireframe(s) => s.enabled,
            RenderState::Material(s) => s.enabled,
            RenderState::Light(s) => s.enabled,
        }
    }

    /// State used when nothing on the path to the root overrides `state_type`
    pub fn default_for(state_type: StateType) -> Arc<RenderState> {
        let defaults = DEFAULT_STATES.get_or_init(|| {
            [
                Arc::new(RenderState::Cull(CullState::default())),
                Arc::new(RenderState::Blend(BlendState::default())),
                Arc::new(RenderState::ZBuffer(ZBufferState::default())),
                Arc::new(RenderState::Wireframe(WireframeState::default())),
                Arc::new(RenderState::Material(MaterialState::default())),
                Arc::new(RenderState::Light(LightState::default())),
            ]
        });
        Arc::clone(&defaults[state_type.index()])
    }

    /// Cull state, if this is one
    pub fn as_cull(&self) -> Option<&CullState> {
        match self {
            RenderState::Cull(s) => Some(s),
            _ => None,
        }
    }

    /// Blend state, if this is one
    pub fn as_blend(&self) -> Option<&BlendState> {
        match self {
            RenderState::Blend(s) => Some(s),
            _ => None,
        }
    }

    /// Depth state, if this is one
    pub fn as_zbuffer(&self) -> Option<&ZBufferState> {
        match self {
            RenderState::ZBuffer(s) => Some(s),
            _ => None,
        }
    }

    /// Wireframe state, if this is one
    pub fn as_wireframe(&self) -> Option<&WireframeState> {
        match self {
            RenderState::Wireframe(s) => Some(s),
            _ => None,
        }
    }

    /// Material state, if this is one
    pub fn as_material(&self) -> Option<&MaterialState> {
        match self {
            RenderState::Material(s) => Some(s),
            _ => None,
        }
    }

    /// Light state, if this is one
    pub fn as_light(&self) -> Option<&LightState> {
        match self {
            RenderState::Light(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_from_state {
    ($($state:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$state> for RenderState {
                fn from(state: $state) -> Self {
                    RenderState::$variant(state)
                }
            }
        )*
    };
}

impl_from_state! {
    CullState => Cull,
    BlendState => Blend,
    ZBufferState => ZBuffer,
    WireframeState => Wireframe,
    MaterialState => Material,
    LightState => Light,
}
