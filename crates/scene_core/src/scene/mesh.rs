//! Drawable leaf spatials

use super::hints::{DataMode, NormalsMode};
use super::mesh_data::MeshData;
use super::spatial::Spatial;
use crate::bounding::{Bound, BoundingSphere, BoundingVolume};
use crate::buffer::{VboInfo, VboKinds};
use crate::foundation::math::{ColorRgba, Point3, Transform, Vec3};
use crate::render::{AttributeKind, RenderState, Renderer, StateType};
use log::warn;

/// Geometry plus the per-mesh drawing settings
#[derive(Debug, Clone)]
pub struct Mesh {
    data: MeshData,
    model_bound: Option<Bound>,
    vbo_info: Option<VboInfo>,
    default_color: ColorRgba,
    casts_shadows: bool,
}

impl Mesh {
    /// Wrap `data`; the model bound is a sphere around its vertices, or
    /// `None` when there are none
    pub fn new(data: MeshData) -> Self {
        let mut mesh = Self {
            data,
            model_bound: None,
            vbo_info: None,
            default_color: ColorRgba::WHITE,
            casts_shadows: true,
        };
        mesh.compute_model_bound();
        mesh
    }

    /// Geometry
    pub fn data(&self) -> &MeshData {
        &self.data
    }

    /// Mutable geometry
    ///
    /// Call [`SceneGraph::update_model_bound`](super::SceneGraph::update_model_bound)
    /// after moving vertices so bounds follow.
    pub fn data_mut(&mut self) -> &mut MeshData {
        &mut self.data
    }

    /// Bound in model space
    pub fn model_bound(&self) -> Option<&Bound> {
        self.model_bound.as_ref()
    }

    pub(crate) fn set_model_bound(&mut self, bound: Option<Bound>) {
        self.model_bound = bound;
    }

    /// Refit the model bound around the current vertices, keeping its type
    pub(crate) fn compute_model_bound(&mut self) {
        let Some(vertices) = self.data.vertices().filter(|v| !v.is_empty()) else {
            self.model_bound = None;
            return;
        };
        let bound = self
            .model_bound
            .get_or_insert_with(|| Bound::Sphere(BoundingSphere::default()));
        bound.compute_from_points(vertices.data());
    }

    /// Model bound placed in the world
    pub(crate) fn world_bound(&self, world: &Transform) -> Option<Bound> {
        self.model_bound.as_ref().map(|bound| bound.transform(world))
    }

    /// Legacy VBO settings
    pub fn vbo_info(&self) -> Option<&VboInfo> {
        self.vbo_info.as_ref()
    }

    /// Replace the legacy VBO settings
    pub fn set_vbo_info(&mut self, info: Option<VboInfo>) {
        self.vbo_info = info;
    }

    /// Color used when there is no color buffer
    pub fn default_color(&self) -> ColorRgba {
        self.default_color
    }

    /// Set the color used when there is no color buffer
    pub fn set_default_color(&mut self, color: ColorRgba) {
        self.default_color = color;
    }

    /// Whether the mesh is drawn into shadow maps
    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    /// Include or exclude the mesh from shadow maps
    pub fn set_casts_shadows(&mut self, casts: bool) {
        self.casts_shadows = casts;
    }

    /// Vertices transformed by `world`
    pub fn world_vectors(&self, world: &Transform) -> Vec<Point3> {
        let count = self.data.vertex_count();
        (0..count)
            .filter_map(|i| self.data.vertex(i))
            .map(|v| world.apply_forward(&v))
            .collect()
    }

    /// Normals mapped into world space by the inverse transpose of `world`
    pub fn world_normals(&self, world: &Transform) -> Vec<Vec3> {
        let Some(normals) = self.data.normals() else {
            return Vec::new();
        };
        normals
            .data()
            .chunks_exact(3)
            .map(|n| {
                world
                    .apply_normal(&Vec3::new(n[0], n[1], n[2]))
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vec3::zeros)
            })
            .collect()
    }

    fn uses_vbo(&self, kind: AttributeKind, vbo_mode: bool) -> bool {
        vbo_mode
            || self
                .vbo_info
                .as_ref()
                .map_or(false, |info| info.is_enabled(VboKinds::for_attribute(kind)))
    }

    /// Submit this mesh with `spatial`'s resolved states and transform
    pub(crate) fn render(
        &self,
        spatial: &Spatial,
        data_mode: DataMode,
        normals_mode: NormalsMode,
        vertex_only: bool,
        renderer: &mut dyn Renderer,
    ) {
        for state_type in StateType::ALL {
            let state = spatial.render_state(state_type);
            renderer.apply_state(state_type, &state);
        }

        let world = spatial.world_transform();
        let transformed = renderer.do_transforms(world);
        let vbo_supported = renderer.is_vbo_supported();

        let mut vbo_mode =
            vbo_supported && matches!(data_mode, DataMode::Vbo | DataMode::VboInterleaved);
        let mut interleaved_bound = false;
        if vbo_mode && data_mode == DataMode::VboInterleaved {
            match self.data.interleaved() {
                Some((interleaved, format)) => {
                    if self.data.colors().is_none() {
                        renderer.apply_default_color(Some(self.default_color));
                    }
                    renderer.apply_normals_mode(normals_mode, Some(world));
                    renderer.setup_interleaved(interleaved, format);
                    interleaved_bound = true;
                }
                None => warn!(
                    "Mesh '{}' has no interleaved data; drawing with separate buffers",
                    spatial.name()
                ),
            }
        }
        if !vbo_mode && vbo_supported {
            renderer.unbind_vbo();
        }

        if !interleaved_bound {
            self.setup_attributes(world, normals_mode, vertex_only, vbo_mode, renderer);
        }

        vbo_mode = vbo_mode || interleaved_bound;
        match (self.data.indices(), self.data.vertices()) {
            (Some(indices), _) => {
                let index_vbo = vbo_supported
                    && (vbo_mode
                        || self
                            .vbo_info
                            .as_ref()
                            .map_or(false, |info| info.is_enabled(VboKinds::INDEX)));
                renderer.draw_elements(
                    indices,
                    self.data.index_lengths(),
                    self.data.index_modes(),
                    index_vbo,
                );
            }
            (None, Some(vertices)) => {
                renderer.draw_arrays(vertices, self.data.index_lengths(), self.data.index_modes());
            }
            (None, None) => {}
        }

        if transformed {
            renderer.undo_transforms(world);
        }
    }

    fn setup_attributes(
        &self,
        world: &Transform,
        normals_mode: NormalsMode,
        vertex_only: bool,
        vbo_mode: bool,
        renderer: &mut dyn Renderer,
    ) {
        let vbo_supported = renderer.is_vbo_supported();
        let vbo = |kind| vbo_supported && self.uses_vbo(kind, vbo_mode);

        if vertex_only {
            renderer.apply_normals_mode(NormalsMode::Off, None);
            renderer.setup_attribute(AttributeKind::Normal, None, false);
            renderer.apply_default_color(None);
            renderer.setup_attribute(AttributeKind::Color, None, false);
            for unit in 0..self.data.texture_unit_count() {
                renderer.setup_attribute(AttributeKind::TexCoord(unit as u32), None, false);
            }
        } else {
            renderer.apply_normals_mode(normals_mode, Some(world));
            let normals = if normals_mode == NormalsMode::Off {
                None
            } else {
                self.data.normals()
            };
            renderer.setup_attribute(AttributeKind::Normal, normals, vbo(AttributeKind::Normal));

            if self.data.colors().is_none() {
                renderer.apply_default_color(Some(self.default_color));
            }
            renderer.setup_attribute(
                AttributeKind::Color,
                self.data.colors(),
                vbo(AttributeKind::Color),
            );

            for unit in 0..self.data.texture_unit_count() {
                let kind = AttributeKind::TexCoord(unit as u32);
                renderer.setup_attribute(kind, self.data.texture_coords(unit), vbo(kind));
            }
        }
        renderer.setup_attribute(
            AttributeKind::Vertex,
            self.data.vertices(),
            vbo(AttributeKind::Vertex),
        );
    }
}

/// Keep the `max_lights` lights with the most influence on a point
///
/// Directional lights rank first, then point lights by distance.
pub(crate) fn sort_lights(
    state: &RenderState,
    at: &Point3,
    max_lights: usize,
) -> Option<RenderState> {
    let lights = state.as_light()?;
    if lights.lights.len() <= max_lights {
        return None;
    }
    let mut sorted = lights.clone();
    sorted
        .lights
        .sort_by(|a, b| a.distance_to(at).total_cmp(&b.distance_to(at)));
    sorted.lights.truncate(max_lights);
    Some(RenderState::Light(sorted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use crate::render::state::{Light, LightState};
    use approx::assert_relative_eq;

    fn triangle() -> Mesh {
        Mesh::new(MeshData::from_vertices(vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0]))
    }

    #[test]
    fn test_model_bound_from_vertices() {
        let mesh = triangle();
        let bound = mesh.model_bound().unwrap();
        for p in mesh.world_vectors(&Transform::identity()) {
            assert!(bound.contains_point(&p));
        }
        assert!(Mesh::new(MeshData::new()).model_bound().is_none());
    }

    #[test]
    fn test_world_bound_contains_world_vertices() {
        let mesh = triangle();
        let world = Transform {
            translation: Vec3::new(4.0, -1.0, 2.0),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), 1.1),
            scale: Vec3::new(2.0, 0.5, 1.0),
            ..Default::default()
        };
        let bound = mesh.world_bound(&world).unwrap();
        for p in mesh.world_vectors(&world) {
            assert!(bound.contains_point(&p));
        }
    }

    #[test]
    fn test_world_normals_are_unit_length() {
        let mut data = MeshData::from_vertices(vec![0.0; 3]);
        data.set_normals(Some(crate::buffer::FloatBufferData::new(vec![0.0, 0.0, 1.0], 3)));
        let mesh = Mesh::new(data);
        let world = Transform {
            scale: Vec3::new(3.0, 3.0, 3.0),
            ..Transform::identity()
        };
        let normals = mesh.world_normals(&world);
        assert_relative_eq!(normals[0].magnitude(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sort_lights_keeps_nearest() {
        let near = Light::point(Point3::new(1.0, 0.0, 0.0), 5.0, ColorRgba::WHITE);
        let far = Light::point(Point3::new(9.0, 0.0, 0.0), 5.0, ColorRgba::WHITE);
        let sun = Light::directional(Vec3::new(0.0, -1.0, 0.0), ColorRgba::WHITE);
        let state =
            RenderState::Light(LightState::with_lights(vec![far, near.clone(), sun.clone()]));

        let sorted = sort_lights(&state, &Point3::origin(), 2).unwrap();
        assert_eq!(sorted.as_light().unwrap().lights, vec![sun, near]);
        assert!(sort_lights(&sorted, &Point3::origin(), 2).is_none());
    }
}
