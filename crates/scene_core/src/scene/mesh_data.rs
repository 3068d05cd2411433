//! Mesh geometry
//!
//! Attribute buffers, an optional index buffer split into sections (each with
//! its own [`IndexMode`]), and the interleaved cache used by
//! `DataMode::VboInterleaved`.

use crate::buffer::{FloatBufferData, IndexBufferData};
use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{ColorRgba, Point3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// How indices (or vertices, when unindexed) form primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexMode {
    /// Independent triangles
    #[default]
    Triangles,
    /// Each vertex after the second forms a triangle with the previous two
    TriangleStrip,
    /// Each vertex after the second forms a triangle with the previous one and the first
    TriangleFan,
    /// Independent quads
    Quads,
    /// Each pair after the first forms a quad with the previous pair
    QuadStrip,
    /// Independent segments
    Lines,
    /// Connected segments
    LineStrip,
    /// Connected segments closed back to the first vertex
    LineLoop,
    /// Independent points
    Points,
    /// One polygon made of the whole section
    Polygon,
}

impl IndexMode {
    /// Vertices per primitive; `None` for [`IndexMode::Polygon`]
    pub const fn vertices_per_primitive(self) -> Option<usize> {
        match self {
            IndexMode::Triangles | IndexMode::TriangleStrip | IndexMode::TriangleFan => Some(3),
            IndexMode::Quads | IndexMode::QuadStrip => Some(4),
            IndexMode::Lines | IndexMode::LineStrip | IndexMode::LineLoop => Some(2),
            IndexMode::Points => Some(1),
            IndexMode::Polygon => None,
        }
    }

    /// Whether primitives have area
    pub const fn has_polygons(self) -> bool {
        matches!(
            self,
            IndexMode::Triangles
                | IndexMode::TriangleStrip
                | IndexMode::TriangleFan
                | IndexMode::Quads
                | IndexMode::QuadStrip
                | IndexMode::Polygon
        )
    }

    /// Primitives formed by a section of `size` indices
    pub const fn primitive_count(self, size: usize) -> usize {
        match self {
            IndexMode::Triangles => size / 3,
            IndexMode::TriangleStrip | IndexMode::TriangleFan => size.saturating_sub(2),
            IndexMode::Quads => size / 4,
            IndexMode::QuadStrip => (size / 2).saturating_sub(1),
            IndexMode::Lines => size / 2,
            IndexMode::LineStrip => size.saturating_sub(1),
            IndexMode::LineLoop | IndexMode::Points => size,
            IndexMode::Polygon => {
                if size >= 3 {
                    1
                } else {
                    0
                }
            }
        }
    }
}

/// Layout of an interleaved buffer: position, then optional normal, color
/// and two texture coordinates per unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InterleavedFormat {
    /// Normals follow positions
    pub normals: bool,
    /// RGBA colors follow normals
    pub colors: bool,
    /// Texture units packed last
    pub texture_units: usize,
}

impl InterleavedFormat {
    /// Floats per vertex
    pub fn stride(&self) -> usize {
        3 + if self.normals { 3 } else { 0 }
            + if self.colors { 4 } else { 0 }
            + self.texture_units * 2
    }
}

/// Geometry of one mesh
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    vertices: Option<FloatBufferData>,
    normals: Option<FloatBufferData>,
    colors: Option<FloatBufferData>,
    texture_coords: Vec<Option<FloatBufferData>>,
    indices: Option<IndexBufferData>,
    index_lengths: Option<Vec<usize>>,
    index_modes: Vec<IndexMode>,
    interleaved: Option<(FloatBufferData, InterleavedFormat)>,
}

impl MeshData {
    /// Empty geometry drawn as triangles
    pub fn new() -> Self {
        Self {
            index_modes: vec![IndexMode::Triangles],
            ..Default::default()
        }
    }

    /// Geometry from packed `xyz` positions
    pub fn from_vertices(vertices: Vec<f32>) -> Self {
        let mut data = Self::new();
        data.set_vertices(Some(FloatBufferData::new(vertices, 3)));
        data
    }

    /// Positions
    pub fn vertices(&self) -> Option<&FloatBufferData> {
        self.vertices.as_ref()
    }

    /// Mutable positions; drops the interleaved cache
    pub fn vertices_mut(&mut self) -> Option<&mut FloatBufferData> {
        self.interleaved = None;
        self.vertices.as_mut()
    }

    /// Replace positions
    pub fn set_vertices(&mut self, vertices: Option<FloatBufferData>) {
        self.vertices = vertices;
        self.interleaved = None;
    }

    /// Normals
    pub fn normals(&self) -> Option<&FloatBufferData> {
        self.normals.as_ref()
    }

    /// Mutable normals; drops the interleaved cache
    pub fn normals_mut(&mut self) -> Option<&mut FloatBufferData> {
        self.interleaved = None;
        self.normals.as_mut()
    }

    /// Replace normals
    pub fn set_normals(&mut self, normals: Option<FloatBufferData>) {
        self.normals = normals;
        self.interleaved = None;
    }

    /// Colors
    pub fn colors(&self) -> Option<&FloatBufferData> {
        self.colors.as_ref()
    }

    /// Replace colors
    pub fn set_colors(&mut self, colors: Option<FloatBufferData>) {
        self.colors = colors;
        self.interleaved = None;
    }

    /// Texture coordinates of `unit`
    pub fn texture_coords(&self, unit: usize) -> Option<&FloatBufferData> {
        self.texture_coords.get(unit).and_then(Option::as_ref)
    }

    /// Replace the texture coordinates of `unit`
    pub fn set_texture_coords(&mut self, unit: usize, coords: Option<FloatBufferData>) {
        if unit >= self.texture_coords.len() {
            self.texture_coords.resize_with(unit + 1, || None);
        }
        self.texture_coords[unit] = coords;
        self.interleaved = None;
    }

    /// Number of texture units with a slot
    pub fn texture_unit_count(&self) -> usize {
        self.texture_coords.len()
    }

    /// Indices
    pub fn indices(&self) -> Option<&IndexBufferData> {
        self.indices.as_ref()
    }

    /// Replace indices
    pub fn set_indices(&mut self, indices: Option<IndexBufferData>) {
        self.indices = indices;
    }

    /// Section lengths; `None` means one section spanning everything
    pub fn index_lengths(&self) -> Option<&[usize]> {
        self.index_lengths.as_deref()
    }

    /// Split the indices into sections
    pub fn set_index_lengths(&mut self, lengths: Option<Vec<usize>>) {
        self.index_lengths = lengths;
    }

    /// Index modes per section
    pub fn index_modes(&self) -> &[IndexMode] {
        &self.index_modes
    }

    /// Mode of the first section
    pub fn set_index_mode(&mut self, mode: IndexMode) {
        if self.index_modes.is_empty() {
            self.index_modes.push(mode);
        } else {
            self.index_modes[0] = mode;
        }
    }

    /// Modes per section; sections past the end reuse the last mode
    pub fn set_index_modes(&mut self, modes: Vec<IndexMode>) -> SceneResult<()> {
        if modes.is_empty() {
            return Err(SceneError::InvalidArgument(
                "at least one index mode is required".to_string(),
            ));
        }
        self.index_modes = modes;
        Ok(())
    }

    /// Number of sections
    pub fn section_count(&self) -> usize {
        self.index_lengths.as_ref().map_or(1, Vec::len)
    }

    /// Mode of `section`
    pub fn index_mode(&self, section: usize) -> SceneResult<IndexMode> {
        if section >= self.section_count() {
            return Err(SceneError::InvalidArgument(format!("invalid section index: {section}")));
        }
        Ok(self
            .index_modes
            .get(section)
            .or_else(|| self.index_modes.last())
            .copied()
            .unwrap_or_default())
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.as_ref().map_or(0, FloatBufferData::tuple_count)
    }

    fn section_size(&self, section: usize) -> usize {
        match &self.index_lengths {
            Some(lengths) => lengths.get(section).copied().unwrap_or(0),
            None => self.indices.as_ref().map_or(self.vertex_count(), IndexBufferData::len),
        }
    }

    fn section_offset(&self, section: usize) -> usize {
        self.index_lengths
            .as_ref()
            .map_or(0, |lengths| lengths.iter().take(section).sum())
    }

    /// Primitives in `section`
    pub fn primitive_count(&self, section: usize) -> SceneResult<usize> {
        Ok(self.index_mode(section)?.primitive_count(self.section_size(section)))
    }

    /// Primitives over every section
    pub fn total_primitive_count(&self) -> usize {
        (0..self.section_count())
            .filter_map(|section| self.primitive_count(section).ok())
            .sum()
    }

    /// Position in the index buffer (or vertex buffer, when unindexed) of
    /// `point` of primitive `primitive` in `section`
    pub fn vertex_index(
        &self,
        primitive: usize,
        point: usize,
        section: usize,
    ) -> SceneResult<usize> {
        let mode = self.index_mode(section)?;
        let size = self.section_size(section);
        let count = mode.primitive_count(size);
        if primitive >= count {
            return Err(SceneError::OutOfBounds {
                what: "primitive",
                index: primitive,
                count,
            });
        }
        let points = mode.vertices_per_primitive().unwrap_or(size);
        if point >= points {
            return Err(SceneError::OutOfBounds {
                what: "point",
                index: point,
                count: points,
            });
        }

        let local = match mode {
            IndexMode::Triangles => primitive * 3 + point,
            IndexMode::TriangleStrip | IndexMode::LineStrip => primitive + point,
            IndexMode::TriangleFan => {
                if point == 0 {
                    0
                } else {
                    primitive + point
                }
            }
            IndexMode::Quads => primitive * 4 + point,
            IndexMode::QuadStrip => primitive * 2 + point,
            IndexMode::Lines => primitive * 2 + point,
            IndexMode::LineLoop => (primitive + point) % size,
            IndexMode::Points => primitive,
            IndexMode::Polygon => point,
        };
        Ok(self.section_offset(section) + local)
    }

    /// Vertex indices of one primitive
    pub fn primitive_indices(&self, primitive: usize, section: usize) -> SceneResult<Vec<u32>> {
        let mode = self.index_mode(section)?;
        let points = mode.vertices_per_primitive().unwrap_or_else(|| self.section_size(section));

        (0..points)
            .map(|point| {
                let position = self.vertex_index(primitive, point, section)?;
                match &self.indices {
                    Some(indices) => {
                        indices.data().get(position).copied().ok_or(SceneError::OutOfBounds {
                            what: "index",
                            index: position,
                            count: indices.len(),
                        })
                    }
                    None => Ok(position as u32),
                }
            })
            .collect()
    }

    /// Vertex positions of one primitive
    pub fn primitive_vertices(&self, primitive: usize, section: usize) -> SceneResult<Vec<Point3>> {
        self.primitive_indices(primitive, section)?
            .into_iter()
            .map(|index| {
                self.vertex(index as usize).ok_or(SceneError::OutOfBounds {
                    what: "vertex",
                    index: index as usize,
                    count: self.vertex_count(),
                })
            })
            .collect()
    }

    /// Position of one vertex
    pub fn vertex(&self, index: usize) -> Option<Point3> {
        let data = self.vertices.as_ref()?.data();
        let start = index.checked_mul(3)?;
        let p = data.get(start..start.checked_add(3)?)?;
        Some(Point3::new(p[0], p[1], p[2]))
    }

    /// Move every vertex by `amount`
    pub fn translate_points(&mut self, amount: &Vec3) {
        if let Some(vertices) = self.vertices_mut() {
            for p in vertices.data_mut().chunks_exact_mut(3) {
                p[0] += amount.x;
                p[1] += amount.y;
                p[2] += amount.z;
            }
        }
    }

    /// Rotate every vertex about the model origin
    pub fn rotate_points(&mut self, rotation: &Quat) {
        if let Some(vertices) = self.vertices_mut() {
            rotate_triples(vertices, rotation);
        }
    }

    /// Rotate every normal
    pub fn rotate_normals(&mut self, rotation: &Quat) {
        if let Some(normals) = self.normals_mut() {
            rotate_triples(normals, rotation);
        }
    }

    /// Replace colors with `color` on every vertex
    pub fn set_solid_color(&mut self, color: ColorRgba) {
        let data = color.to_array().repeat(self.vertex_count());
        self.set_colors(Some(FloatBufferData::new(data, 4)));
    }

    /// Interleaved cache, if built
    pub fn interleaved(&self) -> Option<(&FloatBufferData, InterleavedFormat)> {
        self.interleaved.as_ref().map(|(data, format)| (data, *format))
    }

    /// Pack every attribute into a new interleaved cache
    ///
    /// Any mutable access to an attribute drops the cache, so a missing cache
    /// is the only stale state.
    pub(crate) fn rebuild_interleaved(&mut self) {
        let format = InterleavedFormat {
            normals: self.normals.is_some(),
            colors: self.colors.is_some(),
            texture_units: self.texture_coords.len(),
        };
        let count = self.vertex_count();
        let mut packed = Vec::with_capacity(count * format.stride());

        for i in 0..count {
            push_tuple(&mut packed, self.vertices.as_ref(), i, 3);
            if format.normals {
                push_tuple(&mut packed, self.normals.as_ref(), i, 3);
            }
            if format.colors {
                push_tuple(&mut packed, self.colors.as_ref(), i, 4);
            }
            for coords in &self.texture_coords {
                push_tuple(&mut packed, coords.as_ref(), i, 2);
            }
        }

        self.interleaved = Some((FloatBufferData::new(packed, format.stride()), format));
    }
}

fn rotate_triples(buffer: &mut FloatBufferData, rotation: &Quat) {
    for p in buffer.data_mut().chunks_exact_mut(3) {
        let rotated = rotation * Vec3::new(p[0], p[1], p[2]);
        p.copy_from_slice(rotated.as_slice());
    }
}

/// Append `width` components of tuple `index`, zero-padded
fn push_tuple(out: &mut Vec<f32>, buffer: Option<&FloatBufferData>, index: usize, width: usize) {
    let tuple = buffer.and_then(|b| {
        let size = b.tuple_size();
        b.data().get(index * size..(index + 1) * size)
    });
    for c in 0..width {
        out.push(tuple.and_then(|t| t.get(c)).copied().unwrap_or(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad_strip() -> MeshData {
        // 2x3 grid of vertices
        let mut data = MeshData::from_vertices(vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 1.0, 1.0, 0.0, //
            0.0, 2.0, 0.0, 1.0, 2.0, 0.0,
        ]);
        data.set_index_mode(IndexMode::QuadStrip);
        data
    }

    #[test]
    fn test_primitive_counts_per_mode() {
        assert_eq!(IndexMode::Triangles.primitive_count(9), 3);
        assert_eq!(IndexMode::TriangleStrip.primitive_count(5), 3);
        assert_eq!(IndexMode::TriangleFan.primitive_count(1), 0);
        assert_eq!(IndexMode::Quads.primitive_count(8), 2);
        assert_eq!(IndexMode::QuadStrip.primitive_count(6), 2);
        assert_eq!(IndexMode::Lines.primitive_count(6), 3);
        assert_eq!(IndexMode::LineStrip.primitive_count(4), 3);
        assert_eq!(IndexMode::LineLoop.primitive_count(4), 4);
        assert_eq!(IndexMode::Points.primitive_count(7), 7);
        assert_eq!(IndexMode::Polygon.primitive_count(5), 1);
    }

    #[test]
    fn test_sections_with_indices() {
        let mut data = MeshData::from_vertices(vec![0.0; 15]);
        data.set_indices(Some(IndexBufferData::new(vec![0, 1, 2, 2, 3, 4, 0], 1)));
        data.set_index_lengths(Some(vec![3, 4]));
        data.set_index_modes(vec![IndexMode::Triangles, IndexMode::LineStrip]).unwrap();

        assert_eq!(data.section_count(), 2);
        assert_eq!(data.primitive_count(0).unwrap(), 1);
        assert_eq!(data.primitive_count(1).unwrap(), 3);
        assert_eq!(data.total_primitive_count(), 4);
        assert_eq!(data.primitive_indices(2, 1).unwrap(), vec![4, 0]);
    }

    #[test]
    fn test_bad_section_is_invalid_argument() {
        let data = MeshData::from_vertices(vec![0.0; 9]);
        assert!(matches!(data.index_mode(1), Err(SceneError::InvalidArgument(_))));
        assert!(matches!(data.primitive_indices(0, 3), Err(SceneError::InvalidArgument(_))));
    }

    #[test]
    fn test_primitive_out_of_bounds() {
        let data = MeshData::from_vertices(vec![0.0; 9]);
        assert!(matches!(
            data.primitive_vertices(1, 0),
            Err(SceneError::OutOfBounds { what: "primitive", index: 1, count: 1 })
        ));
    }

    #[test]
    fn test_vertex_lookup_past_end_is_none() {
        let data = MeshData::from_vertices(vec![0.0; 6]);
        assert!(data.vertex(1).is_some());
        assert!(data.vertex(2).is_none());
        assert!(data.vertex(usize::MAX / 3).is_none());
        assert!(data.vertex(usize::MAX).is_none());
    }

    #[test]
    fn test_quad_strip_vertices() {
        let data = quad_strip();
        let quad = data.primitive_vertices(1, 0).unwrap();
        assert_eq!(quad.len(), 4);
        assert_eq!(quad[0], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(quad[3], Point3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_line_loop_wraps_to_first_vertex() {
        let mut data = MeshData::from_vertices(vec![0.0; 9]);
        data.set_index_mode(IndexMode::LineLoop);
        assert_eq!(data.primitive_indices(2, 0).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_translate_and_rotate_points() {
        let mut data = MeshData::from_vertices(vec![1.0, 0.0, 0.0]);
        data.rotate_points(&Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2));
        data.translate_points(&Vec3::new(0.0, 0.0, 5.0));
        let vertex = data.vertex(0).unwrap();
        assert_relative_eq!(vertex, Point3::new(0.0, 1.0, 5.0), epsilon = 1e-6);
    }

    #[test]
    fn test_interleaved_layout() {
        let mut data = MeshData::from_vertices(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        data.set_solid_color(ColorRgba::BLACK);
        data.rebuild_interleaved();

        let (packed, format) = data.interleaved().unwrap();
        assert_eq!(format.stride(), 7);
        assert_eq!(
            packed.data(),
            &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0, 4.0, 5.0, 6.0, 0.0, 0.0, 0.0, 1.0]
        );

        data.set_colors(None);
        assert!(data.interleaved().is_none());
    }
}
