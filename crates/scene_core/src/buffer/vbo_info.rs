//! Legacy per-mesh VBO settings
//!
//! Predates the per-context id caches on [`BufferData`](super::BufferData):
//! one enable flag and one id per attribute kind, valid in a single context.
//! Enabling a kind makes the mesh source that attribute from a GPU buffer
//! regardless of its data mode.

use super::data::validate_vbo_id;
use crate::error::SceneResult;
use crate::render::AttributeKind;
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Attribute kinds drawn from GPU buffers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VboKinds: u8 {
        /// Positions
        const VERTEX = 1 << 0;
        /// Normals
        const NORMAL = 1 << 1;
        /// Colors
        const COLOR = 1 << 2;
        /// Texture coordinates, every unit
        const TEXTURE = 1 << 3;
        /// Indices
        const INDEX = 1 << 4;
    }
}

impl VboKinds {
    /// Flag controlling an attribute stream
    pub fn for_attribute(kind: AttributeKind) -> Self {
        match kind {
            AttributeKind::Vertex => VboKinds::VERTEX,
            AttributeKind::Normal => VboKinds::NORMAL,
            AttributeKind::Color => VboKinds::COLOR,
            AttributeKind::TexCoord(_) => VboKinds::TEXTURE,
        }
    }
}

/// Enable flags and single-context ids of one mesh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VboInfo {
    #[serde(with = "kinds_bits")]
    enabled: VboKinds,
    vertex_id: u32,
    normal_id: u32,
    color_id: u32,
    index_id: u32,
    texture_ids: Vec<u32>,
}

impl Default for VboInfo {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VboInfo {
    /// Settings with every kind enabled or disabled
    pub fn new(enable_all: bool) -> Self {
        Self {
            enabled: if enable_all { VboKinds::all() } else { VboKinds::empty() },
            vertex_id: 0,
            normal_id: 0,
            color_id: 0,
            index_id: 0,
            texture_ids: vec![0; 2],
        }
    }

    /// Whether `kinds` are all enabled
    pub fn is_enabled(&self, kinds: VboKinds) -> bool {
        self.enabled.contains(kinds)
    }

    /// Enable or disable `kinds`
    pub fn set_enabled(&mut self, kinds: VboKinds, enabled: bool) {
        self.enabled.set(kinds, enabled);
    }

    /// Enabled kinds
    pub fn enabled(&self) -> VboKinds {
        self.enabled
    }

    /// Id of an attribute stream, `None` when unassigned
    pub fn id(&self, kind: AttributeKind) -> Option<u32> {
        let id = match kind {
            AttributeKind::Vertex => self.vertex_id,
            AttributeKind::Normal => self.normal_id,
            AttributeKind::Color => self.color_id,
            AttributeKind::TexCoord(unit) => {
                self.texture_ids.get(unit as usize).copied().unwrap_or(0)
            }
        };
        (id > 0).then_some(id)
    }

    /// Assign the id of an attribute stream; texture ids grow as needed
    pub fn set_id(&mut self, kind: AttributeKind, id: i64) -> SceneResult<()> {
        let id = validate_vbo_id(id)?;
        match kind {
            AttributeKind::Vertex => self.vertex_id = id,
            AttributeKind::Normal => self.normal_id = id,
            AttributeKind::Color => self.color_id = id,
            AttributeKind::TexCoord(unit) => {
                let unit = unit as usize;
                if unit >= self.texture_ids.len() {
                    self.resize_texture_ids(unit + 1);
                }
                self.texture_ids[unit] = id;
            }
        }
        Ok(())
    }

    /// Id of the index buffer, `None` when unassigned
    pub fn index_id(&self) -> Option<u32> {
        (self.index_id > 0).then_some(self.index_id)
    }

    /// Assign the id of the index buffer
    pub fn set_index_id(&mut self, id: i64) -> SceneResult<()> {
        self.index_id = validate_vbo_id(id)?;
        Ok(())
    }

    /// Resize the texture id table, keeping existing ids
    pub fn resize_texture_ids(&mut self, size: usize) {
        self.texture_ids.resize(size, 0);
    }

    /// Texture id table length
    pub fn texture_unit_count(&self) -> usize {
        self.texture_ids.len()
    }
}

mod kinds_bits {
    use super::VboKinds;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(kinds: &VboKinds, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(kinds.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VboKinds, D::Error> {
        Ok(VboKinds::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SceneError;

    #[test]
    fn test_texture_ids_resize_on_demand() {
        let mut info = VboInfo::new(false);
        assert_eq!(info.id(AttributeKind::TexCoord(5)), None);
        info.set_id(AttributeKind::TexCoord(5), 11).unwrap();
        assert_eq!(info.texture_unit_count(), 6);
        assert_eq!(info.id(AttributeKind::TexCoord(5)), Some(11));
    }

    #[test]
    fn test_ids_must_be_positive() {
        let mut info = VboInfo::default();
        assert!(matches!(
            info.set_id(AttributeKind::Vertex, 0),
            Err(SceneError::InvalidArgument(_))
        ));
        assert!(matches!(info.set_index_id(-1), Err(SceneError::InvalidArgument(_))));
        assert_eq!(info.index_id(), None);
    }

    #[test]
    fn test_enable_flags() {
        let mut info = VboInfo::new(false);
        info.set_enabled(VboKinds::VERTEX | VboKinds::INDEX, true);
        assert!(info.is_enabled(VboKinds::for_attribute(AttributeKind::Vertex)));
        assert!(!info.is_enabled(VboKinds::for_attribute(AttributeKind::TexCoord(0))));
    }
}
