//! Hierarchy editing
//!
//! A node owns its children through an ordered key list. Attaching a child
//! first detaches it from any previous parent; detaching clears the child's
//! parent key along with the listener and render delegates tied to its old
//! position in the tree.

use super::dirty::DirtyType;
use super::graph::SceneGraph;
use crate::error::{SceneError, SceneResult};
use crate::foundation::collections::SpatialKey;
use log::debug;

impl SceneGraph {
    fn check_attach(&self, parent: SpatialKey, child: SpatialKey) -> SceneResult<()> {
        if !self.spatial(parent)?.is_node() {
            return Err(SceneError::NotANode(parent));
        }
        self.spatial(child)?;
        if parent == child || self.has_ancestor(parent, child) {
            return Err(SceneError::HierarchyCycle { parent, child });
        }
        Ok(())
    }

    fn link_child(
        &mut self,
        parent: SpatialKey,
        child: SpatialKey,
        index: Option<usize>,
    ) -> SceneResult<usize> {
        let children = self
            .spatial_mut(parent)?
            .children_mut()
            .ok_or(SceneError::NotANode(parent))?;
        let count = children.len();
        match index {
            Some(index) if index > count => {
                return Err(SceneError::OutOfBounds { what: "child", index, count });
            }
            Some(index) => children.insert(index, child),
            None => children.push(child),
        }
        let count = children.len();

        self.spatial_mut(child)?.parent = Some(parent);
        self.mark_dirty(child, DirtyType::Attached)?;
        debug!(
            "Child '{}' attached to node '{}'",
            self.spatial(child)?.name(),
            self.spatial(parent)?.name()
        );
        Ok(count)
    }

    /// Append `child` to `parent`, returning the new child count
    ///
    /// Attaching a spatial that is already a child of `parent` changes
    /// nothing.
    pub fn attach_child(&mut self, parent: SpatialKey, child: SpatialKey) -> SceneResult<usize> {
        self.check_attach(parent, child)?;
        if self.spatial(child)?.parent == Some(parent) {
            return Ok(self.spatial(parent)?.children().len());
        }
        self.remove_from_parent(child)?;
        self.link_child(parent, child, None)
    }

    /// Insert `child` at `index` of `parent`'s children, returning the new
    /// child count
    pub fn attach_child_at(
        &mut self,
        parent: SpatialKey,
        child: SpatialKey,
        index: usize,
    ) -> SceneResult<usize> {
        self.check_attach(parent, child)?;
        if self.spatial(child)?.parent == Some(parent) {
            return Ok(self.spatial(parent)?.children().len());
        }
        let count = self.spatial(parent)?.children().len();
        if index > count {
            return Err(SceneError::OutOfBounds { what: "child", index, count });
        }
        self.remove_from_parent(child)?;
        self.link_child(parent, child, Some(index))
    }

    /// Detach `child` from `parent`, returning the index it was at
    ///
    /// `Ok(None)` when `child` is not a direct child of `parent`.
    pub fn detach_child(
        &mut self,
        parent: SpatialKey,
        child: SpatialKey,
    ) -> SceneResult<Option<usize>> {
        let Some(index) = self.child_index(parent, child)? else {
            return Ok(None);
        };
        self.detach_child_at(parent, index)?;
        Ok(Some(index))
    }

    /// Detach the child at `index`, returning it
    pub fn detach_child_at(&mut self, parent: SpatialKey, index: usize) -> SceneResult<SpatialKey> {
        let child = self.unlink_child(parent, index)?;
        self.mark_dirty_from(parent, child, DirtyType::Detached)?;
        debug!("Child '{}' detached", self.spatial(child)?.name());
        Ok(child)
    }

    fn unlink_child(&mut self, parent: SpatialKey, index: usize) -> SceneResult<SpatialKey> {
        let children = self
            .spatial_mut(parent)?
            .children_mut()
            .ok_or(SceneError::NotANode(parent))?;
        let count = children.len();
        if index >= count {
            return Err(SceneError::OutOfBounds { what: "child", index, count });
        }
        let child = children.remove(index);

        let spatial = self.spatial_mut(child)?;
        spatial.parent = None;
        spatial.listener = None;
        spatial.delegates.clear();
        // Now a root: its world transform is its local transform.
        self.mark_dirty(child, DirtyType::Transform)?;
        Ok(child)
    }

    /// Detach the first direct child called `name`, returning the index it was at
    pub fn detach_child_named(
        &mut self,
        parent: SpatialKey,
        name: &str,
    ) -> SceneResult<Option<usize>> {
        let spatials = &self.spatials;
        let index = self
            .spatial(parent)?
            .children()
            .iter()
            .position(|&key| spatials.get(key).map_or(false, |child| child.name() == name));
        match index {
            Some(index) => {
                self.detach_child_at(parent, index)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Detach every child, last first, returning them in their former order
    pub fn detach_all_children(&mut self, parent: SpatialKey) -> SceneResult<Vec<SpatialKey>> {
        let count = self.spatial(parent)?.children().len();
        let mut detached = Vec::with_capacity(count);
        for index in (0..count).rev() {
            detached.push(self.detach_child_at(parent, index)?);
        }
        detached.reverse();
        debug!("All children removed from '{}'", self.spatial(parent)?.name());
        Ok(detached)
    }

    /// Detach `key` from its parent, if any; returns whether it had one
    pub fn remove_from_parent(&mut self, key: SpatialKey) -> SceneResult<bool> {
        match self.spatial(key)?.parent {
            Some(parent) => Ok(self.detach_child(parent, key)?.is_some()),
            None => Ok(false),
        }
    }

    /// Whether `ancestor` is a strict ancestor of `key`
    pub fn has_ancestor(&self, key: SpatialKey, ancestor: SpatialKey) -> bool {
        let mut current = self.spatials.get(key).and_then(|spatial| spatial.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.spatials.get(parent).and_then(|spatial| spatial.parent);
        }
        false
    }

    /// Whether `descendant` lies anywhere below `key`
    pub fn has_child(&self, key: SpatialKey, descendant: SpatialKey) -> bool {
        key != descendant && self.contains(key) && self.has_ancestor(descendant, key)
    }

    /// First spatial called `name` below `key`, depth first
    pub fn child_named(&self, key: SpatialKey, name: &str) -> Option<SpatialKey> {
        for &child in self.spatials.get(key)?.children() {
            let Some(spatial) = self.spatials.get(child) else {
                continue;
            };
            if spatial.name() == name {
                return Some(child);
            }
            if let Some(found) = self.child_named(child, name) {
                return Some(found);
            }
        }
        None
    }

    /// Position of `child` among `parent`'s children
    pub fn child_index(&self, parent: SpatialKey, child: SpatialKey) -> SceneResult<Option<usize>> {
        Ok(self.spatial(parent)?.children().iter().position(|&key| key == child))
    }

    /// Exchange the children at `a` and `b`
    pub fn swap_children(&mut self, parent: SpatialKey, a: usize, b: usize) -> SceneResult<()> {
        let children = self
            .spatial_mut(parent)?
            .children_mut()
            .ok_or(SceneError::NotANode(parent))?;
        let count = children.len();
        for index in [a, b] {
            if index >= count {
                return Err(SceneError::OutOfBounds { what: "child", index, count });
            }
        }
        children.swap(a, b);
        Ok(())
    }

    /// Every spatial below `key`, pre-order, excluding `key`
    pub(crate) fn descendants(&self, key: SpatialKey) -> Vec<SpatialKey> {
        let mut out = Vec::new();
        let mut stack: Vec<SpatialKey> = match self.spatials.get(key) {
            Some(spatial) => spatial.children().iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            if let Some(spatial) = self.spatials.get(next) {
                out.push(next);
                stack.extend(spatial.children().iter().rev());
            }
        }
        out
    }

    /// Remove `key` and its whole subtree from the graph, returning how many
    /// spatials were removed
    ///
    /// Buffers owned by the removed meshes are released; their GPU ids reach
    /// the buffer registry's expiry list once no other handle holds them.
    pub fn destroy(&mut self, key: SpatialKey) -> SceneResult<usize> {
        let parent = self.spatial(key)?.parent;
        if let Some(parent) = parent {
            if let Some(index) = self.child_index(parent, key)? {
                self.unlink_child(parent, index)?;
                self.mark_dirty_from(parent, key, DirtyType::Destroyed)?;
            }
        }

        let mut removed = self.descendants(key);
        removed.push(key);
        let name = self.spatial(key)?.name().to_string();
        for doomed in &removed {
            self.spatials.remove(*doomed);
        }
        debug!("Destroyed '{}' ({} spatials)", name, removed.len());
        Ok(removed.len())
    }
}
