// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature source collaborator: where selected features come from and where
//! changed geometries are written back.

use std::fmt;

use covclean_core::{Geometry, GeometryKind};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host-assigned feature identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub i64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(id: i64, geometry: impl Into<Geometry>) -> Self {
        Self {
            id: FeatureId(id),
            geometry: geometry.into(),
        }
    }
}

/// A typed collection with a selection, as exposed by a GIS host.
pub trait FeatureSource {
    type Error: fmt::Display;

    /// Geometry kind the collection is declared with.
    fn geometry_kind(&self) -> GeometryKind;

    /// Selected features in selection order.
    fn selected_features(&self) -> Vec<Feature>;

    /// Stage new geometries for several features. Either every update is
    /// staged or none is; on failure the offending id comes back with the
    /// error and earlier staged edits are as they were before the call.
    fn update_geometries(
        &mut self,
        updates: Vec<(FeatureId, Geometry)>,
    ) -> Result<(), (FeatureId, Self::Error)>;

    /// Stage a new geometry for `id`. Staged edits are not committed.
    fn update_geometry(&mut self, id: FeatureId, geometry: Geometry) -> Result<(), Self::Error> {
        self.update_geometries(vec![(id, geometry)])
            .map_err(|(_, e)| e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("Feature {0} does not exist in layer")]
    UnknownFeature(FeatureId),

    #[error("Layer is read-only")]
    ReadOnly,
}

/// In-process feature collection with an uncommitted edit buffer.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    name: String,
    kind: GeometryKind,
    features: Vec<Feature>,
    positions: FxHashMap<FeatureId, usize>,
    selection: Vec<FeatureId>,
    edits: FxHashMap<FeatureId, Geometry>,
    read_only: bool,
}

impl MemoryLayer {
    /// Create a layer with every feature selected.
    pub fn new(name: impl Into<String>, kind: GeometryKind, features: Vec<Feature>) -> Self {
        let positions = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id, i))
            .collect();
        let selection = features.iter().map(|f| f.id).collect();
        Self {
            name: name.into(),
            kind,
            features,
            positions,
            selection,
            edits: FxHashMap::default(),
            read_only: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Replace the selection. Unknown ids are ignored; order is kept.
    pub fn select(&mut self, ids: impl IntoIterator<Item = FeatureId>) {
        self.selection = ids
            .into_iter()
            .filter(|id| self.positions.contains_key(id))
            .collect();
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.positions.get(&id).map(|&i| &self.features[i])
    }

    /// Geometry as the host would display it: staged edit first.
    pub fn current_geometry(&self, id: FeatureId) -> Option<&Geometry> {
        self.edits
            .get(&id)
            .or_else(|| self.feature(id).map(|f| &f.geometry))
    }

    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Staged edits, ordered by feature position in the layer.
    pub fn pending_edits(&self) -> Vec<(FeatureId, &Geometry)> {
        let mut edits: Vec<_> = self.edits.iter().map(|(id, g)| (*id, g)).collect();
        edits.sort_by_key(|(id, _)| self.positions.get(id).copied().unwrap_or(usize::MAX));
        edits
    }

    /// Apply staged edits to the stored features and clear the buffer.
    pub fn commit(&mut self) -> usize {
        let count = self.edits.len();
        for (id, geometry) in self.edits.drain() {
            if let Some(&i) = self.positions.get(&id) {
                self.features[i].geometry = geometry;
            }
        }
        count
    }

    pub fn rollback(&mut self) {
        self.edits.clear();
    }
}

impl FeatureSource for MemoryLayer {
    type Error = LayerError;

    fn geometry_kind(&self) -> GeometryKind {
        self.kind
    }

    fn selected_features(&self) -> Vec<Feature> {
        self.selection
            .iter()
            .filter_map(|id| self.feature(*id).cloned())
            .collect()
    }

    fn update_geometries(
        &mut self,
        updates: Vec<(FeatureId, Geometry)>,
    ) -> Result<(), (FeatureId, LayerError)> {
        if let Some((id, _)) = updates.first() {
            if self.read_only {
                return Err((*id, LayerError::ReadOnly));
            }
        }
        if let Some((id, _)) = updates.iter().find(|(id, _)| !self.positions.contains_key(id)) {
            return Err((*id, LayerError::UnknownFeature(*id)));
        }
        self.edits.extend(updates);
        Ok(())
    }
}
