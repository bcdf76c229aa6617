//! The fabricated fixture types and a registry of their loaded meshes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::params::FixtureSpec;
use crate::reference::{ReferenceMesh, ReferenceMeshError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    VerticalCylinders,
    HorizontalCylinders,
    Spheres,
    AngledPlates,
}

impl FixtureKind {
    pub const ALL: [FixtureKind; 4] = [
        FixtureKind::VerticalCylinders,
        FixtureKind::HorizontalCylinders,
        FixtureKind::Spheres,
        FixtureKind::AngledPlates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FixtureKind::VerticalCylinders => "vertical_cylinders",
            FixtureKind::HorizontalCylinders => "horizontal_cylinders",
            FixtureKind::Spheres => "spheres",
            FixtureKind::AngledPlates => "angled_plates",
        }
    }

    /// Mesh file name inside a fixture directory.
    pub fn file_name(self) -> String {
        format!("{}.obj", self.as_str())
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FixtureKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        FixtureKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| RegistryError::UnknownKind(s.to_string()))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("unknown fixture kind {0:?}")]
    UnknownKind(String),
    #[error("fixture {0} is not loaded")]
    NotLoaded(FixtureKind),
    #[error("failed to load fixture {kind} from {}: {source}", .path.display())]
    Load {
        kind: FixtureKind,
        path: PathBuf,
        #[source]
        source: ReferenceMeshError,
    },
}

/// Reference meshes keyed by fixture kind.
///
/// Construct once at startup and pass by reference into the pipeline.
#[derive(Clone, Debug, Default)]
pub struct FixtureRegistry {
    meshes: BTreeMap<FixtureKind, ReferenceMesh>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every fixture kind from `dir/<kind>.obj`.
    pub fn load_dir(dir: impl AsRef<Path>, spec: &FixtureSpec) -> Result<Self, RegistryError> {
        Self::load_kinds(dir, spec, &FixtureKind::ALL)
    }

    /// Load only the listed kinds.
    pub fn load_kinds(
        dir: impl AsRef<Path>,
        spec: &FixtureSpec,
        kinds: &[FixtureKind],
    ) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let mut registry = Self::new();
        for &kind in kinds {
            let path = dir.join(kind.file_name());
            let mesh = ReferenceMesh::load(&path, spec.clone())
                .map_err(|source| RegistryError::Load { kind, path, source })?;
            log::info!("loaded fixture {kind}");
            registry.insert(kind, mesh);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, kind: FixtureKind, mesh: ReferenceMesh) {
        self.meshes.insert(kind, mesh);
    }

    pub fn get(&self, kind: FixtureKind) -> Result<&ReferenceMesh, RegistryError> {
        self.meshes.get(&kind).ok_or(RegistryError::NotLoaded(kind))
    }

    /// Move a loaded mesh out of the registry.
    pub fn take(&mut self, kind: FixtureKind) -> Result<ReferenceMesh, RegistryError> {
        self.meshes.remove(&kind).ok_or(RegistryError::NotLoaded(kind))
    }

    pub fn kinds(&self) -> impl Iterator<Item = FixtureKind> + '_ {
        self.meshes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
