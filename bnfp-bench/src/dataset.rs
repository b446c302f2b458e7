//! Benchmark instance discovery
//!
//! Instances are the `.bnet` model files of the dataset, grouped into the
//! benchmark sets of [`DatasetLayout`].

use crate::config::{DatasetLayout, SetLayout};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Error type for dataset operations
#[derive(Error, Debug)]
pub enum DatasetError {
    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// Walk directory error
    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
    /// Invalid file name glob
    #[error("Invalid pattern: {0}")]
    Glob(#[from] globset::Error),
    /// Two model files map to the same id
    #[error("Instance {id} appears in both {first} and {second}")]
    DuplicateInstance {
        /// Instance id
        id: String,
        /// Set seen first
        first: BenchmarkSet,
        /// Set seen second
        second: BenchmarkSet,
    },
}

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// A benchmark set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BenchmarkSet {
    /// Biological models
    #[serde(rename = "BBM")]
    Bbm,
    /// Pseudo-random networks
    Random,
    /// Selected models
    Selected,
}

impl BenchmarkSet {
    /// All sets, in report order
    pub const ALL: [BenchmarkSet; 3] = [Self::Bbm, Self::Random, Self::Selected];

    /// Display name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bbm => "BBM",
            Self::Random => "Random",
            Self::Selected => "Selected",
        }
    }

    /// Log directory convention the set follows
    #[must_use]
    pub fn family(&self) -> SetFamily {
        match self {
            Self::Bbm => SetFamily::Bbm,
            Self::Random | Self::Selected => SetFamily::Fasp,
        }
    }
}

impl fmt::Display for BenchmarkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Group of sets sharing a log directory convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SetFamily {
    /// BBM logs
    Bbm,
    /// fASP benchmark logs (Random and Selected)
    Fasp,
}

impl SetFamily {
    /// Sets of this family
    #[must_use]
    pub fn sets(&self) -> &'static [BenchmarkSet] {
        match self {
            Self::Bbm => &[BenchmarkSet::Bbm],
            Self::Fasp => &[BenchmarkSet::Random, BenchmarkSet::Selected],
        }
    }
}

/// A benchmark model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance id
    pub id: String,
    /// Owning set
    pub set: BenchmarkSet,
    /// Model file
    pub model_path: PathBuf,
    /// Number of variables of the model
    pub num_vars: usize,
}

/// All instances of a benchmark
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    instances: Vec<Instance>,
}

impl Dataset {
    /// Build a dataset from instances
    pub fn from_instances(instances: Vec<Instance>) -> DatasetResult<Self> {
        let mut seen: BTreeMap<&str, BenchmarkSet> = BTreeMap::new();
        for inst in &instances {
            if let Some(first) = seen.insert(&inst.id, inst.set) {
                return Err(DatasetError::DuplicateInstance {
                    id: inst.id.clone(),
                    first,
                    second: inst.set,
                });
            }
        }
        Ok(Self { instances })
    }

    /// Discover the instances under a dataset root
    pub fn discover(root: &Path, layout: &DatasetLayout) -> DatasetResult<Self> {
        let mut instances = Vec::new();
        for set_layout in &layout.sets {
            instances.extend(discover_set(root, set_layout)?);
        }
        Self::from_instances(instances)
    }

    /// Every instance, in discovery order
    #[must_use]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Instances of one set
    pub fn in_set(&self, set: BenchmarkSet) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(move |i| i.set == set)
    }

    /// Instances of one log family
    pub fn in_family(&self, family: SetFamily) -> impl Iterator<Item = &Instance> {
        self.instances
            .iter()
            .filter(move |i| i.set.family() == family)
    }

    /// Ids of one set
    #[must_use]
    pub fn ids(&self, set: BenchmarkSet) -> HashSet<&str> {
        self.in_set(set).map(|i| i.id.as_str()).collect()
    }

    /// Variable count per instance id
    #[must_use]
    pub fn num_vars(&self) -> BTreeMap<String, usize> {
        self.instances
            .iter()
            .map(|i| (i.id.clone(), i.num_vars))
            .collect()
    }

    /// Number of instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether there are no instances
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn discover_set(root: &Path, layout: &SetLayout) -> DatasetResult<Vec<Instance>> {
    let dir = root.join(&layout.dir);
    if !dir.is_dir() {
        warn!("No {} directory at {}", layout.set, dir.display());
        return Ok(Vec::new());
    }

    let matcher = Glob::new(&layout.pattern)?.compile_matcher();
    let mut instances = Vec::new();

    for entry in WalkDir::new(&dir).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
            continue;
        };
        let id = stem
            .strip_prefix(layout.id_prefix.as_str())
            .unwrap_or(&stem)
            .to_string();
        let num_vars = count_vars(path)?;
        debug!("Instance {} ({}): {} variables", id, layout.set, num_vars);

        instances.push(Instance {
            id,
            set: layout.set,
            model_path: path.to_path_buf(),
            num_vars,
        });
    }

    Ok(instances)
}

/// Count the variables of a `.bnet` model
///
/// Every non-blank, non-comment line except the `targets,factors` header
/// defines one variable.
#[must_use]
pub fn count_vars_in(content: &str) -> usize {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .count()
        .saturating_sub(1)
}

/// Count the variables of a `.bnet` model file
pub fn count_vars(path: &Path) -> DatasetResult<usize> {
    let content = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(count_vars_in(&content))
}
