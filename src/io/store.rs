//! Hierarchical result container.
//!
//! A store is a tree of named groups whose leaves are typed datasets:
//!
//! `f64` / `i64` arrays with an explicit shape (row-major), where an empty
//! shape denotes a scalar.
//!
//! Nodes are addressed by `/`-separated paths (`targets/42/GALAXY/zchi2`).
//! On disk the file is an 8-byte magic followed by a bincode payload holding
//! a small header (format version, creation and modification times) and the
//! tree. Saving goes through a temporary file in the destination directory
//! that is renamed over the destination once fully written.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::ZfindError;

pub const STORE_MAGIC: [u8; 8] = *b"RRZSTORE";
pub const STORE_VERSION: u32 = 1;

/// Leaf of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    F64 { shape: Vec<usize>, data: Vec<f64> },
    I64 { shape: Vec<usize>, data: Vec<i64> },
}

impl Dataset {
    pub fn f64_scalar(v: f64) -> Self {
        Dataset::F64 {
            shape: Vec::new(),
            data: vec![v],
        }
    }

    pub fn i64_scalar(v: i64) -> Self {
        Dataset::I64 {
            shape: Vec::new(),
            data: vec![v],
        }
    }

    pub fn f64_array(data: Vec<f64>) -> Self {
        Dataset::F64 {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn i64_array(data: Vec<i64>) -> Self {
        Dataset::I64 {
            shape: vec![data.len()],
            data,
        }
    }

    /// 2-D dataset in row-major order.
    pub fn f64_matrix(m: &DMatrix<f64>) -> Self {
        let (nrows, ncols) = m.shape();
        let data = (0..nrows)
            .flat_map(|i| (0..ncols).map(move |j| m[(i, j)]))
            .collect();
        Dataset::F64 {
            shape: vec![nrows, ncols],
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Dataset::F64 { shape, .. } | Dataset::I64 { shape, .. } => shape,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Dataset::F64 { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            Dataset::I64 { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Rebuild a 2-D `f64` dataset as a matrix.
    pub fn to_matrix(&self) -> Option<DMatrix<f64>> {
        match self {
            Dataset::F64 { shape, data } if shape.len() == 2 && shape[0] * shape[1] == data.len() => {
                Some(DMatrix::from_row_slice(shape[0], shape[1], data))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Group(BTreeMap<String, Node>),
    Dataset(Dataset),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreHeader {
    version: u32,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

/// In-memory view of a result file.
#[derive(Debug, Clone)]
pub struct Store {
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    root: BTreeMap<String, Node>,
}

impl Default for Store {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            modified: now,
            root: BTreeMap::new(),
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an existing store.
    pub fn open(path: &Path) -> Result<Self, ZfindError> {
        let file = File::open(path).map_err(|e| ZfindError::io(path, e))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|e| ZfindError::storage(path.display().to_string(), format!("truncated file: {e}")))?;
        if magic != STORE_MAGIC {
            return Err(ZfindError::storage(
                path.display().to_string(),
                "not a zfind result file",
            ));
        }

        let (header, root): (StoreHeader, BTreeMap<String, Node>) = bincode::deserialize_from(reader)
            .map_err(|e| ZfindError::storage(path.display().to_string(), format!("corrupt payload: {e}")))?;
        if header.version != STORE_VERSION {
            return Err(ZfindError::storage(
                path.display().to_string(),
                format!("unsupported format version {}", header.version),
            ));
        }

        Ok(Self {
            created: header.created,
            modified: header.modified,
            root,
        })
    }

    /// Open `path` for update, or start an empty store if it does not exist.
    pub fn open_or_create(path: &Path) -> Result<Self, ZfindError> {
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the whole tree to `path`, stamping the modification time.
    ///
    /// `path` is only replaced once the new content is complete; on failure
    /// the previous file is left untouched.
    pub fn save(&mut self, path: &Path) -> Result<(), ZfindError> {
        self.modified = Utc::now();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(|e| ZfindError::io(path, e))?;
        let mut writer = BufWriter::new(tmp);
        writer.write_all(&STORE_MAGIC).map_err(|e| ZfindError::io(path, e))?;

        let header = StoreHeader {
            version: STORE_VERSION,
            created: self.created,
            modified: self.modified,
        };
        bincode::serialize_into(&mut writer, &(&header, &self.root))
            .map_err(|e| ZfindError::storage(path.display().to_string(), format!("encode failed: {e}")))?;
        let tmp = writer
            .into_inner()
            .map_err(|e| ZfindError::io(path, e.into_error()))?;
        tmp.persist(path).map_err(|e| ZfindError::io(path, e.error))?;
        Ok(())
    }

    /// Node at `path`; the empty path is not a node.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut parts = split(path);
        let mut node = self.root.get(parts.next()?)?;
        for part in parts {
            match node {
                Node::Group(children) => node = children.get(part)?,
                Node::Dataset(_) => return None,
            }
        }
        Some(node)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Dataset at `path`, or a `Storage` error naming the path.
    pub fn dataset(&self, path: &str) -> Result<&Dataset, ZfindError> {
        match self.get(path) {
            Some(Node::Dataset(d)) => Ok(d),
            Some(Node::Group(_)) => Err(ZfindError::storage(path, "expected a dataset, found a group")),
            None => Err(ZfindError::storage(path, "missing dataset")),
        }
    }

    /// Children of the group at `path`; the empty path is the root.
    pub fn group(&self, path: &str) -> Result<&BTreeMap<String, Node>, ZfindError> {
        if split(path).next().is_none() {
            return Ok(&self.root);
        }
        match self.get(path) {
            Some(Node::Group(children)) => Ok(children),
            Some(Node::Dataset(_)) => Err(ZfindError::storage(path, "expected a group, found a dataset")),
            None => Err(ZfindError::storage(path, "missing group")),
        }
    }

    /// Store `dataset` at `path`, creating intermediate groups and replacing
    /// whatever was there before.
    pub fn put(&mut self, path: &str, dataset: Dataset) -> Result<(), ZfindError> {
        let parts: Vec<&str> = split(path).collect();
        let Some((leaf, parents)) = parts.split_last() else {
            return Err(ZfindError::storage(path, "empty dataset path"));
        };

        let mut children = &mut self.root;
        for part in parents {
            let node = children
                .entry(part.to_string())
                .or_insert_with(|| Node::Group(BTreeMap::new()));
            children = match node {
                Node::Group(c) => c,
                Node::Dataset(_) => {
                    return Err(ZfindError::storage(path, format!("'{part}' is a dataset, not a group")));
                }
            };
        }
        children.insert(leaf.to_string(), Node::Dataset(dataset));
        Ok(())
    }

    /// Detach the node at `path`.
    pub fn remove(&mut self, path: &str) -> Option<Node> {
        let parts: Vec<&str> = split(path).collect();
        let (leaf, parents) = parts.split_last()?;
        let mut children = &mut self.root;
        for part in parents {
            children = match children.get_mut(*part)? {
                Node::Group(c) => c,
                Node::Dataset(_) => return None,
            };
        }
        children.remove(*leaf)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|p| !p.is_empty())
}
