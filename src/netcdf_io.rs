//! NetCDF frame source and sink
//!
//! Mesh datasets are stored with a `time` dimension and a `node` dimension.
//! Every variable shaped `[time, node]` is a mesh variable; its `long_name`
//! and `units` attributes become the variable name and unit. An optional
//! one-dimensional `time` coordinate variable carries the frame times.

use crate::data_source::{FrameSink, FrameSource};
use crate::errors::{MeshStatsError, Result};
use crate::frame::{Frame, VariableSpec};
use crate::statistics::{OutputArray, Precision};
use chrono::Utc;
use ndarray::{Array2, Axis};
use netcdf::{AttributeValue, File, FileMut};
use std::{fs, path::Path, path::PathBuf};
use tracing::{debug, info, warn};

pub const TIME_DIM: &str = "time";
pub const NODE_DIM: &str = "node";

/// Mesh dataset backed by a NetCDF file
///
/// Frames are read one variable row at a time; nothing beyond the time
/// axis is kept in memory between reads.
pub struct NetCDFFrameSource {
    path: PathBuf,
    file: File,
    variables: Vec<VariableSpec>,
    node_count: usize,
    times: Vec<f64>,
}

impl NetCDFFrameSource {
    /// Open a mesh dataset
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, lacks the `time` or `node`
    /// dimension, or its time coordinate cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = netcdf::open(path)?;

        let frame_count = dimension_len(&file, TIME_DIM)?;
        let node_count = dimension_len(&file, NODE_DIM)?;

        let variables: Vec<VariableSpec> = file
            .variables()
            .filter(|var| {
                let dims = var.dimensions();
                dims.len() == 2 && dims[0].name() == TIME_DIM && dims[1].name() == NODE_DIM
            })
            .map(|var| {
                let id = var.name();
                let name = string_attribute(&var, "long_name").unwrap_or_else(|| id.clone());
                let unit = string_attribute(&var, "units").unwrap_or_default();
                VariableSpec { id, name, unit }
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let times = match file.variable(TIME_DIM) {
            Some(var) => var.get_values::<f64, _>(0..frame_count)?,
            None => (0..frame_count).map(|i| i as f64).collect(),
        };

        debug!(
            path = %path.display(),
            frames = frame_count,
            nodes = node_count,
            variables = variables.len(),
            "opened mesh dataset"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            variables,
            node_count,
            times,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_rows(&self, index: usize, ids: &[String]) -> Result<Frame> {
        let time = self.time_value(index)?;
        let mut values = Array2::zeros((ids.len(), self.node_count));
        for (mut row, id) in values.axis_iter_mut(Axis(0)).zip(ids) {
            let var = self.file.variable(id).ok_or_else(|| {
                MeshStatsError::frame_read(index, format!("no variable '{id}' in {}", self.path.display()))
            })?;
            let data = var
                .get_values::<f64, _>((index..index + 1, 0..self.node_count))
                .map_err(|e| MeshStatsError::frame_read(index, format!("reading '{id}': {e}")))?;
            if data.len() != self.node_count {
                return Err(MeshStatsError::frame_read(
                    index,
                    format!("'{id}' has {} values, expected {}", data.len(), self.node_count),
                ));
            }
            row.assign(&ndarray::aview1(&data));
        }
        Frame::new(time, ids.to_vec(), values)
    }
}

impl FrameSource for NetCDFFrameSource {
    fn frame_count(&self) -> usize {
        self.times.len()
    }

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    fn time_value(&self, index: usize) -> Result<f64> {
        self.times.get(index).copied().ok_or_else(|| {
            MeshStatsError::frame_read(index, format!("dataset has {} frames", self.times.len()))
        })
    }

    fn get_frame(&self, index: usize) -> Result<Frame> {
        let ids = self.available_variable_ids();
        self.read_rows(index, &ids)
    }

    fn read_frame(&self, index: usize, variables: &[String]) -> Result<Frame> {
        self.read_rows(index, variables)
    }
}

/// Output dataset written frame by frame
///
/// Dimensions are fixed at creation, so the number of frames to be written
/// must be known up front. Frames go to a hidden sibling of the output path;
/// [`NetCDFFrameSink::persist`] moves it into place and
/// [`NetCDFFrameSink::discard`] drops it, leaving any earlier file at the
/// output path untouched.
pub struct NetCDFFrameSink {
    path: PathBuf,
    staging: PathBuf,
    file: FileMut,
    node_count: usize,
    frame_capacity: usize,
    variables: Vec<String>,
    precision: Option<Precision>,
    frames_written: usize,
}

impl NetCDFFrameSink {
    /// Start an output dataset that will land at `path` once persisted
    ///
    /// # Errors
    ///
    /// Fails if the staging file or its dimensions cannot be created.
    pub fn create(path: impl AsRef<Path>, node_count: usize, frame_capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        let staging = staging_path(path)?;
        if staging.exists() {
            fs::remove_file(&staging)?;
        }

        let mut file = netcdf::create(&staging)?;
        file.add_dimension(TIME_DIM, frame_capacity)?;
        file.add_dimension(NODE_DIM, node_count)?;
        {
            let mut time = file.add_variable::<f64>(TIME_DIM, &[TIME_DIM])?;
            time.put_attribute("long_name", "time")?;
        }
        file.add_attribute(
            "history",
            format!("Created by mesh_stats on {}", Utc::now().to_rfc3339()),
        )?;

        info!(path = %path.display(), nodes = node_count, frames = frame_capacity, "created output dataset");

        Ok(Self {
            path: path.to_path_buf(),
            staging,
            file,
            node_count,
            frame_capacity,
            variables: Vec::new(),
            precision: None,
            frames_written: 0,
        })
    }

    /// Final location of the dataset
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where frames are written until the dataset is persisted
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Close the dataset and move it to its final path, replacing any file there
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be closed or renamed; the staging file is
    /// removed in that case.
    pub fn persist(self) -> Result<PathBuf> {
        let Self {
            path, staging, file, ..
        } = self;
        let moved = file
            .close()
            .map_err(MeshStatsError::from)
            .and_then(|()| fs::rename(&staging, &path).map_err(MeshStatsError::from));
        if let Err(e) = moved {
            remove_staging(&staging);
            return Err(e);
        }
        debug!(path = %path.display(), "persisted output dataset");
        Ok(path)
    }

    /// Close and delete the staging file without touching the output path
    pub fn discard(self) {
        let Self { staging, file, .. } = self;
        if let Err(e) = file.close() {
            warn!(path = %staging.display(), error = %e, "could not close partial output");
        }
        remove_staging(&staging);
    }

    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Attach a global text attribute
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::FrameWrite`] if the attribute cannot be written.
    pub fn add_global_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.file
            .add_attribute(name, value)
            .map_err(|e| MeshStatsError::FrameWrite(format!("attribute '{name}': {e}")))?;
        Ok(())
    }

    fn variable_mut(&mut self, id: &str) -> Result<netcdf::VariableMut<'_>> {
        self.file
            .variable_mut(id)
            .ok_or_else(|| MeshStatsError::FrameWrite(format!("variable '{id}' was not declared")))
    }
}

impl FrameSink for NetCDFFrameSink {
    fn write_header(&mut self, variables: &[VariableSpec], precision: Precision) -> Result<()> {
        if self.precision.is_some() {
            return Err(MeshStatsError::FrameWrite("header already written".into()));
        }
        for spec in variables {
            let dims = [TIME_DIM, NODE_DIM];
            let added = match precision {
                Precision::Single => self.file.add_variable::<f32>(&spec.id, &dims),
                Precision::Double => self.file.add_variable::<f64>(&spec.id, &dims),
            };
            let mut var =
                added.map_err(|e| MeshStatsError::FrameWrite(format!("declaring '{}': {e}", spec.id)))?;
            for (name, value) in [("long_name", &spec.name), ("units", &spec.unit)] {
                var.put_attribute(name, value.as_str()).map_err(|e| {
                    MeshStatsError::FrameWrite(format!("attribute '{name}' of '{}': {e}", spec.id))
                })?;
            }
        }
        self.variables = variables.iter().map(|spec| spec.id.clone()).collect();
        self.precision = Some(precision);
        debug!(variables = ?self.variables, ?precision, "wrote output header");
        Ok(())
    }

    fn write_frame(&mut self, time: f64, values: &OutputArray) -> Result<()> {
        if self.precision != Some(values.precision()) {
            return Err(MeshStatsError::FrameWrite(format!(
                "frame precision {:?} does not match header {:?}",
                values.precision(),
                self.precision
            )));
        }
        if values.nrows() != self.variables.len() || values.ncols() != self.node_count {
            return Err(MeshStatsError::FrameWrite(format!(
                "frame is {}x{}, expected {}x{}",
                values.nrows(),
                values.ncols(),
                self.variables.len(),
                self.node_count
            )));
        }
        let frame = self.frames_written;
        if frame >= self.frame_capacity {
            return Err(MeshStatsError::FrameWrite(format!(
                "output holds {} frames",
                self.frame_capacity
            )));
        }

        let extents = (frame..frame + 1, 0..self.node_count);
        let ids = self.variables.clone();
        for (row, id) in ids.iter().enumerate() {
            let mut var = self.variable_mut(id)?;
            let written = match values {
                OutputArray::Single(data) => {
                    var.put(data.row(row).insert_axis(Axis(0)), extents.clone())
                }
                OutputArray::Double(data) => {
                    var.put(data.row(row).insert_axis(Axis(0)), extents.clone())
                }
            };
            written.map_err(|e| {
                MeshStatsError::FrameWrite(format!("writing '{id}' at frame {frame}: {e}"))
            })?;
        }
        self.variable_mut(TIME_DIM)?
            .put(ndarray::aview1(&[time]), frame..frame + 1)
            .map_err(|e| MeshStatsError::FrameWrite(format!("writing time of frame {frame}: {e}")))?;

        self.frames_written += 1;
        Ok(())
    }
}

fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        MeshStatsError::FrameWrite(format!("output path {} has no file name", path.display()))
    })?;
    Ok(path.with_file_name(format!(".{}.partial", name.to_string_lossy())))
}

fn remove_staging(staging: &Path) {
    if staging.exists() {
        if let Err(e) = fs::remove_file(staging) {
            warn!(path = %staging.display(), error = %e, "could not remove partial output");
        }
    }
}

fn dimension_len(file: &File, name: &str) -> Result<usize> {
    file.dimension(name)
        .map(|dim| dim.len())
        .ok_or_else(|| MeshStatsError::frame_read(0, format!("dataset has no '{name}' dimension")))
}

fn string_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(value) => Some(value),
        _ => None,
    }
}
