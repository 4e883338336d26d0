//! Frame source and sink abstractions
//!
//! The engine never touches a file format directly. It reads frames through
//! [`FrameSource`] (or [`AsyncFrameSource`]) and hands assembled arrays to a
//! [`FrameSink`]. [`MemoryDataset`] and [`MemorySink`] are in-memory
//! implementations used for tests and for callers that already hold their
//! data.

use crate::errors::{MeshStatsError, Result};
use crate::frame::{Frame, TimeWindow, VariableSpec};
use crate::statistics::assembler::{OutputArray, Precision};
use async_trait::async_trait;
use futures::Stream;
use ndarray::{Array2, Axis};
use std::sync::Mutex;

/// Read access to a multi-frame mesh dataset
pub trait FrameSource {
    /// Number of time frames
    fn frame_count(&self) -> usize;

    /// Number of mesh nodes per frame
    fn node_count(&self) -> usize;

    /// Variables stored in the dataset
    fn variables(&self) -> &[VariableSpec];

    /// Time value of frame `index`
    ///
    /// # Errors
    ///
    /// Fails when `index` is out of range or the time axis cannot be read.
    fn time_value(&self, index: usize) -> Result<f64>;

    /// Read every variable of frame `index`
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::FrameRead`] on I/O failure or corrupt data.
    fn get_frame(&self, index: usize) -> Result<Frame>;

    /// Read only `variables` of frame `index`
    ///
    /// Sources that can read a subset cheaply should override this.
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::FrameRead`] on I/O failure or corrupt data.
    fn read_frame(&self, index: usize, variables: &[String]) -> Result<Frame> {
        let _ = variables;
        self.get_frame(index)
    }

    /// Ids of the variables stored in the dataset
    fn available_variable_ids(&self) -> Vec<String> {
        self.variables().iter().map(|v| v.id.clone()).collect()
    }
}

/// Write access to an output dataset
pub trait FrameSink {
    /// Declare the output variables, in row order, and their precision
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::FrameWrite`] if the header cannot be written.
    fn write_header(&mut self, variables: &[VariableSpec], precision: Precision) -> Result<()>;

    /// Append one frame
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::FrameWrite`] if the frame cannot be written.
    fn write_frame(&mut self, time: f64, values: &OutputArray) -> Result<()>;
}

/// Frame source whose reads may suspend
#[async_trait]
pub trait AsyncFrameSource: Send + Sync {
    fn frame_count(&self) -> usize;

    fn available_variable_ids(&self) -> Vec<String>;

    /// # Errors
    ///
    /// Returns [`MeshStatsError::FrameRead`] on I/O failure or corrupt data.
    async fn fetch_frame(&self, index: usize, variables: &[String]) -> Result<Frame>;
}

/// Stream the frames of `window` in window order
pub fn frame_stream<'a, S>(
    source: &'a S,
    window: &'a TimeWindow,
    variables: &'a [String],
) -> impl Stream<Item = Result<(usize, Frame)>> + Send + 'a
where
    S: AsyncFrameSource + ?Sized,
{
    async_stream::try_stream! {
        for &index in window.indices() {
            let frame = source.fetch_frame(index, variables).await?;
            yield (index, frame);
        }
    }
}

/// Dataset held entirely in memory
#[derive(Debug)]
pub struct MemoryDataset {
    variables: Vec<VariableSpec>,
    node_count: usize,
    times: Vec<f64>,
    frames: Vec<Array2<f64>>,
    reads: Mutex<Vec<usize>>,
}

impl MemoryDataset {
    #[must_use]
    pub fn new(variables: Vec<VariableSpec>, node_count: usize) -> Self {
        Self {
            variables,
            node_count,
            times: Vec::new(),
            frames: Vec::new(),
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Append a frame with one row per declared variable
    ///
    /// # Errors
    ///
    /// Returns a shape error if `values` is not `variables x nodes`.
    pub fn push_frame(&mut self, time: f64, values: Array2<f64>) -> Result<()> {
        if values.dim() != (self.variables.len(), self.node_count) {
            return Err(
                ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into(),
            );
        }
        self.times.push(time);
        self.frames.push(values);
        Ok(())
    }

    /// Indices read so far, in read order
    #[must_use]
    pub fn read_log(&self) -> Vec<usize> {
        self.reads.lock().map(|reads| reads.clone()).unwrap_or_default()
    }

    fn record_read(&self, index: usize) {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push(index);
        }
    }

    fn select(&self, index: usize, variables: Option<&[String]>) -> Result<Frame> {
        let values = self.frames.get(index).ok_or_else(|| {
            MeshStatsError::frame_read(index, format!("dataset has {} frames", self.frames.len()))
        })?;
        self.record_read(index);
        let time = self.times[index];

        let Some(wanted) = variables else {
            let ids = FrameSource::available_variable_ids(self);
            return Frame::new(time, ids, values.clone());
        };
        let rows = wanted
            .iter()
            .map(|id| {
                self.variables
                    .iter()
                    .position(|v| v.id == *id)
                    .ok_or_else(|| {
                        MeshStatsError::frame_read(index, format!("no variable '{id}' in dataset"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Frame::new(time, wanted.to_vec(), values.select(Axis(0), &rows))
    }
}

impl FrameSource for MemoryDataset {
    fn frame_count(&self) -> usize {
        self.frames.len()
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
        self.select(index, None)
    }

    fn read_frame(&self, index: usize, variables: &[String]) -> Result<Frame> {
        self.select(index, Some(variables))
    }
}

#[async_trait]
impl AsyncFrameSource for MemoryDataset {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn available_variable_ids(&self) -> Vec<String> {
        FrameSource::available_variable_ids(self)
    }

    async fn fetch_frame(&self, index: usize, variables: &[String]) -> Result<Frame> {
        tokio::task::yield_now().await;
        self.select(index, Some(variables))
    }
}

/// Sink collecting everything it is given
#[derive(Debug, Default)]
pub struct MemorySink {
    pub header: Option<(Vec<VariableSpec>, Precision)>,
    pub frames: Vec<(f64, OutputArray)>,
}

impl FrameSink for MemorySink {
    fn write_header(&mut self, variables: &[VariableSpec], precision: Precision) -> Result<()> {
        if self.header.is_some() {
            return Err(MeshStatsError::FrameWrite("header already written".into()));
        }
        self.header = Some((variables.to_vec(), precision));
        Ok(())
    }

    fn write_frame(&mut self, time: f64, values: &OutputArray) -> Result<()> {
        let Some((variables, precision)) = &self.header else {
            return Err(MeshStatsError::FrameWrite("frame written before header".into()));
        };
        if values.nrows() != variables.len() || values.precision() != *precision {
            return Err(MeshStatsError::FrameWrite(format!(
                "frame has {} rows at {:?} precision, header declares {} at {:?}",
                values.nrows(),
                values.precision(),
                variables.len(),
                precision
            )));
        }
        self.frames.push((time, values.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::VariableValues;
    use futures::StreamExt;
    use ndarray::array;

    fn dataset() -> MemoryDataset {
        let mut ds = MemoryDataset::new(
            vec![
                VariableSpec::new("U", "VELOCITY U", "M/S"),
                VariableSpec::new("H", "WATER DEPTH", "M"),
            ],
            2,
        );
        ds.push_frame(0.0, array![[1.0, 2.0], [10.0, 20.0]]).unwrap();
        ds.push_frame(60.0, array![[3.0, 4.0], [30.0, 40.0]]).unwrap();
        ds
    }

    #[test]
    fn reads_subset_of_variables() {
        let ds = dataset();
        let frame = ds.read_frame(1, &["H".to_string()]).unwrap();
        assert_eq!(frame.variables(), &["H".to_string()]);
        assert_eq!(frame.values("H").unwrap().to_vec(), vec![30.0, 40.0]);
        assert_eq!(frame.time(), 60.0);
        assert!(frame.values("U").is_none());
        assert_eq!(ds.read_log(), vec![1]);
    }

    #[test]
    fn out_of_range_read_is_a_frame_error() {
        let ds = dataset();
        assert!(matches!(ds.get_frame(5), Err(MeshStatsError::FrameRead { index: 5, .. })));
        assert!(ds.time_value(2).is_err());
    }

    #[test]
    fn rejects_misshapen_frames() {
        let mut ds = dataset();
        assert!(ds.push_frame(120.0, array![[1.0, 2.0, 3.0]]).is_err());
        assert_eq!(FrameSource::frame_count(&ds), 2);
    }

    #[test]
    fn sink_requires_header_first() {
        let mut sink = MemorySink::default();
        let values = OutputArray::Double(array![[1.0]]);
        assert!(sink.write_frame(0.0, &values).is_err());
        sink.write_header(&[VariableSpec::new("U", "U", "")], Precision::Double)
            .unwrap();
        sink.write_frame(0.0, &values).unwrap();
        assert!(sink
            .write_frame(0.0, &OutputArray::Single(array![[1.0_f32]]))
            .is_err());
    }

    #[tokio::test]
    async fn stream_yields_window_in_order() {
        let ds = dataset();
        let window = TimeWindow::new(vec![0, 1]).unwrap();
        let ids = vec!["U".to_string()];
        let indices: Vec<usize> = frame_stream(&ds, &window, &ids)
            .map(|item| item.unwrap().0)
            .collect()
            .await;
        assert_eq!(indices, vec![0, 1]);
    }
}
