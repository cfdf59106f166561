use std::fmt;

use bytes::Bytes;
use tracing::trace;

use super::{DataInformation, DataSource, SourceError, UpdateExtent};
use crate::time::{TimeStamp, Timestamp};

type ComputeFn = dyn FnMut(&UpdateExtent) -> Result<Bytes, SourceError> + Send + 'static;

/// A data source that caches the output of a compute closure.
///
/// The closure is run by [`update`](DataSource::update) for the requested
/// extent and its output is held until [`release_data`](Self::release_data)
/// is called, the computation fails or a new computation replaces it.
pub struct CachedSource {
    compute: Box<ComputeFn>,
    information: DataInformation,
    mtime: TimeStamp,
    pipeline_mtime: Timestamp,
    update_extent: UpdateExtent,
    data: Option<Bytes>,
    update_count: u64,
}

impl CachedSource {
    /// Creates a source without data from a compute closure.
    pub fn new<F>(information: DataInformation, compute: F) -> Self
    where
        F: FnMut(&UpdateExtent) -> Result<Bytes, SourceError> + Send + 'static,
    {
        let mut mtime = TimeStamp::new();
        mtime.modified();

        Self {
            compute: Box::new(compute),
            information,
            mtime,
            pipeline_mtime: Timestamp::ZERO,
            update_extent: UpdateExtent::default(),
            data: None,
            update_count: 0,
        }
    }

    /// Frees the cached data.
    pub fn release_data(&mut self) {
        self.data = None;
    }

    /// Replaces the structural description of the data and marks the source
    /// as modified.
    pub fn set_information(&mut self, information: DataInformation) {
        self.information = information;
        self.mtime.modified();
    }

    /// Returns the number of computations run so far, including failed ones.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }
}

impl DataSource for CachedSource {
    fn update_information(&mut self) {
        // The description is held directly; only the pipeline time may lag.
        if self.pipeline_mtime < self.mtime.get() {
            self.pipeline_mtime = self.mtime.get();
        }
    }

    fn information(&self) -> DataInformation {
        self.information.clone()
    }

    fn mtime(&self) -> Timestamp {
        self.mtime.get()
    }

    fn modified(&mut self) {
        self.mtime.modified();
    }

    fn pipeline_mtime(&self) -> Timestamp {
        self.pipeline_mtime
    }

    fn set_pipeline_mtime(&mut self, time: Timestamp) {
        self.pipeline_mtime = time;
    }

    fn update_extent(&self) -> UpdateExtent {
        self.update_extent.clone()
    }

    fn set_update_extent(&mut self, extent: UpdateExtent) {
        self.update_extent = extent;
    }

    fn is_data_released(&self) -> bool {
        self.data.is_none()
    }

    fn update(&mut self) -> Result<(), SourceError> {
        self.update_count += 1;
        trace!(extent = ?self.update_extent, "computing data");

        match (self.compute)(&self.update_extent) {
            Ok(data) => {
                self.data = Some(data);

                Ok(())
            }
            Err(e) => {
                self.data = None;

                Err(e)
            }
        }
    }

    fn payload(&self) -> Option<Bytes> {
        self.data.clone()
    }
}

impl fmt::Debug for CachedSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CachedSource")
            .field("information", &self.information)
            .field("mtime", &self.mtime.get())
            .field("pipeline_mtime", &self.pipeline_mtime)
            .field("update_extent", &self.update_extent)
            .field("is_data_released", &self.data.is_none())
            .finish_non_exhaustive()
    }
}
