//! Upstream data sources.
//!
//! An [`OutputPort`](crate::port::OutputPort) does not compute anything
//! itself: it serves the data object produced by an upstream pipeline, seen
//! through the [`DataSource`] trait. The port only references the source; the
//! caller keeps ownership and shares it as a [`SharedSource`].
//!
//! [`CachedSource`] is a ready-made source that wraps a compute closure.

mod cached;

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

pub use cached::CachedSource;

/// A data source shared between its owner and the ports that serve it.
pub type SharedSource = Arc<Mutex<dyn DataSource>>;

/// Wraps a data source so it can be bound to a port.
pub fn shared<S: DataSource>(source: S) -> Arc<Mutex<S>> {
    Arc::new(Mutex::new(source))
}

/// The region of a data object requested by a downstream consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateExtent {
    /// A structured sub-volume given as `[x_min, x_max, y_min, y_max, z_min,
    /// z_max]`, bounds included.
    Structured([i32; 6]),
    /// A piece of an unstructured data set split in `number_of_pieces`
    /// pieces, with `ghost_level` layers of ghost cells.
    Piece {
        /// Index of the requested piece.
        piece: u32,
        /// Number of pieces the data set is split into.
        number_of_pieces: u32,
        /// Number of ghost cell layers.
        ghost_level: u32,
    },
}

impl UpdateExtent {
    /// The extent covering a whole unstructured data set.
    pub const WHOLE: Self = Self::Piece {
        piece: 0,
        number_of_pieces: 1,
        ghost_level: 0,
    };
}

impl Default for UpdateExtent {
    fn default() -> Self {
        Self::WHOLE
    }
}

/// Structural description of a data object, available without materializing
/// its data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInformation {
    /// Name of the kind of data object, e.g. `"image"` or `"polydata"`.
    pub data_type: String,
    /// Largest extent that can be requested, for structured data.
    pub whole_extent: Option<[i32; 6]>,
    /// Largest number of pieces the data can be split into, for unstructured
    /// data.
    pub maximum_number_of_pieces: u32,
    /// Estimated size of the whole data in bytes.
    pub estimated_size: u64,
}

/// An upstream data object that can be refreshed and recomputed on demand.
pub trait DataSource: Send + 'static {
    /// Refreshes the structural description of the data without
    /// materializing it.
    fn update_information(&mut self);

    /// Returns the structural description of the data.
    fn information(&self) -> DataInformation;

    /// Returns the time of the last modification of the source itself.
    fn mtime(&self) -> Timestamp;

    /// Marks the source itself as modified.
    fn modified(&mut self);

    /// Returns the highest modification time observed upstream of the data.
    fn pipeline_mtime(&self) -> Timestamp;

    /// Sets the highest modification time observed upstream of the data.
    fn set_pipeline_mtime(&mut self, time: Timestamp);

    /// Returns the currently requested extent.
    fn update_extent(&self) -> UpdateExtent;

    /// Sets the extent to be produced by the next computation.
    fn set_update_extent(&mut self, extent: UpdateExtent);

    /// Checks whether the data storage was freed since the data was last
    /// computed.
    fn is_data_released(&self) -> bool;

    /// Prepares and computes the data for the requested extent.
    ///
    /// A source that fails to compute is expected to report itself as
    /// released until a later computation succeeds.
    fn update(&mut self) -> Result<(), SourceError>;

    /// Returns the serialized data, or `None` if no valid data is held.
    fn payload(&self) -> Option<Bytes>;
}

/// An error reported by a data source.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The computation of the data failed.
    #[error("computation failed: {0}")]
    Compute(String),
}
