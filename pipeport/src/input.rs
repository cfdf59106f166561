//! The requesting side of a port connection.
//!
//! An [`InputPort`] lives in the downstream process and drives the two remote
//! operations of an [`OutputPort`](crate::port::OutputPort). It keeps the
//! timestamp of the last data it received, which the output port uses to
//! decide what to send back.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::port::PortError;
use crate::source::UpdateExtent;
use crate::time::Timestamp;
use crate::transport::{PeerId, Tag, Transport};
use crate::wire::{self, DataMessage, InformationRecord};

/// A port requesting metadata and data from a remote output port.
pub struct InputPort {
    transport: Arc<dyn Transport>,
    remote: PeerId,
    tag: Tag,
    /// Timestamp sent along the last data received.
    data_time: Timestamp,
    data: Option<Bytes>,
}

impl InputPort {
    /// Creates a port connected to the output port with the specified tag in
    /// the `remote` process.
    pub fn new(transport: Arc<dyn Transport>, remote: PeerId, tag: Tag) -> Self {
        Self {
            transport,
            remote,
            tag,
            data_time: Timestamp::ZERO,
            data: None,
        }
    }

    /// Requests the metadata of the remote source.
    ///
    /// Returns `None` if no source is bound to the remote port.
    pub fn update_information(&mut self) -> Result<Option<InformationRecord>, PortError> {
        self.transport.trigger_remote_call(self.remote, self.tag)?;
        let record: Option<InformationRecord> =
            wire::decode(&self.transport.receive(self.remote, self.tag)?)?;
        trace!(record = ?record, "received information");

        Ok(record)
    }

    /// Requests the data for the specified extent.
    ///
    /// Returns the received data, or `None` if the remote port had no data
    /// to send; in the latter case, the data previously held is kept.
    pub fn update(&mut self, extent: &UpdateExtent) -> Result<Option<Bytes>, PortError> {
        let tag = self.tag.data_channel();

        self.transport.trigger_remote_call(self.remote, tag)?;
        self.transport
            .send(&wire::encode(extent)?, self.remote, tag)?;
        self.transport
            .send(&wire::encode_timestamp(self.data_time), self.remote, tag)?;

        let message: DataMessage = wire::decode(&self.transport.receive(self.remote, tag)?)?;
        let time = wire::decode_timestamp(&self.transport.receive(self.remote, tag)?)?;
        self.data_time = time;

        match message {
            DataMessage::Payload(data) => {
                debug!(time = %time, size = data.len(), "received data");
                self.data = Some(data.clone());

                Ok(Some(data))
            }
            DataMessage::Null => {
                debug!(time = %time, "received null marker");

                Ok(None)
            }
        }
    }

    /// Returns the timestamp of the last data received.
    pub fn data_time(&self) -> Timestamp {
        self.data_time
    }

    /// Returns the last data received, if any.
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }
}

impl fmt::Debug for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InputPort")
            .field("remote", &self.remote)
            .field("tag", &self.tag)
            .field("data_time", &self.data_time)
            .finish_non_exhaustive()
    }
}
