//! Metadata and data synchronization with the remote peer.

use tracing::{debug, debug_span, trace, warn};

use super::{PortError, PortInner};
use crate::source::{DataSource, UpdateExtent};
use crate::time::Timestamp;
use crate::transport::{PeerId, Tag};
use crate::util::lock;
use crate::wire::{self, DataMessage, InformationRecord};

/// The reply given to a data request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Data was transferred, followed by a freshly minted timestamp.
    Transferred(Timestamp),
    /// A null marker was sent, followed by the timestamp received from the
    /// peer.
    NoData(Timestamp),
}

impl UpdateOutcome {
    /// Returns the timestamp sent to the peer.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Transferred(time) | Self::NoData(time) => *time,
        }
    }

    /// Checks whether data was transferred.
    pub fn is_transferred(&self) -> bool {
        matches!(self, Self::Transferred(_))
    }
}

impl PortInner {
    fn bound_tag(&self) -> Result<Tag, PortError> {
        self.tag.ok_or(PortError::Untagged)
    }

    /// Refreshes the metadata of the source and sends it to the peer.
    ///
    /// Without a bound source, an empty record is sent.
    pub(super) fn trigger_update_information(&mut self, peer: PeerId) -> Result<(), PortError> {
        let tag = self.bound_tag()?;
        let _span = debug_span!("output_port", tag = tag.0, peer = peer.0).entered();

        let record = match &self.input {
            Some(input) => {
                let mut source = lock(input);
                source.update_information();

                // The peer decides on staleness from the pipeline time alone,
                // so it must account for the source's own modifications.
                let mtime = source.mtime();
                if mtime > source.pipeline_mtime() {
                    source.set_pipeline_mtime(mtime);
                }

                Some(InformationRecord {
                    pipeline_mtime: source.pipeline_mtime(),
                    information: source.information(),
                })
            }
            None => {
                debug!("no input bound, sending empty information");
                None
            }
        };

        trace!(record = ?record, "sending information");
        self.transport.send(&wire::encode(&record)?, peer, tag)?;

        Ok(())
    }

    /// Serves a data request from the peer.
    ///
    /// The source stays locked from the reception of the request until the
    /// look-ahead computation, if any, has completed.
    pub(super) fn trigger_update(&mut self, peer: PeerId) -> Result<UpdateOutcome, PortError> {
        let tag = self.bound_tag()?.data_channel();
        let _span = debug_span!("output_port", tag = tag.0, peer = peer.0).entered();

        let input = self.input.clone();
        let mut source = input.as_deref().map(lock);

        let extent: UpdateExtent = wire::decode(&self.transport.receive(peer, tag)?)?;
        trace!(extent = ?extent, "received update extent");
        if let Some(source) = source.as_deref_mut() {
            source.set_update_extent(extent);
        }

        let peer_time = wire::decode_timestamp(&self.transport.receive(peer, tag)?)?;
        trace!(peer_time = %peer_time, "received peer data time");

        // Freed storage is never inspected: recompute first.
        if let Some(source) = source.as_deref_mut() {
            if source.is_data_released() {
                trace!("data released, recomputing");
                if let Err(e) = source.update() {
                    warn!(error = %e, "recomputation of released data failed");
                }
            }
        }

        let payload = source
            .as_deref()
            .filter(|source| !source.is_data_released())
            .and_then(|source| source.payload());

        let outcome = match payload {
            Some(payload) => {
                let Some(time) = self.update_time.modified_after(peer_time) else {
                    warn!(peer_time = %peer_time, "timestamp space exhausted, null marker sent");
                    self.send_null(peer, tag, peer_time)?;

                    return Err(PortError::TimestampOverflow(peer_time));
                };

                if let Some(hook) = self.pre_transfer.as_mut() {
                    hook();
                }
                self.transport
                    .send(&wire::encode(&DataMessage::Payload(payload))?, peer, tag)?;
                if let Some(hook) = self.post_transfer.as_mut() {
                    hook();
                }

                self.transport
                    .send(&wire::encode_timestamp(time), peer, tag)?;
                debug!(time = %time, "data transferred");

                UpdateOutcome::Transferred(time)
            }
            None => {
                self.send_null(peer, tag, peer_time)?;
                debug!(time = %peer_time, "no data available, null marker sent");

                UpdateOutcome::NoData(peer_time)
            }
        };

        if self.pipeline {
            if let Some(source) = source.as_deref_mut() {
                self.prime(source);
            }
        }

        Ok(outcome)
    }

    /// Sends the null marker followed by the unchanged peer timestamp.
    fn send_null(&self, peer: PeerId, tag: Tag, peer_time: Timestamp) -> Result<(), PortError> {
        self.transport
            .send(&wire::encode(&DataMessage::Null)?, peer, tag)?;
        self.transport
            .send(&wire::encode_timestamp(peer_time), peer, tag)?;

        Ok(())
    }

    /// Computes the source ahead of the next request.
    ///
    /// Failures are only logged: a source that failed to compute reports
    /// itself as released and is recomputed when the next request comes in.
    fn prime(&mut self, source: &mut dyn DataSource) {
        if let Some(hook) = self.parameter_hook.as_mut() {
            hook.apply(source);
        }
        source.update_information();

        trace!("priming source for the next request");
        if let Err(e) = source.update() {
            warn!(error = %e, "look-ahead computation failed");
        }
    }
}
