//! Output ports serving a data source to a remote process.
//!
//! An [`OutputPort`] exposes two remote-callable operations on a
//! [`Transport`]: an *information* operation bound at the port tag, which
//! sends the metadata of the bound source and its pipeline modification time,
//! and a *data* operation bound at the next tag, which negotiates with the
//! peer whether fresh data should be transferred.
//!
//! Port tags must be even so that the data tag of one port never collides
//! with the information tag of another.
//!
//! # Look-ahead
//!
//! When pipelining is enabled with [`OutputPort::set_pipeline`], the port
//! recomputes its source right after answering a data request, so that the
//! next request may be answered without waiting for a computation. An
//! optional [`ParameterHook`] can adjust the source before each such
//! anticipated computation.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use pipeport::port::OutputPort;
//! use pipeport::source::{self, CachedSource, DataInformation};
//! use pipeport::transport::{LocalNetwork, PeerId, Tag};
//!
//! let network = LocalNetwork::new();
//! let transport = Arc::new(network.endpoint(PeerId(0)));
//!
//! let source = source::shared(CachedSource::new(DataInformation::default(), |_| {
//!     Ok(Bytes::from_static(b"payload"))
//! }));
//!
//! let mut port = OutputPort::new(transport.clone());
//! port.set_input(Some(source));
//! port.set_tag(Tag(10)).unwrap();
//!
//! assert_eq!(transport.registered_tags(), vec![Tag(10), Tag(11)]);
//! ```

mod hooks;
mod sync;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

use crate::source::SharedSource;
use crate::time::{TimeStamp, Timestamp};
use crate::transport::{CallError, PeerId, RemoteCall, Tag, Transport, TransportError};
use crate::util::lock;
use crate::wire::WireError;

pub use hooks::{ParameterHook, ParameterMethod, TransferHook};
pub use sync::UpdateOutcome;

/// State of a port, shared with the remote calls bound on the transport.
pub(crate) struct PortInner {
    transport: Arc<dyn Transport>,
    tag: Option<Tag>,
    input: Option<SharedSource>,
    pipeline: bool,
    pre_transfer: Option<Box<TransferHook>>,
    post_transfer: Option<Box<TransferHook>>,
    parameter_hook: Option<Box<dyn ParameterHook>>,
    /// Time of the last data transfer, as seen by the peer.
    update_time: TimeStamp,
    /// Time of the last configuration change of the port.
    mtime: TimeStamp,
}

/// A port that serves the data of a source to remote peers.
///
/// The port registers its remote-callable operations when it is given a tag
/// and unregisters them when it is dropped.
pub struct OutputPort {
    inner: Arc<Mutex<PortInner>>,
}

impl OutputPort {
    /// Creates an unbound, untagged port using the specified transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let mut mtime = TimeStamp::new();
        mtime.modified();

        Self {
            inner: Arc::new(Mutex::new(PortInner {
                transport,
                tag: None,
                input: None,
                pipeline: false,
                pre_transfer: None,
                post_transfer: None,
                parameter_hook: None,
                update_time: TimeStamp::new(),
                mtime,
            })),
        }
    }

    /// Binds the remote-callable operations of this port to `tag` (metadata)
    /// and `tag + 1` (data).
    ///
    /// This is a no-op if the port is already bound to `tag`. Otherwise, the
    /// operations bound to the previous tag, if any, are unregistered first.
    ///
    /// An error is returned if the tag is odd or if one of the two tags is
    /// already in use on the transport, in which case the port is left
    /// untagged.
    pub fn set_tag(&mut self, tag: Tag) -> Result<(), PortError> {
        if !tag.is_even() {
            return Err(PortError::OddTag(tag));
        }

        let mut inner = self.lock();
        if inner.tag == Some(tag) {
            return Ok(());
        }
        inner.mtime.modified();

        if let Some(old_tag) = inner.tag.take() {
            let info_result = inner.transport.unregister_remote_call(old_tag);
            let data_result = inner.transport.unregister_remote_call(old_tag.data_channel());
            debug!(tag = old_tag.0, "unregistered output port");
            info_result?;
            data_result?;
        }

        let weak = Arc::downgrade(&self.inner);
        inner.transport.register_remote_call(
            tag,
            remote_call(weak.clone(), PortInner::trigger_update_information),
        )?;
        let data_call = remote_call(weak, |inner, peer| inner.trigger_update(peer).map(drop));
        if let Err(e) = inner
            .transport
            .register_remote_call(tag.data_channel(), data_call)
        {
            // Only the information tag was bound by this call.
            let _ = inner.transport.unregister_remote_call(tag);

            return Err(e.into());
        }

        inner.tag = Some(tag);
        debug!(tag = tag.0, "registered output port");

        Ok(())
    }

    /// Returns the tag of the port, if any.
    pub fn tag(&self) -> Option<Tag> {
        self.lock().tag
    }

    /// Binds a data source to the port, or unbinds it with `None`.
    ///
    /// The port only keeps a reference to the source.
    pub fn set_input(&mut self, input: Option<SharedSource>) {
        let mut inner = self.lock();
        inner.input = input;
        inner.mtime.modified();
    }

    /// Returns the bound data source, if any.
    pub fn input(&self) -> Option<SharedSource> {
        self.lock().input.clone()
    }

    /// Enables or disables look-ahead computation.
    pub fn set_pipeline(&mut self, pipeline: bool) {
        let mut inner = self.lock();
        if inner.pipeline != pipeline {
            inner.pipeline = pipeline;
            inner.mtime.modified();
        }
    }

    /// Checks whether look-ahead computation is enabled.
    pub fn pipeline(&self) -> bool {
        self.lock().pipeline
    }

    /// Sets a callback run right before each data transfer.
    pub fn set_pre_transfer_hook<F>(&mut self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.lock().pre_transfer = Some(Box::new(hook));
    }

    /// Sets a callback run right after each data transfer.
    pub fn set_post_transfer_hook<F>(&mut self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.lock().post_transfer = Some(Box::new(hook));
    }

    /// Removes both transfer callbacks.
    pub fn clear_transfer_hooks(&mut self) {
        let mut inner = self.lock();
        inner.pre_transfer = None;
        inner.post_transfer = None;
    }

    /// Installs the hook applied to the source before each look-ahead
    /// computation.
    ///
    /// The previously installed hook, if any, is dropped, which releases the
    /// resources it owns.
    pub fn set_parameter_method<H: ParameterHook>(&mut self, hook: H) {
        let previous = {
            let mut inner = self.lock();
            inner.mtime.modified();
            inner.parameter_hook.replace(Box::new(hook))
        };

        // Drop outside the lock since the hook may run arbitrary code.
        drop(previous);
    }

    /// Removes and drops the parameter hook, if any.
    pub fn clear_parameter_method(&mut self) {
        let previous = {
            let mut inner = self.lock();
            let previous = inner.parameter_hook.take();
            if previous.is_some() {
                inner.mtime.modified();
            }
            previous
        };

        drop(previous);
    }

    /// Returns the time of the last configuration change of the port.
    pub fn mtime(&self) -> Timestamp {
        self.lock().mtime.get()
    }

    /// Returns the timestamp sent along the last data transfer, or
    /// [`Timestamp::ZERO`] if no data was ever transferred.
    pub fn update_time(&self) -> Timestamp {
        self.lock().update_time.get()
    }

    /// Sends the metadata of the bound source to `peer`.
    ///
    /// This is the operation invoked remotely at the port tag.
    pub fn trigger_update_information(&self, peer: PeerId) -> Result<(), PortError> {
        self.lock().trigger_update_information(peer)
    }

    /// Serves a data request from `peer`.
    ///
    /// This is the operation invoked remotely at the data tag.
    pub fn trigger_update(&self, peer: PeerId) -> Result<UpdateOutcome, PortError> {
        self.lock().trigger_update(peer)
    }

    fn lock(&self) -> MutexGuard<'_, PortInner> {
        lock(&self.inner)
    }
}

impl Drop for OutputPort {
    fn drop(&mut self) {
        let hook = {
            let mut inner = self.lock();
            if let Some(tag) = inner.tag.take() {
                for tag in [tag, tag.data_channel()] {
                    if let Err(e) = inner.transport.unregister_remote_call(tag) {
                        debug!(tag = tag.0, error = %e, "could not unregister dropped port");
                    }
                }
            }
            inner.parameter_hook.take()
        };

        drop(hook);
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("OutputPort")
            .field("tag", &inner.tag)
            .field("has_input", &inner.input.is_some())
            .field("pipeline", &inner.pipeline)
            .finish_non_exhaustive()
    }
}

/// Wraps a port operation into a remote call holding a weak reference to the
/// port.
fn remote_call(
    port: Weak<Mutex<PortInner>>,
    operation: fn(&mut PortInner, PeerId) -> Result<(), PortError>,
) -> RemoteCall {
    Arc::new(move |peer: PeerId| -> Result<(), CallError> {
        let port = port.upgrade().ok_or(PortError::Detached)?;
        let mut inner = lock(&port);

        Ok(operation(&mut *inner, peer)?)
    })
}

/// An error raised by a port operation.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// Port tags must be even.
    #[error("port tag {0} is odd")]
    OddTag(Tag),
    /// The operation requires a tag but the port has none.
    #[error("the port has no tag")]
    Untagged,
    /// The timestamp received from the peer leaves no room for a later
    /// timestamp; the null marker was sent instead of the data.
    #[error("no timestamp is available after {0}")]
    TimestampOverflow(Timestamp),
    /// The port was dropped while one of its remote calls was pending.
    #[error("the port was dropped")]
    Detached,
}
