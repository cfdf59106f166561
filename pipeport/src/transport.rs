//! Messaging transport between processes.
//!
//! Ports do not talk to the network directly. They are given a handle to a
//! [`Transport`], which provides reliable, ordered delivery of byte messages
//! per (peer, channel tag) and the ability to expose remote-callable
//! operations under a tag.
//!
//! A transport handle is typically shared by all ports of a process, e.g.
//! wrapped in an `Arc<dyn Transport>`.
//!
//! [`LocalTransport`] is an in-process implementation in which each endpoint
//! of a [`LocalNetwork`] stands for a process.

mod local;
mod registry;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use local::{LocalNetwork, LocalTransport};
pub use registry::RemoteCallRegistry;

/// Identifier of a channel or of a remote-callable operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Tag(pub i32);

impl Tag {
    /// Returns the tag of the data channel paired with this (information)
    /// tag.
    pub const fn data_channel(self) -> Tag {
        Tag(self.0 + 1)
    }

    /// Checks whether the tag is even, i.e. whether it can identify a port.
    pub const fn is_even(self) -> bool {
        self.0 % 2 == 0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a process reachable through a transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer {}", self.0)
    }
}

/// An error returned by a remote-callable operation.
pub type CallError = Box<dyn Error + Send + Sync + 'static>;

/// A remote-callable operation.
///
/// The argument is the identifier of the calling process.
pub type RemoteCall = Arc<dyn Fn(PeerId) -> Result<(), CallError> + Send + Sync + 'static>;

/// A reliable messaging transport.
pub trait Transport: Send + Sync + 'static {
    /// Binds a remote-callable operation to a tag.
    ///
    /// Fails with [`TransportError::TagInUse`] if another operation is
    /// already bound to this tag.
    fn register_remote_call(&self, tag: Tag, call: RemoteCall) -> Result<(), TransportError>;

    /// Removes the operation bound to a tag.
    ///
    /// Fails with [`TransportError::UnknownTag`] if no operation is bound to
    /// this tag.
    fn unregister_remote_call(&self, tag: Tag) -> Result<(), TransportError>;

    /// Sends a message to a peer on the specified channel.
    ///
    /// Messages sent to the same (peer, tag) pair are delivered in order.
    fn send(&self, payload: &[u8], peer: PeerId, tag: Tag) -> Result<(), TransportError>;

    /// Receives the next message sent by a peer on the specified channel,
    /// blocking until one is available.
    fn receive(&self, peer: PeerId, tag: Tag) -> Result<Vec<u8>, TransportError>;

    /// Requests a peer to run the remote-callable operation bound to a tag.
    fn trigger_remote_call(&self, peer: PeerId, tag: Tag) -> Result<(), TransportError>;
}

/// An error returned by a transport.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// A remote-callable operation is already bound to the tag.
    #[error("a remote call is already registered at tag {0}")]
    TagInUse(Tag),
    /// No remote-callable operation is bound to the tag.
    #[error("no remote call is registered at tag {0}")]
    UnknownTag(Tag),
    /// The peer is not reachable through this transport.
    #[error("{0} is not reachable")]
    UnknownPeer(PeerId),
    /// The transport was shut down.
    #[error("the transport is disconnected")]
    Disconnected,
    /// No remote call was requested before the transport timeout elapsed.
    #[error("timed out waiting for a remote call")]
    IdleTimeout,
    /// No message was received before the transport timeout elapsed.
    #[error("timed out waiting for a message from {peer} on channel {tag}")]
    Timeout {
        /// The peer that was expected to send.
        peer: PeerId,
        /// The channel on which the message was expected.
        tag: Tag,
    },
}
