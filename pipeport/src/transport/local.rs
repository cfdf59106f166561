use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::trace;

use super::{CallError, PeerId, RemoteCall, RemoteCallRegistry, Tag, Transport, TransportError};
use crate::util::{lock, recover};

/// State of one process of the network.
#[derive(Default)]
struct EndpointState {
    /// Operations exposed by this process.
    registry: RemoteCallRegistry,
    /// Remote calls requested by peers and not yet processed, with the
    /// identifier of the caller.
    pending_calls: VecDeque<(PeerId, Tag)>,
}

/// Mutable state of the network.
#[derive(Default)]
struct NetworkState {
    endpoints: HashMap<PeerId, EndpointState>,
    /// Message queues indexed by (sender, receiver, channel tag).
    mailboxes: HashMap<(PeerId, PeerId, Tag), VecDeque<Vec<u8>>>,
    receive_timeout: Option<Duration>,
    is_shut_down: bool,
}

/// Data shared by the network and all its endpoints.
#[derive(Default)]
struct Shared {
    state: Mutex<NetworkState>,
    /// Signalling primitive used to wake up blocked receivers and remote call
    /// processors.
    activity: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        lock(&self.state)
    }

    /// Blocks until `poll` returns a value, the network is shut down or the
    /// receive timeout elapses.
    fn wait_for<T>(
        &self,
        mut poll: impl FnMut(&mut NetworkState) -> Option<T>,
        on_timeout: impl FnOnce() -> TransportError,
    ) -> Result<T, TransportError> {
        let mut state = self.lock();
        let deadline = state.receive_timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if let Some(value) = poll(&mut *state) {
                return Ok(value);
            }
            if state.is_shut_down {
                return Err(TransportError::Disconnected);
            }

            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(on_timeout());
                    }
                    recover(self.activity.wait_timeout(state, deadline - now)).0
                }
                None => recover(self.activity.wait(state)),
            };
        }
    }
}

/// An in-process network connecting [`LocalTransport`] endpoints.
///
/// Each endpoint stands for one process. Messages are buffered, so a send
/// never blocks; receives block until a matching message is available.
///
/// Cloning a `LocalNetwork` yields a handle to the same network.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use pipeport::transport::{LocalNetwork, PeerId, Tag, Transport};
///
/// let network = LocalNetwork::new().set_receive_timeout(Duration::from_secs(1));
/// let a = network.endpoint(PeerId(0));
/// let b = network.endpoint(PeerId(1));
///
/// a.send(b"hello", PeerId(1), Tag(7)).unwrap();
/// assert_eq!(b.receive(PeerId(0), Tag(7)).unwrap(), b"hello");
/// ```
#[derive(Clone, Default)]
pub struct LocalNetwork {
    shared: Arc<Shared>,
}

impl LocalNetwork {
    /// Creates an empty network without receive timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a timeout after which blocking operations give up.
    ///
    /// The timeout applies to all endpoints of the network.
    pub fn set_receive_timeout(self, timeout: Duration) -> Self {
        self.shared.lock().receive_timeout = Some(timeout);

        self
    }

    /// Returns the endpoint of the process with the specified identifier,
    /// creating it if necessary.
    pub fn endpoint(&self, id: PeerId) -> LocalTransport {
        self.shared.lock().endpoints.entry(id).or_default();

        LocalTransport {
            id,
            shared: self.shared.clone(),
        }
    }

    /// Shuts the network down.
    ///
    /// Pending and future blocking operations fail with
    /// [`TransportError::Disconnected`] once no matching message is left.
    pub fn shutdown(&self) {
        self.shared.lock().is_shut_down = true;
        self.shared.activity.notify_all();
    }
}

impl fmt::Debug for LocalNetwork {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "LocalNetwork ({} endpoints)",
            self.shared.lock().endpoints.len()
        )
    }
}

/// An endpoint of a [`LocalNetwork`].
#[derive(Clone)]
pub struct LocalTransport {
    id: PeerId,
    shared: Arc<Shared>,
}

impl LocalTransport {
    /// Processes the next remote call requested by a peer, blocking until one
    /// is available.
    ///
    /// The call runs without any lock of the network being held and its
    /// result is returned. Errors raised by an output port can be recovered
    /// by downcasting to [`PortError`](crate::port::PortError).
    pub fn process_remote_call(&self) -> Result<(), CallError> {
        let id = self.id;
        let (caller, tag, call) = self.shared.wait_for(
            |state| {
                let endpoint = state.endpoints.get_mut(&id)?;
                let (caller, tag) = endpoint.pending_calls.pop_front()?;

                Some((caller, tag, endpoint.registry.get(tag)))
            },
            || TransportError::IdleTimeout,
        )?;

        self.dispatch(caller, tag, call)
    }

    /// Processes all remote calls that are currently pending, without
    /// blocking.
    ///
    /// Returns the number of calls processed, or the first error returned by
    /// a call.
    pub fn process_pending_remote_calls(&self) -> Result<usize, CallError> {
        let mut count = 0;
        loop {
            let next = {
                let mut state = self.shared.lock();
                state.endpoints.get_mut(&self.id).and_then(|endpoint| {
                    let (caller, tag) = endpoint.pending_calls.pop_front()?;

                    Some((caller, tag, endpoint.registry.get(tag)))
                })
            };
            let Some((caller, tag, call)) = next else {
                return Ok(count);
            };
            self.dispatch(caller, tag, call)?;
            count += 1;
        }
    }

    /// Returns the tags of all remote calls bound on this endpoint, in
    /// increasing order.
    pub fn registered_tags(&self) -> Vec<Tag> {
        self.shared
            .lock()
            .endpoints
            .get(&self.id)
            .map(|endpoint| endpoint.registry.tags())
            .unwrap_or_default()
    }

    fn dispatch(&self, caller: PeerId, tag: Tag, call: Option<RemoteCall>) -> Result<(), CallError> {
        trace!(endpoint = self.id.0, caller = caller.0, tag = tag.0, "dispatching remote call");
        let call = call.ok_or(TransportError::UnknownTag(tag))?;

        call(caller)
    }
}

impl Transport for LocalTransport {
    fn register_remote_call(&self, tag: Tag, call: RemoteCall) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state
            .endpoints
            .entry(self.id)
            .or_default()
            .registry
            .add(tag, call)
    }

    fn unregister_remote_call(&self, tag: Tag) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        match state.endpoints.get_mut(&self.id) {
            Some(endpoint) => endpoint.registry.remove(tag).map(drop),
            None => Err(TransportError::UnknownTag(tag)),
        }
    }

    fn send(&self, payload: &[u8], peer: PeerId, tag: Tag) -> Result<(), TransportError> {
        {
            let mut state = self.shared.lock();
            if state.is_shut_down {
                return Err(TransportError::Disconnected);
            }
            if !state.endpoints.contains_key(&peer) {
                return Err(TransportError::UnknownPeer(peer));
            }
            state
                .mailboxes
                .entry((self.id, peer, tag))
                .or_default()
                .push_back(payload.to_vec());
        }
        self.shared.activity.notify_all();

        Ok(())
    }

    fn receive(&self, peer: PeerId, tag: Tag) -> Result<Vec<u8>, TransportError> {
        let key = (peer, self.id, tag);

        self.shared.wait_for(
            |state| state.mailboxes.get_mut(&key)?.pop_front(),
            || TransportError::Timeout { peer, tag },
        )
    }

    fn trigger_remote_call(&self, peer: PeerId, tag: Tag) -> Result<(), TransportError> {
        {
            let mut state = self.shared.lock();
            if state.is_shut_down {
                return Err(TransportError::Disconnected);
            }
            let endpoint = state
                .endpoints
                .get_mut(&peer)
                .ok_or(TransportError::UnknownPeer(peer))?;
            endpoint.pending_calls.push_back((self.id, tag));
        }
        self.shared.activity.notify_all();

        Ok(())
    }
}

impl fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LocalTransport ({})", self.id)
    }
}
