//! Output ports that let a visualization pipeline span two processes.
//!
//! An upstream process owns a computed data object, the *source*. A
//! downstream process requests the metadata and the data of this source on
//! demand through an [`OutputPort`](port::OutputPort) bound to a messaging
//! [`Transport`](transport::Transport).
//!
//! Each port exposes two remote-callable operations:
//!
//! * an *information* operation, bound at the port tag, which refreshes the
//!   metadata of the source and sends it to the requesting peer together with
//!   the pipeline modification time,
//! * a *data* operation, bound at the port tag plus one, which receives the
//!   requested extent and the timestamp of the last data held by the peer,
//!   recomputes the source if its data was released, and replies with either
//!   the data and a fresh timestamp or a null marker and the unchanged peer
//!   timestamp.
//!
//! Staleness is tracked with logical [timestamps](time::Timestamp) rather
//! than the wall clock.
//!
//! Optionally, a port can compute its source ahead of the next request right
//! after answering a data request (*pipelining*), so as to hide the
//! computation latency from the peer.
//!
//! # A practical overview
//!
//! ```text
//!   downstream process                      upstream process
//! ┌────────────────────┐   information   ┌────────────────────┐    ┌────────┐
//! │                    ├────────────────▶│                    │    │        │
//! │     InputPort      │      data       │     OutputPort     ├───▶│ Source │
//! │                    ├────────────────▶│                    │    │        │
//! └────────────────────┘                 └────────────────────┘    └────────┘
//! ```
//!
//! The following example connects two endpoints of an in-process
//! [`LocalNetwork`](transport::LocalNetwork). The upstream endpoint processes
//! remote calls in a background thread.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use pipeport::input::InputPort;
//! use pipeport::port::OutputPort;
//! use pipeport::source::{self, CachedSource, DataInformation, UpdateExtent};
//! use pipeport::transport::{LocalNetwork, PeerId, Tag};
//!
//! let network = LocalNetwork::new().set_receive_timeout(Duration::from_secs(5));
//! let upstream = Arc::new(network.endpoint(PeerId(0)));
//! let downstream = Arc::new(network.endpoint(PeerId(1)));
//!
//! // Upstream: a source computing a buffer and a port serving it.
//! let source = source::shared(CachedSource::new(DataInformation::default(), |_| {
//!     Ok(Bytes::from_static(b"some data"))
//! }));
//! let mut port = OutputPort::new(upstream.clone());
//! port.set_input(Some(source));
//! port.set_tag(Tag(2)).unwrap();
//!
//! let server = thread::spawn(move || {
//!     // Serve one information request and one data request.
//!     for _ in 0..2 {
//!         upstream.process_remote_call().unwrap();
//!     }
//!     port
//! });
//!
//! // Downstream: request the metadata, then the data.
//! let mut input = InputPort::new(downstream, PeerId(0), Tag(2));
//! let record = input.update_information().unwrap().unwrap();
//! let data = input.update(&UpdateExtent::WHOLE).unwrap();
//!
//! assert!(record.pipeline_mtime > pipeport::time::Timestamp::ZERO);
//! assert_eq!(data, Some(Bytes::from_static(b"some data")));
//! assert!(input.data_time() > pipeport::time::Timestamp::ZERO);
//!
//! server.join().unwrap();
//! ```
//!
//! # Logging
//!
//! Ports emit [`tracing`] events. Each remote operation runs inside an
//! `output_port` span at debug level carrying the `tag` and `peer` fields, so
//! that the activity of a single port can be selected with a `RUST_LOG`
//! directive such as `pipeport[output_port{tag=11}]=trace` when using the
//! `env-filter` feature of `tracing-subscriber`.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod input;
pub mod port;
pub mod source;
pub mod time;
pub mod transport;
mod util;
pub mod wire;
