//! Binding of port operations to transport tags.

use std::sync::Arc;

use pipeport::port::{OutputPort, PortError};
use pipeport::source::UpdateExtent;
use pipeport::time::Timestamp;
use pipeport::transport::{CallError, PeerId, Tag, Transport, TransportError};
use pipeport::wire::DataMessage;

use crate::fixture::*;

#[test]
fn same_tag_twice_leaves_bindings_unchanged() {
    let bench = bench();
    let mut port = OutputPort::new(bench.upstream.clone());

    port.set_tag(Tag(8)).unwrap();
    let mtime = port.mtime();
    port.set_tag(Tag(8)).unwrap();

    assert_eq!(bench.upstream.registered_tags(), vec![Tag(8), Tag(9)]);
    assert_eq!(port.tag(), Some(Tag(8)));
    assert_eq!(port.mtime(), mtime);
}

#[test]
fn retagging_moves_both_bindings() {
    let bench = bench();
    let mut port = OutputPort::new(bench.upstream.clone());

    port.set_tag(Tag(2)).unwrap();
    port.set_tag(Tag(12)).unwrap();

    assert_eq!(bench.upstream.registered_tags(), vec![Tag(12), Tag(13)]);
    assert_eq!(port.tag(), Some(Tag(12)));
}

#[test]
fn odd_tag_is_rejected() {
    let bench = bench();
    let mut port = OutputPort::new(bench.upstream.clone());

    assert!(matches!(port.set_tag(Tag(3)), Err(PortError::OddTag(Tag(3)))));
    assert!(bench.upstream.registered_tags().is_empty());
    assert_eq!(port.tag(), None);
}

#[test]
fn tag_in_use_leaves_port_untagged() {
    let bench = bench();
    let mut first = OutputPort::new(bench.upstream.clone());
    let mut second = OutputPort::new(bench.upstream.clone());

    first.set_tag(Tag(4)).unwrap();
    second.set_tag(Tag(6)).unwrap();

    assert!(matches!(
        second.set_tag(Tag(4)),
        Err(PortError::Transport(TransportError::TagInUse(Tag(4))))
    ));
    assert_eq!(second.tag(), None);
    assert_eq!(bench.upstream.registered_tags(), vec![Tag(4), Tag(5)]);
}

#[test]
fn data_tag_in_use_rolls_back_information_binding() {
    let bench = bench();
    bench
        .upstream
        .register_remote_call(Tag(7), Arc::new(|_: PeerId| -> Result<(), CallError> { Ok(()) }))
        .unwrap();

    let mut port = OutputPort::new(bench.upstream.clone());

    assert!(matches!(
        port.set_tag(Tag(6)),
        Err(PortError::Transport(TransportError::TagInUse(Tag(7))))
    ));
    assert_eq!(bench.upstream.registered_tags(), vec![Tag(7)]);
    assert_eq!(port.tag(), None);
}

#[test]
fn dropped_port_unregisters_its_operations() {
    let bench = bench();
    let mut kept = OutputPort::new(bench.upstream.clone());
    let mut dropped = OutputPort::new(bench.upstream.clone());

    kept.set_tag(Tag(0)).unwrap();
    dropped.set_tag(Tag(10)).unwrap();
    drop(dropped);

    assert_eq!(bench.upstream.registered_tags(), vec![Tag(0), Tag(1)]);
}

#[test]
fn remote_calls_reach_the_port() {
    let bench = bench();
    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_tag(Tag(14)).unwrap();

    bench
        .downstream
        .trigger_remote_call(UPSTREAM, Tag(14))
        .unwrap();
    bench
        .downstream
        .trigger_remote_call(UPSTREAM, Tag(15))
        .unwrap();
    send_request(&bench, Tag(14), &UpdateExtent::WHOLE, Timestamp::new(2));

    assert_eq!(bench.upstream.process_pending_remote_calls().unwrap(), 2);
    assert_eq!(receive_information(&bench, Tag(14)), None);
    assert_eq!(
        receive_reply(&bench, Tag(14)),
        (DataMessage::Null, Timestamp::new(2))
    );
}

#[test]
fn remote_call_after_retagging_misses_old_tag() {
    let bench = bench();
    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_tag(Tag(16)).unwrap();
    port.set_tag(Tag(18)).unwrap();

    bench
        .downstream
        .trigger_remote_call(UPSTREAM, Tag(16))
        .unwrap();

    let err = bench.upstream.process_pending_remote_calls().unwrap_err();
    assert_eq!(
        err.downcast_ref::<TransportError>(),
        Some(&TransportError::UnknownTag(Tag(16)))
    );
}

#[test]
fn debug_output_shows_configuration() {
    let bench = bench();
    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_tag(Tag(22)).unwrap();
    port.set_pipeline(true);

    let text = format!("{:?}", port);

    assert!(text.contains("Tag(22)"));
    assert!(text.contains("pipeline: true"));
    assert!(text.contains("has_input: false"));
}
