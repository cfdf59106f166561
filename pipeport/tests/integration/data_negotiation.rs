//! Decision between data transfer and null marker.

use proptest::prelude::*;

use pipeport::port::{OutputPort, PortError, UpdateOutcome};
use pipeport::source::{DataSource, SharedSource, UpdateExtent};
use pipeport::time::{LogicalClock, Timestamp};
use pipeport::transport::Tag;
use pipeport::wire::DataMessage;

use crate::fixture::*;

const TAG: Tag = Tag(30);

#[test]
fn fresh_data_is_sent_with_a_later_timestamp() {
    let bench = bench();
    let (source, probe) = probe_source();
    source.lock().unwrap().update().unwrap();

    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_input(Some(source.clone()));
    port.set_tag(TAG).unwrap();

    let extent = UpdateExtent::Structured([0, 7, 0, 7, 0, 0]);
    send_request(&bench, TAG, &extent, Timestamp::new(5));
    let outcome = port.trigger_update(DOWNSTREAM).unwrap();

    let (data, time) = receive_reply(&bench, TAG);
    assert_eq!(data, payload("1"));
    assert!(time > Timestamp::new(5));
    assert_eq!(outcome, UpdateOutcome::Transferred(time));
    assert_eq!(port.update_time(), time);
    assert_eq!(source.lock().unwrap().update_extent(), extent);
    // Not released: no recomputation.
    assert_eq!(probe.calls(), 1);
}

#[test]
fn minted_timestamp_exceeds_large_peer_timestamp() {
    let bench = bench();
    let (source, _probe) = probe_source();

    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_input(Some(source));
    port.set_tag(TAG).unwrap();

    let far = Timestamp::new(1 << 40);
    send_request(&bench, TAG, &UpdateExtent::WHOLE, far);
    port.trigger_update(DOWNSTREAM).unwrap();

    assert!(receive_reply(&bench, TAG).1 > far);
}

#[test]
fn exhausted_timestamps_send_null_without_advancing_clock() {
    let bench = bench();
    let (source, _probe) = probe_source();

    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_input(Some(source));
    port.set_tag(TAG).unwrap();

    let last = Timestamp::new(u64::MAX);
    send_request(&bench, TAG, &UpdateExtent::WHOLE, Timestamp::new(u64::MAX - 1));
    let outcome = port.trigger_update(DOWNSTREAM).unwrap();
    assert_eq!(outcome, UpdateOutcome::Transferred(last));
    assert_eq!(receive_reply(&bench, TAG), (payload("1"), last));

    // The peer value never reaches the process-wide clock.
    assert!(LogicalClock::tick() < last);

    // Nothing is later than the largest timestamp: the peer gets a null
    // marker and its own timestamp back.
    for peer_time in [last, Timestamp::new(3)] {
        send_request(&bench, TAG, &UpdateExtent::WHOLE, peer_time);
        assert!(matches!(
            port.trigger_update(DOWNSTREAM),
            Err(PortError::TimestampOverflow(t)) if t == peer_time
        ));
        assert_eq!(receive_reply(&bench, TAG), (DataMessage::Null, peer_time));
    }
    assert_eq!(port.update_time(), last);
}

#[test]
fn unbound_port_sends_null_and_echoes_timestamp() {
    let bench = bench();
    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_tag(TAG).unwrap();

    send_request(&bench, TAG, &UpdateExtent::WHOLE, Timestamp::new(77));
    let outcome = port.trigger_update(DOWNSTREAM).unwrap();

    assert_eq!(outcome, UpdateOutcome::NoData(Timestamp::new(77)));
    assert_eq!(
        receive_reply(&bench, TAG),
        (DataMessage::Null, Timestamp::new(77))
    );
    assert_eq!(port.update_time(), Timestamp::ZERO);
}

#[test]
fn released_data_is_recomputed_before_deciding() {
    let bench = bench();
    let (source, probe) = probe_source();
    source.lock().unwrap().update().unwrap();
    source.lock().unwrap().release_data();

    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_input(Some(source.clone()));
    port.set_tag(TAG).unwrap();

    send_request(&bench, TAG, &UpdateExtent::WHOLE, Timestamp::ZERO);
    let outcome = port.trigger_update(DOWNSTREAM).unwrap();

    assert!(outcome.is_transferred());
    assert_eq!(probe.calls(), 2);
    assert_eq!(receive_reply(&bench, TAG).0, payload("2"));
    assert!(!source.lock().unwrap().is_data_released());
}

#[test]
fn failed_recompute_keeps_extent_and_echoes_timestamp() {
    let bench = bench();
    let (source, probe) = probe_source();
    probe.set_failing(true);

    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_input(Some(source.clone()));
    port.set_tag(TAG).unwrap();

    let extent = UpdateExtent::Piece {
        piece: 1,
        number_of_pieces: 2,
        ghost_level: 1,
    };
    send_request(&bench, TAG, &extent, Timestamp::new(9));
    let outcome = port.trigger_update(DOWNSTREAM).unwrap();

    assert_eq!(outcome, UpdateOutcome::NoData(Timestamp::new(9)));
    assert_eq!(
        receive_reply(&bench, TAG),
        (DataMessage::Null, Timestamp::new(9))
    );
    // The extent was applied and seen by the failed computation.
    assert_eq!(source.lock().unwrap().update_extent(), extent);
    assert_eq!(*probe.extents.lock().unwrap(), vec![extent]);
}

#[test]
fn recovery_after_failure_transfers_again() {
    let bench = bench();
    let (source, probe) = probe_source();
    probe.set_failing(true);

    let mut port = OutputPort::new(bench.upstream.clone());
    port.set_input(Some(source));
    port.set_tag(TAG).unwrap();

    send_request(&bench, TAG, &UpdateExtent::WHOLE, Timestamp::new(4));
    assert!(!port.trigger_update(DOWNSTREAM).unwrap().is_transferred());
    let (_, echoed) = receive_reply(&bench, TAG);

    probe.set_failing(false);
    send_request(&bench, TAG, &UpdateExtent::WHOLE, echoed);
    let outcome = port.trigger_update(DOWNSTREAM).unwrap();

    assert!(outcome.is_transferred());
    assert!(outcome.timestamp() > echoed);
    assert_eq!(receive_reply(&bench, TAG).0, payload("2"));
}

#[derive(Clone, Debug)]
struct Step {
    release_before: bool,
    bound: bool,
    peer_time: u64,
}

fn step() -> impl Strategy<Value = Step> {
    (any::<bool>(), prop::bool::weighted(0.8), 0u64..1_000_000).prop_map(
        |(release_before, bound, peer_time)| Step {
            release_before,
            bound,
            peer_time,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn transferred_timestamps_strictly_increase(steps in prop::collection::vec(step(), 1..24)) {
        let bench = bench();
        let (source, _probe) = probe_source();
        let shared: SharedSource = source.clone();

        let mut port = OutputPort::new(bench.upstream.clone());
        port.set_tag(TAG).unwrap();

        let mut last_transferred = Timestamp::ZERO;
        for step in steps {
            if step.release_before {
                source.lock().unwrap().release_data();
            }
            port.set_input(step.bound.then(|| shared.clone()));

            let peer_time = Timestamp::new(step.peer_time);
            send_request(&bench, TAG, &UpdateExtent::WHOLE, peer_time);
            let outcome = port.trigger_update(DOWNSTREAM).unwrap();
            let (data, time) = receive_reply(&bench, TAG);

            prop_assert_eq!(outcome.timestamp(), time);
            match outcome {
                UpdateOutcome::Transferred(_) => {
                    prop_assert!(step.bound);
                    prop_assert!(matches!(data, DataMessage::Payload(_)));
                    prop_assert!(time > last_transferred);
                    prop_assert!(time > peer_time);
                    last_transferred = time;
                }
                UpdateOutcome::NoData(_) => {
                    prop_assert!(!step.bound);
                    prop_assert_eq!(data, DataMessage::Null);
                    prop_assert_eq!(time, peer_time);
                }
            }
        }
    }
}
