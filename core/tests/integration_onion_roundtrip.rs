// Onion round-trips across a simulated cascade, no threads involved
//
// Drives the assembler directly against the relay-side primitives:
// establish and data layers peel hop by hop, reply layers stack up and
// come off in one client-side pass.

mod common;

use common::CascadeSim;
use mixcascade_core::protocol::AssembleError;
use mixcascade_core::{Cascade, ChannelConfig, MessageAssembler};
use std::sync::{Arc, Mutex};

fn assembler_for(sim_config: &ChannelConfig) -> MessageAssembler {
    let cascade = Cascade::from_descriptors(&sim_config.relays).unwrap();
    MessageAssembler::new(&cascade, sim_config).unwrap()
}

fn run_round(
    sim: &Arc<Mutex<CascadeSim>>,
    assembler: &mut MessageAssembler,
    frame: Vec<u8>,
) -> Vec<u8> {
    let reply_frame = sim
        .lock()
        .unwrap()
        .process_frame(&frame)
        .expect("reply expected");
    assembler.parse_reply(reply_frame).unwrap()
}

#[test]
fn test_establish_reaches_exit_across_three_relays() {
    let (sim, config) = CascadeSim::new(3);
    let mut assembler = assembler_for(&config);

    let wire = assembler.build_establish(b"first application bytes").unwrap();
    assert_eq!(wire.len(), 1296 + 2 * 240);

    let reply = run_round(&sim, &mut assembler, wire);
    assert!(reply.is_empty(), "no reply was scripted");
    assert_eq!(
        sim.lock().unwrap().received_bytes(),
        b"first application bytes"
    );
}

#[test]
fn test_many_data_rounds_stay_in_sync() {
    let (sim, config) = CascadeSim::new(3);
    let mut assembler = assembler_for(&config);

    let establish = assembler.build_establish(b"").unwrap();
    run_round(&sim, &mut assembler, establish);

    let mut expected = Vec::new();
    for round in 0..20u32 {
        let chunk: Vec<u8> = (0..((round as usize * 37) % 900 + 1))
            .map(|i| (i as u32 + round) as u8)
            .collect();
        expected.extend_from_slice(&chunk);
        let wire = assembler.build_data(&chunk).unwrap();
        run_round(&sim, &mut assembler, wire);
    }
    assert_eq!(sim.lock().unwrap().received_bytes(), expected);
}

#[test]
fn test_reply_layers_come_off_in_one_pass() {
    let (sim, config) = CascadeSim::new(4);
    let mut assembler = assembler_for(&config);

    {
        let mut sim = sim.lock().unwrap();
        sim.replies.push_back(b"reply one".to_vec());
        sim.replies.push_back(vec![0xEE; 1000]);
        sim.replies.push_back(Vec::new()); // dummy
        sim.replies.push_back(b"last".to_vec());
    }

    let establish = assembler.build_establish(b"").unwrap();
    assert_eq!(run_round(&sim, &mut assembler, establish), b"reply one");

    let wire = assembler.build_data(b"").unwrap();
    assert_eq!(run_round(&sim, &mut assembler, wire), vec![0xEE; 1000]);

    let wire = assembler.build_data(b"").unwrap();
    assert!(run_round(&sim, &mut assembler, wire).is_empty());

    let wire = assembler.build_data(b"").unwrap();
    assert_eq!(run_round(&sim, &mut assembler, wire), b"last");
}

#[test]
fn test_dummy_rounds_are_full_size_on_the_wire() {
    let (sim, config) = CascadeSim::new(2);
    let mut assembler = assembler_for(&config);

    let establish = assembler.build_establish(b"").unwrap();
    let establish_len = establish.len();
    run_round(&sim, &mut assembler, establish);

    let dummy = assembler.build_data(b"").unwrap();
    let real = assembler.build_data(b"real payload").unwrap();
    // Cover traffic is indistinguishable by size.
    assert_eq!(dummy.len(), real.len());
    assert_eq!(establish_len, 1296 + 240);
    run_round(&sim, &mut assembler, dummy);
    run_round(&sim, &mut assembler, real);
    assert_eq!(sim.lock().unwrap().received_bytes(), b"real payload");
}

#[test]
fn test_oversize_chunk_rejected_not_truncated() {
    let (sim, config) = CascadeSim::new(2);
    let mut assembler = assembler_for(&config);
    let establish = assembler.build_establish(b"").unwrap();
    run_round(&sim, &mut assembler, establish);

    let oversize = vec![1u8; assembler.max_chunk_len() + 1];
    assert!(matches!(
        assembler.build_data(&oversize),
        Err(AssembleError::MessageTooLong { .. })
    ));
    // The failed build consumed nothing: the next exact-fit chunk works.
    let exact = vec![2u8; assembler.max_chunk_len()];
    let wire = assembler.build_data(&exact).unwrap();
    run_round(&sim, &mut assembler, wire);
    assert_eq!(sim.lock().unwrap().received_bytes(), exact);
}

#[test]
fn test_release_marker_ends_cascade() {
    let (sim, config) = CascadeSim::new(2);
    let mut assembler = assembler_for(&config);
    let establish = assembler.build_establish(b"").unwrap();
    run_round(&sim, &mut assembler, establish);

    let marker = assembler.build_release();
    assert!(marker.is_empty());
    assert!(sim.lock().unwrap().process_frame(&marker).is_none());
    assert!(sim.lock().unwrap().released);
}

#[test]
fn test_single_relay_cascade() {
    let (sim, config) = CascadeSim::new(1);
    let mut assembler = assembler_for(&config);

    sim.lock().unwrap().replies.push_back(b"solo".to_vec());
    let establish = assembler.build_establish(b"hi").unwrap();
    assert_eq!(establish.len(), 1296);
    assert_eq!(run_round(&sim, &mut assembler, establish), b"solo");
    assert_eq!(sim.lock().unwrap().received_bytes(), b"hi");
}
