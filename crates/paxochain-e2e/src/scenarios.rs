//! The six end-to-end scenarios and the cross-replica safety invariant
//! called out as "testable properties" in the governing specification,
//! driven black-box against a real [`ClusterHarness`].

use std::time::Duration;

use paxochain_consensus::Replica;
use paxochain_primitives::Roster;
use paxochain_storage::{Blockchain, Dictionary, NO_KEY};
use paxochain_types::Operation;

use crate::ClusterHarness;

const PUT_ACK: &str = "It will be done, my lord.";

/// Scenario 1: happy path PUT then GET, five servers all up.
#[tokio::test]
async fn happy_path_put_then_get() {
    let harness = ClusterHarness::start(5, 3).await.unwrap();

    let ack = harness.put(0, "alice", "42").await.unwrap();
    assert_eq!(ack, PUT_ACK);

    harness.wait_for_depth(0, 1).await.unwrap();
    for pid in 0..5 {
        harness.wait_for_depth(pid, 1).await.unwrap();
        assert_eq!(harness.dict_get(pid, "alice"), "42");
    }

    let value = harness.get(0, "alice").await.unwrap();
    assert_eq!(value, "42");
}

/// Scenario 2: GET on a key that was never PUT returns the `NO_KEY`
/// sentinel, bit-exact.
#[tokio::test]
async fn missing_key_returns_no_key_sentinel() {
    let harness = ClusterHarness::start(5, 3).await.unwrap();
    let value = harness.get(1, "bob").await.unwrap();
    assert_eq!(value, NO_KEY);
    assert_eq!(value, "NO_KEY");
}

/// Scenario 3: leader re-hint after a link failure. Every server but the
/// initial leader (0) is made to ignore it; the client eventually times out,
/// re-hints to a random (almost certainly healthy) server with
/// `force_leader = true`, and a new leader is elected and decides.
#[tokio::test]
async fn leader_rehint_after_link_failure() {
    let harness = ClusterHarness::start(5, 3).await.unwrap();
    harness.deafen_server(0);

    // The client's first attempt goes to server 0 (the default leader hint)
    // and is ignored by everyone else; after TEST_WAIT_TIME it re-hints to a
    // uniformly random server and retries with force_leader, repeating
    // until it lands on one of the four healthy servers.
    let ack = harness.put(0, "alice", "42").await.unwrap();
    assert_eq!(ack, PUT_ACK);

    for pid in 1..5 {
        harness.wait_for_depth(pid, 1).await.unwrap();
        assert_eq!(harness.dict_get(pid, "alice"), "42");
    }
}

/// Scenario 4: a minority partition (servers 3, 4) does not stop the
/// majority (0, 1, 2) from deciding, and converges once links are restored.
#[tokio::test]
async fn minority_partition_preserves_safety_and_converges_on_heal() {
    let harness = ClusterHarness::start(5, 3).await.unwrap();
    harness.isolate_server(3);
    harness.isolate_server(4);

    let ack = harness.put(0, "alice", "42").await.unwrap();
    assert_eq!(ack, PUT_ACK);
    for pid in 0..3 {
        harness.wait_for_depth(pid, 1).await.unwrap();
        assert_eq!(harness.dict_get(pid, "alice"), "42");
    }
    assert_eq!(harness.depth(3), 0, "isolated replica must not observe progress");
    assert_eq!(harness.depth(4), 0, "isolated replica must not observe progress");

    harness.restore_server(3);
    harness.restore_server(4);

    // Recovery only rides along on a Paxos exchange, and delivery into an
    // acceptor's per-depth slot races with other inbound messages on the
    // same connection; out-of-order RecoveryData is silently dropped, not
    // retried. Drive a few more rounds through the healthy leader so every
    // healed replica gets repeated opportunities to catch up.
    for i in 0..20u32 {
        if harness.depth(3) >= 1 && harness.depth(4) >= 1 {
            break;
        }
        harness.put(1, &format!("filler{i}"), "x").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    harness.wait_for_depth(3, 1).await.unwrap();
    harness.wait_for_depth(4, 1).await.unwrap();
    assert_eq!(harness.dict_get(3, "alice"), "42");
    assert_eq!(harness.dict_get(4, "alice"), "42");
}

/// Scenario 5: a client's rapid duplicate PUT on the same key collapses to
/// a single in-flight entry by `(op, key)` equality, ignoring value, and the
/// in-flight list empties once a single response lands.
#[tokio::test]
async fn duplicate_in_flight_put_collapses_by_op_and_key() {
    let harness = ClusterHarness::start(5, 1).await.unwrap();

    let engine = harness.client_engine(0);
    engine.send_request(Operation::put("k", "v1"));
    engine.send_request(Operation::put("k", "v2"));

    // Both pushes land in the in-flight list (equality only collapses them
    // on the response side), but they are the *same* logical request as far
    // as the client cares: one ClientResponse clears both.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while engine.in_flight_len() != 0 {
        if tokio::time::Instant::now() >= deadline {
            panic!("duplicate in-flight PUTs never cleared");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Scenario 6: a replica that decides 10 blocks, restarts (rebuilding its
/// `Blockchain` and `Dictionary` purely from the backup file), reproduces
/// every block in order and the same dictionary contents.
#[tokio::test]
async fn restart_rebuilds_log_and_dictionary() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blockchain_backup_0.txt");

    {
        let chain = Blockchain::open(&path).unwrap();
        for i in 0..10 {
            let op = Operation::put(format!("key{i}"), format!("value{i}"));
            let block = chain.generate_next(op);
            assert!(chain.append(block).unwrap());
        }
        assert_eq!(chain.depth(), 10);
    }

    let restored = Blockchain::open(&path).unwrap();
    assert_eq!(restored.depth(), 10);

    let mut dict = Dictionary::new();
    dict.update(&restored.blocks(), restored.depth());
    for i in 0..10 {
        assert_eq!(dict.get(&format!("key{i}")), format!("value{i}"));
    }

    // Rebuilding a `Replica` over the restored chain reprojects the same
    // dictionary without replaying any network traffic.
    let roster = Roster::new(1, 1, 3201, 2201).unwrap();
    let replica = Replica::new(0, roster, restored);
    assert_eq!(replica.depth(), 10);
    assert_eq!(replica.get("key9"), "value9");
}

/// Invariant 6 (safety): if two replicas both decide a block at the same
/// depth, the blocks are equal (modulo the `tentative` flag). Checked by
/// asserting every replica's full chain is byte-identical once a round has
/// decided everywhere.
#[tokio::test]
async fn decided_prefix_is_identical_across_all_replicas() {
    let harness = ClusterHarness::start(5, 2).await.unwrap();

    harness.put(0, "a", "1").await.unwrap();
    harness.put(1, "b", "2").await.unwrap();
    for pid in 0..5 {
        harness.wait_for_depth(pid, 2).await.unwrap();
    }

    let reference = harness.chain_renderings(0);
    for pid in 1..5 {
        assert_eq!(
            harness.chain_renderings(pid),
            reference,
            "replica {pid}'s decided prefix must match replica 0's"
        );
    }
}

impl ClusterHarness {
    /// Every decided block's canonical rendering, in depth order. Used to
    /// compare two replicas' logs for equality without depending on
    /// `Block`'s field order or its `tentative` flag.
    fn chain_renderings(&self, pid: u32) -> Vec<String> {
        self.blocks(pid).iter().map(|b| b.render()).collect()
    }
}
