//! End-to-end scenarios (a subset of those in the design notes) driven over
//! real loopback UDP sockets. Convergence is polled with a bounded timeout
//! rather than assumed after a fixed number of scheduler turns, since the
//! concurrency model allows arbitrary interleaving between nodes' receive
//! threads.

use std::io::{BufRead, BufReader};
use std::net::UdpSocket;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use routenoded::cli;
use routenoded::codec::{self, Frame};
use routenoded::node::Node;

fn spawn_node(args: &str) -> Arc<Node> {
    let argv: Vec<String> = args.split_whitespace().map(str::to_string).collect();
    let config = cli::parse(&argv).expect("valid test configuration");
    let node = Arc::new(Node::bind(config).expect("bind should succeed on a free test port"));
    let handle = Arc::clone(&node);
    thread::spawn(move || {
        let _ = handle.run();
    });
    node
}

fn poll_until<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn dv_two_node_direct_link_converges() {
    let a = spawn_node("dv r 30 23101 23102 4 last");
    let _b = spawn_node("dv r 30 23102 23101 4");

    let converged = poll_until(Duration::from_secs(5), || {
        a.routing_snapshot()
            .iter()
            .any(|line| line.contains("(4) -> Node 23102"))
    });
    assert!(converged, "expected a direct route to the neighbor");
}

#[test]
fn dv_three_node_chain_converges_through_relay() {
    // 23201 -- 23202 -- 23203, no direct 23201-23203 link.
    let a = spawn_node("dv r 30 23201 23202 1 last");
    let _b = spawn_node("dv r 30 23202 23201 1 23203 1");
    let c = spawn_node("dv r 30 23203 23202 1");

    let a_sees_c = poll_until(Duration::from_secs(10), || {
        a.routing_snapshot().iter().any(|line| {
            line.contains("(2) -> Node 23203") && line.contains("Next hop -> Node 23202")
        })
    });
    assert!(a_sees_c, "expected node a to route to c via the relay");

    let c_sees_a = poll_until(Duration::from_secs(10), || {
        c.routing_snapshot().iter().any(|line| {
            line.contains("(2) -> Node 23201") && line.contains("Next hop -> Node 23202")
        })
    });
    assert!(c_sees_a, "expected the relay to propagate a's reachability back to c");
}

#[test]
fn dv_poisoned_reverse_advertises_infinity_upstream() {
    // Triangle: 23301 (poisoned) learns a route to 23304 via 23303 that is
    // cheaper than its direct link to 23303, so its advertisement back to
    // 23303 for destination 23304 must carry Infinity.
    let _center = spawn_node("dv p 30 23301 23302 5 23303 1 last");
    let _left = spawn_node("dv r 30 23302 23301 5");
    let relay = spawn_node("dv r 30 23303 23301 1 23304 1 last");
    let _far = spawn_node("dv r 30 23304 23303 1");

    let converged = poll_until(Duration::from_secs(10), || {
        relay
            .routing_snapshot()
            .iter()
            .any(|line| line.contains("Node 23304") )
    });
    assert!(converged, "expected the relay's own table to settle first");

    // The poisoned node's advertisement to 23303 is not directly observable
    // through `Node`'s public surface; its effect is that 23303 never learns
    // a path to 23304 *through* 23301, which the chain test already covers
    // from the other direction. This test exists to exercise poisoned mode's
    // parse/run path end-to-end without panicking under real traffic.
}

#[test]
fn ls_floods_lsas_and_builds_symmetric_topology() {
    let a = spawn_node("ls r 30 23401 23402 2 last");
    let b = spawn_node("ls r 30 23402 23401 2 23403 3");
    let c = spawn_node("ls r 30 23403 23402 3");

    let settled = poll_until(Duration::from_secs(10), || {
        let ta = a.topology_snapshot();
        let tb = b.topology_snapshot();
        let tc = c.topology_snapshot();
        ta.len() == 2 && tb.len() == 2 && tc.len() == 2
    });
    assert!(settled, "expected every node's topology database to learn both edges");

    for node in [&a, &b, &c] {
        let topo = node.topology_snapshot();
        assert!(topo.iter().any(|l| l.contains("(2) from Node 23401 to Node 23402")));
        assert!(topo.iter().any(|l| l.contains("(3) from Node 23402 to Node 23403")));
    }
}

/// The first Dijkstra run is deferred by a fixed routing interval to let the
/// initial flood quiesce (see the link-state engine's design notes); this
/// test exercises that full real-time delay and is excluded from the default
/// run.
#[test]
#[ignore]
fn ls_full_convergence_after_routing_interval() {
    let a = spawn_node("ls r 30 23501 23502 1 last");
    let c = spawn_node("ls r 30 23503 23502 1");
    let _b = spawn_node("ls r 30 23502 23501 1 23503 1");

    let converged = poll_until(Duration::from_secs(40), || {
        a.routing_snapshot()
            .iter()
            .any(|line| line.contains("Node 23503") && line.contains("Next hop -> Node 23502"))
    });
    assert!(converged, "expected a to route to c via b after the deferred Dijkstra run");

    let converged_back = poll_until(Duration::from_secs(5), || {
        c.routing_snapshot()
            .iter()
            .any(|line| line.contains("Node 23501") && line.contains("Next hop -> Node 23502"))
    });
    assert!(converged_back, "expected the symmetric route to have converged too");
}

/// §8 scenario 5: delivering the same LSA twice must produce exactly one
/// "received from" line and one "DUPLICATE ... DROPPED" block, not both for
/// the duplicate delivery (spec.md §6.3's two shapes describe one receipt
/// event each, never both at once). Driven against the real binary over a
/// real socket, since the defect this guards against is in the process's
/// stdout ordering, which only the compiled `main`/`node` logging path can
/// exhibit — an in-process engine-level test can't observe it.
#[test]
fn ls_duplicate_lsa_logs_received_once_and_duplicate_once() {
    let node_port: u16 = 23601;
    let neighbor_port: u16 = 23602;

    let mut child = Command::new(env!("CARGO_BIN_EXE_routenoded"))
        .args(["ls", "r", "30", &node_port.to_string(), &neighbor_port.to_string(), "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn routenoded binary");

    let stdout = child.stdout.take().expect("child stdout should be piped");
    let lines: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let collector = Arc::clone(&lines);
    let reader = thread::spawn(move || {
        for line in BufReader::new(stdout).lines().flatten() {
            collector.lock().unwrap().push(line);
        }
    });

    thread::sleep(Duration::from_millis(200));

    let sender = UdpSocket::bind(("127.0.0.1", neighbor_port)).expect("bind fake neighbor socket");
    let mut neighbors = std::collections::BTreeMap::new();
    neighbors.insert(node_port, 1);
    let frame = Frame::Lsa {
        origin: neighbor_port,
        neighbors,
        seq: 1.0,
    };
    let bytes = codec::encode_frame(&frame);
    sender.send_to(&bytes, ("127.0.0.1", node_port)).unwrap();
    thread::sleep(Duration::from_millis(150));
    sender.send_to(&bytes, ("127.0.0.1", node_port)).unwrap();

    thread::sleep(Duration::from_millis(300));
    let _ = child.kill();
    let _ = child.wait();
    let _ = reader.join();

    let captured = lines.lock().unwrap();
    let received_count = captured
        .iter()
        .filter(|l| l.contains("LSA of Node") && l.contains("received from Node"))
        .count();
    let duplicate_count = captured
        .iter()
        .filter(|l| l.contains("DUPLICATE LSA packet received AND DROPPED"))
        .count();

    assert_eq!(received_count, 1, "expected exactly one LSA-received line, got: {:?}", *captured);
    assert_eq!(duplicate_count, 1, "expected exactly one DUPLICATE-dropped line, got: {:?}", *captured);
}
