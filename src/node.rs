//! Node runtime (§4.2): owns the socket and the shared routing state, and
//! drives the receive loop plus every timer (initial broadcast, periodic
//! LS re-advertise, the scheduled cost-change trigger, the deferred first
//! Dijkstra run). Matches the multi-threaded-with-one-coarse-mutex model
//! `spec.md` §5/§9 calls "the simplest faithful model" of
//! `routenode.py`'s thread-per-timer layout, rather than the daemon
//! crate's single-threaded poll loop (`runtime/daemon.rs`), since this
//! system's concurrency guarantees are specified directly against threads.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{Algorithm, NodeConfig};
use crate::codec::{self, DistanceVector, Frame};
use crate::engine::dv::DvEngine;
use crate::engine::ls::LsEngine;
use crate::model::neighbor::NeighborTable;
use crate::runtime::clock::{format_bracket, unix_now};
use crate::runtime::transport::UdpTransport;

/// Fixed routing-computation delay (§4.2, §9 "open questions"): distinct
/// from the CLI `update-interval`, which governs only the LS periodic
/// re-advertise. Matches `routenode.py`'s module-level `ROUTING_INTERVAL`.
const ROUTING_INTERVAL_SECS: f64 = 30.0;
const DV_COST_CHANGE_DELAY_SECS: f64 = 2.0;

struct OwnLsa {
    origin: u16,
    seq: f64,
    bytes: Vec<u8>,
}

enum EngineState {
    Dv(DvEngine),
    Ls {
        engine: LsEngine,
        own: Option<OwnLsa>,
    },
}

type SharedTransport = Arc<UdpTransport>;
type SharedState = Arc<Mutex<EngineState>>;

pub struct Node {
    local_port: u16,
    config: NodeConfig,
    transport: SharedTransport,
    state: SharedState,
}

impl Node {
    pub fn bind(config: NodeConfig) -> Result<Self> {
        let transport = UdpTransport::bind(config.local_port)
            .with_context(|| format!("failed to bind 127.0.0.1:{}", config.local_port))?;
        let neighbors = NeighborTable::new(config.neighbors.iter().copied());

        let state = match config.algorithm {
            Algorithm::Dv => {
                EngineState::Dv(DvEngine::new(config.local_port, config.mode, neighbors))
            }
            Algorithm::Ls => EngineState::Ls {
                engine: LsEngine::new(config.local_port, neighbors),
                own: None,
            },
        };

        info!(
            "node bound at 127.0.0.1:{} algorithm={:?} mode={:?}",
            config.local_port, config.algorithm, config.mode
        );

        Ok(Self {
            local_port: config.local_port,
            config,
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Runs the node forever (§4.2): the startup sequence, then the receive
    /// loop on the calling thread. There is no graceful shutdown (Non-goal);
    /// this only returns on an unrecoverable socket error.
    pub fn run(&self) -> Result<()> {
        match self.config.algorithm {
            Algorithm::Dv => self.start_dv(),
            Algorithm::Ls => self.start_ls(),
        }
        self.receive_loop()
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Snapshot of the current routing table, rendered the same way the
    /// required log lines are (§6.3); exposed for tests that need to poll
    /// for convergence without scraping process output.
    pub fn routing_snapshot(&self) -> Vec<String> {
        let guard = self.state.lock().expect("node state lock poisoned");
        match &*guard {
            EngineState::Dv(engine) => engine.routing().render(),
            EngineState::Ls { engine, .. } => engine.routing().render(),
        }
    }

    /// Snapshot of the topology database (LS only; empty under DV).
    pub fn topology_snapshot(&self) -> Vec<String> {
        let guard = self.state.lock().expect("node state lock poisoned");
        match &*guard {
            EngineState::Dv(_) => Vec::new(),
            EngineState::Ls { engine, .. } => engine.topology().render(),
        }
    }

    fn start_dv(&self) {
        if !self.config.last {
            return;
        }
        dv_broadcast(&self.transport, &self.state, self.local_port);
        print_dv_routing(&self.state, self.local_port);

        if let Some(new_cost) = self.config.cost_change {
            let transport = Arc::clone(&self.transport);
            let state = Arc::clone(&self.state);
            let local_port = self.local_port;
            thread::spawn(move || {
                thread::sleep(Duration::from_secs_f64(DV_COST_CHANGE_DELAY_SECS));
                dv_local_cost_change(&transport, &state, local_port, new_cost);
            });
        }
    }

    fn start_ls(&self) {
        if !self.config.last {
            return;
        }
        originate_and_cache_own_lsa(&self.state, self.local_port);
        ls_flood_own(&self.transport, &self.state);
        ls_start_timers(
            Arc::clone(&self.transport),
            Arc::clone(&self.state),
            self.local_port,
            self.config.update_interval_secs,
            self.config.cost_change,
        );
    }

    fn receive_loop(&self) -> Result<()> {
        loop {
            let (bytes, sender_port) = self
                .transport
                .recv_blocking()
                .context("receive loop: socket error")?;

            let frame = match codec::decode_frame(&bytes) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!("dropping malformed datagram from {sender_port}: {err}");
                    continue;
                }
            };

            match frame {
                Frame::Tab(vector) => {
                    dv_handle_tab(&self.transport, &self.state, self.local_port, sender_port, vector);
                }
                Frame::Lsa {
                    origin,
                    neighbors,
                    seq,
                } => {
                    ls_handle_lsa(
                        &self.transport,
                        &self.state,
                        self.local_port,
                        sender_port,
                        &bytes,
                        origin,
                        neighbors,
                        seq,
                        self.config.update_interval_secs,
                        self.config.cost_change,
                    );
                }
                Frame::Cos { cost } => match self.config.algorithm {
                    Algorithm::Dv => {
                        dv_handle_cos(&self.transport, &self.state, self.local_port, sender_port, cost);
                    }
                    Algorithm::Ls => {
                        ls_handle_cos(&self.transport, &self.state, self.local_port, sender_port, cost);
                    }
                },
            }
        }
    }
}

// ---------------------------------------------------------------- logging

fn log_message_sent(local: u16, to: u16) {
    println!(
        "{} Message sent from Node {} to Node {}",
        format_bracket(unix_now()),
        local,
        to
    );
}

fn log_message_received(local: u16, from: u16) {
    println!(
        "{} Message received at Node {} from Node {}",
        format_bracket(unix_now()),
        local,
        from
    );
}

fn log_cost_updated(peer: u16, cost: u32) {
    println!(
        "{} Node {} cost updated to {}",
        format_bracket(unix_now()),
        peer,
        cost
    );
}

fn log_link_sent(local: u16, peer: u16) {
    println!(
        "{} Link value message sent from Node {} to Node {}",
        format_bracket(unix_now()),
        local,
        peer
    );
}

fn log_link_received(local: u16, peer: u16) {
    println!(
        "{} Link value message received at Node {} from Node {}",
        format_bracket(unix_now()),
        local,
        peer
    );
}

fn log_lsa_sent(origin: u16, seq: f64, to: u16) {
    println!(
        "{} LSA of Node {} with sequence number {} sent to Node {}",
        format_bracket(unix_now()),
        origin,
        seq,
        to
    );
}

fn log_lsa_received(origin: u16, seq: f64, from: u16) {
    println!(
        "{} LSA of Node {} with sequence number {} received from Node {}",
        format_bracket(unix_now()),
        origin,
        seq,
        from
    );
}

fn log_lsa_duplicate(origin: u16, seq: f64, from: u16) {
    println!(
        "{} DUPLICATE LSA packet received AND DROPPED:",
        format_bracket(unix_now())
    );
    println!("- LSA of node {origin}");
    println!("- Sequence number {seq}");
    println!("- Received from {from}");
}

fn print_routing_table(local: u16, lines: &[String]) {
    println!("{} Node {} Routing Table", format_bracket(unix_now()), local);
    for line in lines {
        println!("{line}");
    }
}

fn print_topology_lines(local: u16, lines: &[String]) {
    println!(
        "{} Node {} Network Topology",
        format_bracket(unix_now()),
        local
    );
    for line in lines {
        println!("{line}");
    }
}

fn print_dv_routing(state: &SharedState, local_port: u16) {
    let guard = state.lock().expect("node state lock poisoned");
    let EngineState::Dv(engine) = &*guard else {
        return;
    };
    let lines = engine.routing().render();
    drop(guard);
    print_routing_table(local_port, &lines);
}

fn print_ls_routing(state: &SharedState, local_port: u16) {
    let guard = state.lock().expect("node state lock poisoned");
    let EngineState::Ls { engine, .. } = &*guard else {
        return;
    };
    let lines = engine.routing().render();
    drop(guard);
    print_routing_table(local_port, &lines);
}

fn print_ls_topology(state: &SharedState, local_port: u16) {
    let guard = state.lock().expect("node state lock poisoned");
    let EngineState::Ls { engine, .. } = &*guard else {
        return;
    };
    let lines = engine.topology().render();
    drop(guard);
    print_topology_lines(local_port, &lines);
}

// ---------------------------------------------------------------------- DV

fn dv_broadcast(transport: &SharedTransport, state: &SharedState, local_port: u16) {
    let mut guard = state.lock().expect("node state lock poisoned");
    let EngineState::Dv(engine) = &mut *guard else {
        return;
    };
    for n in engine.neighbors().ports() {
        let vector = engine.build_vector_for(n);
        let bytes = codec::encode_frame(&Frame::Tab(vector));
        if let Err(err) = transport.send(&bytes, n) {
            warn!("failed to send TAB to {n}: {err}");
            continue;
        }
        log_message_sent(local_port, n);
    }
    engine.mark_broadcast();
}

fn dv_handle_tab(
    transport: &SharedTransport,
    state: &SharedState,
    local_port: u16,
    sender: u16,
    vector: DistanceVector,
) {
    log_message_received(local_port, sender);

    let should_broadcast = {
        let mut guard = state.lock().expect("node state lock poisoned");
        let EngineState::Dv(engine) = &mut *guard else {
            return;
        };
        let already_sent = engine.has_broadcast();
        let changed = engine.receive_tab(sender, vector);
        if changed || !already_sent {
            engine.mark_broadcast();
            true
        } else {
            false
        }
    };

    if should_broadcast {
        print_dv_routing(state, local_port);
        dv_broadcast(transport, state, local_port);
    }
}

fn dv_handle_cos(
    transport: &SharedTransport,
    state: &SharedState,
    local_port: u16,
    sender: u16,
    cost: u32,
) {
    log_cost_updated(sender, cost);
    log_link_received(local_port, sender);

    let changed = {
        let mut guard = state.lock().expect("node state lock poisoned");
        let EngineState::Dv(engine) = &mut *guard else {
            return;
        };
        engine.on_cost_change(sender, cost, false)
    };

    if changed {
        dv_broadcast(transport, state, local_port);
        print_dv_routing(state, local_port);
    }
}

fn dv_local_cost_change(transport: &SharedTransport, state: &SharedState, local_port: u16, new_cost: u32) {
    let highest = {
        let guard = state.lock().expect("node state lock poisoned");
        let EngineState::Dv(engine) = &*guard else {
            return;
        };
        engine.neighbors().highest_port()
    };
    let Some(highest) = highest else { return };

    log_cost_updated(highest, new_cost);
    let cos_bytes = codec::encode_frame(&Frame::Cos { cost: new_cost });
    if let Err(err) = transport.send(&cos_bytes, highest) {
        warn!("failed to send COS to {highest}: {err}");
    }
    log_link_sent(local_port, highest);

    let changed = {
        let mut guard = state.lock().expect("node state lock poisoned");
        let EngineState::Dv(engine) = &mut *guard else {
            return;
        };
        engine.on_cost_change(highest, new_cost, true)
    };

    if changed {
        dv_broadcast(transport, state, local_port);
        print_dv_routing(state, local_port);
    }
}

// ---------------------------------------------------------------------- LS

fn originate_and_cache_own_lsa(state: &SharedState, _local_port: u16) {
    let now = unix_now();
    let mut guard = state.lock().expect("node state lock poisoned");
    let EngineState::Ls { engine, own } = &mut *guard else {
        return;
    };
    let (origin, neighbors, seq) = engine.originate_lsa(now);
    let bytes = codec::encode_frame(&Frame::Lsa {
        origin,
        neighbors,
        seq,
    });
    *own = Some(OwnLsa { origin, seq, bytes });
}

fn ls_flood_own(transport: &SharedTransport, state: &SharedState) {
    let guard = state.lock().expect("node state lock poisoned");
    let EngineState::Ls { engine, own } = &*guard else {
        return;
    };
    let Some(own_lsa) = own else { return };
    let origin = own_lsa.origin;
    let seq = own_lsa.seq;
    let bytes = own_lsa.bytes.clone();
    let neighbor_ports: Vec<u16> = engine.neighbors().ports().collect();
    drop(guard);

    for n in neighbor_ports {
        if let Err(err) = transport.send(&bytes, n) {
            warn!("failed to send LSA to {n}: {err}");
            continue;
        }
        log_lsa_sent(origin, seq, n);
    }
}

fn ls_apply_cost_change(
    transport: &SharedTransport,
    state: &SharedState,
    local_port: u16,
    affected: u16,
    new_cost: u32,
) {
    {
        let mut guard = state.lock().expect("node state lock poisoned");
        let EngineState::Ls { engine, .. } = &mut *guard else {
            return;
        };
        engine.on_cost_change(affected, new_cost);
    }
    originate_and_cache_own_lsa(state, local_port);
    ls_flood_own(transport, state);
    print_ls_topology(state, local_port);
    print_ls_routing(state, local_port);
}

fn ls_handle_cos(transport: &SharedTransport, state: &SharedState, local_port: u16, sender: u16, cost: u32) {
    log_cost_updated(sender, cost);
    log_link_received(local_port, sender);
    ls_apply_cost_change(transport, state, local_port, sender, cost);
}

fn ls_local_cost_change(transport: &SharedTransport, state: &SharedState, local_port: u16, new_cost: u32) {
    let highest = {
        let guard = state.lock().expect("node state lock poisoned");
        let EngineState::Ls { engine, .. } = &*guard else {
            return;
        };
        engine.neighbors().highest_port()
    };
    let Some(highest) = highest else { return };

    log_cost_updated(highest, new_cost);
    let cos_bytes = codec::encode_frame(&Frame::Cos { cost: new_cost });
    if let Err(err) = transport.send(&cos_bytes, highest) {
        warn!("failed to send COS to {highest}: {err}");
    }
    log_link_sent(local_port, highest);

    ls_apply_cost_change(transport, state, local_port, highest, new_cost);
}

#[allow(clippy::too_many_arguments)]
fn ls_handle_lsa(
    transport: &SharedTransport,
    state: &SharedState,
    local_port: u16,
    sender: u16,
    raw_bytes: &[u8],
    origin: u16,
    neighbors: BTreeMap<u16, u32>,
    seq: f64,
    update_interval_secs: u64,
    cost_change: Option<u32>,
) {
    let outcome = {
        let mut guard = state.lock().expect("node state lock poisoned");
        let EngineState::Ls { engine, .. } = &mut *guard else {
            return;
        };
        engine.receive_lsa(origin, neighbors, seq)
    };

    if outcome.duplicate {
        log_lsa_duplicate(origin, seq, sender);
        return;
    }
    log_lsa_received(origin, seq, sender);

    if outcome.topology_changed {
        print_ls_topology(state, local_port);
        if outcome.routes_recomputed {
            print_ls_routing(state, local_port);
        }
    }

    let forward_to: Vec<u16> = {
        let guard = state.lock().expect("node state lock poisoned");
        let EngineState::Ls { engine, .. } = &*guard else {
            return;
        };
        engine.neighbors().ports().filter(|&n| n != sender).collect()
    };
    for n in forward_to {
        if let Err(err) = transport.send(raw_bytes, n) {
            warn!("failed to forward LSA to {n}: {err}");
            continue;
        }
        log_lsa_sent(origin, seq, n);
    }

    if outcome.should_originate_first_lsa {
        originate_and_cache_own_lsa(state, local_port);
        ls_flood_own(transport, state);
        ls_start_timers(
            Arc::clone(transport),
            Arc::clone(state),
            local_port,
            update_interval_secs,
            cost_change,
        );
    }
}

fn ls_start_timers(
    transport: SharedTransport,
    state: SharedState,
    local_port: u16,
    update_interval_secs: u64,
    cost_change: Option<u32>,
) {
    // Periodic re-advertise (§4.2, §4.4): a uniform jitter in [0, 1) is
    // folded into the interval once at start-up to avoid lockstep between
    // nodes launched at the same moment, matching `routenode.py`'s
    // `update_interval = interval + random.uniform(0, 1)`.
    {
        let transport = Arc::clone(&transport);
        let state = Arc::clone(&state);
        thread::spawn(move || {
            let jitter = rand::random::<f64>();
            let interval = update_interval_secs as f64 + jitter;
            loop {
                thread::sleep(Duration::from_secs_f64(interval));
                ls_flood_own(&transport, &state);
            }
        });
    }

    // First Dijkstra run, delayed one routing interval to let the flood
    // quiesce (§4.4).
    {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs_f64(ROUTING_INTERVAL_SECS));
            {
                let mut guard = state.lock().expect("node state lock poisoned");
                if let EngineState::Ls { engine, .. } = &mut *guard {
                    engine.recompute();
                }
            }
            print_ls_routing(&state, local_port);
        });
    }

    if let Some(new_cost) = cost_change {
        thread::spawn(move || {
            thread::sleep(Duration::from_secs_f64(ROUTING_INTERVAL_SECS * 1.2));
            ls_local_cost_change(&transport, &state, local_port, new_cost);
        });
    }
}
