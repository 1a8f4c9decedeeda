//! The synchronization client: owns a datagram socket and two background
//! threads (probe emitter, reply ingestor) feeding a locked history that
//! query calls read from.

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use socket2::{Domain, Socket, Type};
use tracing::{debug, trace, warn};

use crate::error::CreateError;
use crate::estimator::{self, Sample};
use crate::platform::local_time_us;
use crate::ring::Ring;
use crate::settings::Settings;
use crate::stats::{AccuracySummary, Statistics};
use crate::wire::{self, Packet};

/// Rejection threshold for the round-trip outlier filter, in microseconds.
const RTT_REJECT_THRESHOLD_US: i64 = 10_000;

/// Whether `rtt` is close enough to `median_rtt` to admit. Exactly at the
/// threshold is accepted; only a strictly larger deviation is rejected.
fn rtt_accepted(rtt: i64, median_rtt: i64) -> bool {
    (rtt - median_rtt).abs() <= RTT_REJECT_THRESHOLD_US
}

/// Everything the emitter and ingestor threads mutate, guarded by one lock.
struct State {
    round_trips: Ring<i64>,
    samples: Ring<Sample>,
    offsets: Ring<i64>,
    accuracy: Ring<i64>,
    average_offset: i64,
    clock_rate: f64,
    statistics: Statistics,
}

impl State {
    fn new(capacity: usize) -> Self {
        State {
            round_trips: Ring::new(capacity),
            samples: Ring::new(capacity),
            offsets: Ring::new(capacity),
            accuracy: Ring::new(capacity),
            average_offset: 0,
            clock_rate: 1.0,
            statistics: Statistics::default(),
        }
    }

    fn global_time(&self, now: i64) -> i64 {
        estimator::global_time(&self.samples, self.average_offset, self.clock_rate, now)
    }
}

/// A running synchronization client.
///
/// Dropping a `Client` (or calling [`Client::shutdown`] explicitly) signals
/// both background threads to stop and joins them, so no thread or socket
/// outlives the handle.
pub struct Client {
    state: Arc<Mutex<State>>,
    accuracy_cond: Arc<Condvar>,
    stop: Arc<AtomicBool>,
    settings: Settings,
    emitter: Option<JoinHandle<()>>,
    ingestor: Option<JoinHandle<()>>,
}

impl Client {
    /// Resolves `server`, binds a local UDP socket, and starts the probe
    /// emitter and reply ingestor threads.
    pub fn connect<A: ToSocketAddrs>(server: A, settings: Settings) -> Result<Self, CreateError> {
        let settings = settings.clamp();
        let server_addr = server
            .to_socket_addrs()
            .map_err(CreateError::Resolve)?
            .next()
            .ok_or(CreateError::NoAddress)?;

        let domain = if server_addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::DGRAM, None).map_err(CreateError::Socket)?;
        socket
            .set_reuse_address(true)
            .map_err(CreateError::Configure)?;
        let bind_addr: std::net::SocketAddr = if server_addr.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        socket.bind(&bind_addr.into()).map_err(CreateError::Bind)?;
        // A short read timeout lets the ingestor thread notice the stop flag
        // without racing a socket close against an in-flight recv.
        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .map_err(CreateError::Configure)?;
        let socket: UdpSocket = socket.into();

        let state = Arc::new(Mutex::new(State::new(settings.capacity)));
        let accuracy_cond = Arc::new(Condvar::new());
        let stop = Arc::new(AtomicBool::new(false));

        let emit_socket = socket.try_clone().map_err(CreateError::Socket)?;
        let emitter = std::thread::spawn({
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            move || emit_loop(emit_socket, server_addr, state, stop, settings.interval)
        });

        let ingestor = std::thread::spawn({
            let state = Arc::clone(&state);
            let accuracy_cond = Arc::clone(&accuracy_cond);
            let stop = Arc::clone(&stop);
            move || ingest_loop(socket, state, accuracy_cond, stop, settings)
        });

        Ok(Client {
            state,
            accuracy_cond,
            stop,
            settings,
            emitter: Some(emitter),
            ingestor: Some(ingestor),
        })
    }

    /// Signals both background threads to stop and waits for them to exit.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.emitter.take() {
            let _ = h.join();
        }
        if let Some(h) = self.ingestor.take() {
            let _ = h.join();
        }
    }

    pub fn local_time(&self) -> f64 {
        local_time_us() as f64 * self.settings.scale
    }

    pub fn global_time(&self) -> f64 {
        let state = self.state.lock();
        state.global_time(local_time_us()) as f64 * self.settings.scale
    }

    pub fn offset(&self) -> f64 {
        let state = self.state.lock();
        state.average_offset as f64 * self.settings.scale
    }

    pub fn clock_rate(&self) -> f64 {
        self.state.lock().clock_rate
    }

    pub fn median_round_trip_time(&self) -> f64 {
        let state = self.state.lock();
        let median = state.round_trips.median().unwrap_or(0);
        median as f64 * self.settings.scale
    }

    pub fn statistics(&self) -> Statistics {
        self.state.lock().statistics
    }

    /// Rate at which `playback_position` should advance to converge on
    /// `global_start`-relative global time. Both inputs are in the caller's
    /// scaled unit; they are converted back to raw microseconds before the
    /// comparison, same as the unscaled `global_time()` read internally.
    pub fn suggest_playback_rate(&self, global_start: f64, playback_position: f64) -> f64 {
        let scale = self.settings.scale;
        let raw_global_now = {
            let state = self.state.lock();
            state.global_time(local_time_us())
        };
        estimator::suggest_playback_rate(
            global_start / scale,
            playback_position / scale,
            raw_global_now as f64,
        )
    }

    /// Reads the current accuracy summary.
    ///
    /// - `wait = false`: reports whatever probes are currently held.
    /// - `wait = true, timeout = None`: blocks until the next probe arrives.
    /// - `wait = true, timeout = Some(d)`: blocks up to `d`; on expiry
    ///   returns a zeroed summary (not an error).
    /// - `reset = true`: clears the accuracy ring before waiting.
    pub fn accuracy(&self, wait: bool, reset: bool, timeout: Option<Duration>) -> AccuracySummary {
        let mut state = self.state.lock();
        if reset {
            state.accuracy.clear();
        }
        if wait && state.accuracy.is_empty() {
            match timeout {
                None => {
                    self.accuracy_cond.wait(&mut state);
                }
                Some(d) => {
                    let deadline = Instant::now() + d;
                    while state.accuracy.is_empty() {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            return AccuracySummary::default();
                        }
                        let timed_out = self
                            .accuracy_cond
                            .wait_for(&mut state, remaining)
                            .timed_out();
                        if timed_out {
                            break;
                        }
                    }
                }
            }
        }
        if state.accuracy.is_empty() {
            return AccuracySummary::default();
        }
        let min = state.accuracy.iter().min().unwrap();
        let max = state.accuracy.iter().max().unwrap();
        let avg = state.accuracy.iter().sum::<i64>() as f64 / state.accuracy.len() as f64;
        let scale = self.settings.scale;
        AccuracySummary {
            min: min as f64 * scale,
            avg: avg * scale,
            max: max as f64 * scale,
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn emit_loop(
    socket: UdpSocket,
    server_addr: std::net::SocketAddr,
    state: Arc<Mutex<State>>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) {
    while !stop.load(Ordering::Relaxed) {
        let packet = Packet::request(local_time_us());
        match socket.send_to(&packet.to_bytes(), server_addr) {
            Ok(_) => {
                state.lock().statistics.sent += 1;
            }
            Err(e) => {
                warn!("probe send failed: {e}");
            }
        }
        std::thread::sleep(interval);
    }
}

fn ingest_loop(
    socket: UdpSocket,
    state: Arc<Mutex<State>>,
    accuracy_cond: Arc<Condvar>,
    stop: Arc<AtomicBool>,
    settings: Settings,
) {
    let mut buf = [0u8; wire::SIZE];
    while !stop.load(Ordering::Relaxed) {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                warn!("reply receive failed: {e}");
                continue;
            }
        };
        let now = local_time_us();

        let reply = match Packet::from_bytes(&buf[..n]) {
            Ok(p) => p,
            Err(e) => {
                trace!("dropping malformed datagram: {e}");
                continue;
            }
        };
        if !reply.is_reply() {
            trace!("dropping non-reply datagram");
            continue;
        }

        // Snapshotted unconditionally (whenever accuracy measurement is
        // enabled) before the lock, same as the reference's receive_loop —
        // whether a probe actually gets computed from it is decided after
        // the sample update, once the post-push sample count is known.
        let (measure_before_local, measure_before_global) = if settings.measure_accuracy {
            let state = state.lock();
            (Some(now), Some(state.global_time(now)))
        } else {
            (None, None)
        };

        let mut state = state.lock();
        state.statistics.received += 1;

        let rtt = now - reply.local;
        state.round_trips.push(rtt);
        let median_rtt = state.round_trips.median().unwrap_or(rtt);
        if !rtt_accepted(rtt, median_rtt) {
            state.statistics.rejected += 1;
            continue;
        }

        let sample = Sample::from_reply(&reply);
        state.samples.push(sample);
        if let Some(rate) = estimator::clock_rate(&state.samples) {
            state.clock_rate = rate;
        }

        let offset = reply.remote - reply.local;
        state.offsets.push(offset);
        state.average_offset = state.offsets.mean();
        debug!(offset, rate = state.clock_rate, "accepted sample");

        if let (Some(l0), Some(g0)) = (measure_before_local, measure_before_global) {
            if state.samples.len() >= 2 {
                let now2 = local_time_us();
                let g1 = state.global_time(now2);
                let probe = ((g0 - g1) - (l0 - now2)).abs();
                state.accuracy.push(probe);
                drop(state);
                accuracy_cond.notify_all();
                continue;
            }
        }
    }
}
