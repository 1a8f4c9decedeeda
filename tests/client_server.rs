//! End-to-end scenarios against the real reference server over loopback UDP.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use driftsync::{Client, Server, Settings};

fn start_server() -> (std::net::SocketAddr, Arc<AtomicBool>, std::thread::JoinHandle<()>) {
    let server = Server::bind("127.0.0.1:0").expect("bind server");
    let addr = server.local_addr().unwrap();
    let stop = server.stop_handle();
    let handle = std::thread::spawn(move || server.run());
    (addr, stop, handle)
}

fn stop_server(stop: Arc<AtomicBool>, handle: std::thread::JoinHandle<()>) {
    stop.store(true, Ordering::SeqCst);
    handle.join().unwrap();
}

/// A reference server that shifts (or scales) the timestamp it echoes,
/// used to exercise offset/rate convergence deterministically.
struct SkewedServer {
    socket: UdpSocket,
    stop: Arc<AtomicBool>,
}

impl SkewedServer {
    fn bind() -> (Self, std::net::SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let addr = socket.local_addr().unwrap();
        (
            SkewedServer {
                socket,
                stop: Arc::new(AtomicBool::new(false)),
            },
            addr,
        )
    }

    fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn run(self, remote_of: impl Fn(i64) -> i64 + Send + 'static) {
        let mut buf = [0u8; driftsync::wire::SIZE];
        while !self.stop.load(Ordering::Relaxed) {
            let (n, peer) = match self.socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let Ok(req) = driftsync::wire::Packet::from_bytes(&buf[..n]) else {
                continue;
            };
            let reply = req.into_reply(remote_of(req.local));
            let _ = self.socket.send_to(&reply.to_bytes(), peer);
        }
    }
}

#[test]
fn steady_offset_converges() {
    let (server, addr) = SkewedServer::bind();
    let stop = server.stop_handle();
    let handle = std::thread::spawn(move || server.run(|local| local + 1_000_000));

    let settings = Settings {
        capacity: 10,
        interval: Duration::from_millis(10),
        scale: 1e-3,
        measure_accuracy: true,
    };
    let client = Client::connect(addr, settings).expect("connect");
    std::thread::sleep(Duration::from_millis(400));

    assert!((client.offset() - 1000.0).abs() <= 10.0, "offset={}", client.offset());
    assert!((client.clock_rate() - 1.0).abs() < 1e-6);
    assert_eq!(client.statistics().rejected, 0);

    stop.store(true, Ordering::SeqCst);
    let _ = handle.join();
}

#[test]
fn constant_skew_rate_is_detected() {
    let (server, addr) = SkewedServer::bind();
    let stop = server.stop_handle();
    let handle = std::thread::spawn(move || server.run(|local| local * 2));

    let settings = Settings {
        capacity: 10,
        interval: Duration::from_millis(10),
        scale: 1.0,
        measure_accuracy: false,
    };
    let client = Client::connect(addr, settings).expect("connect");
    std::thread::sleep(Duration::from_millis(300));

    assert!((client.clock_rate() - 2.0).abs() < 1e-3, "rate={}", client.clock_rate());

    stop.store(true, Ordering::SeqCst);
    let _ = handle.join();
}

#[test]
fn accuracy_wait_times_out_without_measurement() {
    let (addr, stop, handle) = start_server();

    let settings = Settings {
        measure_accuracy: false,
        ..Settings::default()
    };
    let client = Client::connect(addr, settings).expect("connect");

    let started = std::time::Instant::now();
    let summary = client.accuracy(true, false, Some(Duration::from_millis(50)));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(summary, driftsync::AccuracySummary::default());

    stop_server(stop, handle);
}

#[test]
fn global_time_is_zero_before_any_sample() {
    let settings = Settings::default();
    // A bound socket that never replies: requests vanish, no sample is ever admitted.
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = silent.local_addr().unwrap();
    let client = Client::connect(addr, settings).expect("connect");
    assert_eq!(client.global_time(), 0.0);
    drop(silent);
}

#[test]
fn playback_rate_dead_band_and_saturation() {
    let (addr, stop, handle) = start_server();
    let client = Client::connect(addr, Settings::default()).expect("connect");
    std::thread::sleep(Duration::from_millis(200));

    let now = client.global_time();
    assert_eq!(client.suggest_playback_rate(0.0, now), 1.0);
    assert_eq!(client.suggest_playback_rate(0.0, now - 10_000_000.0), 2.0);
    assert_eq!(client.suggest_playback_rate(0.0, now + 10_000_000.0), 0.5);

    stop_server(stop, handle);
}

/// A reference server that replies immediately to every request except one,
/// which it holds for `delay` before replying — an artificially large RTT
/// injected into an otherwise tight, low-latency stream.
struct GlitchingServer {
    socket: UdpSocket,
    stop: Arc<AtomicBool>,
}

impl GlitchingServer {
    fn bind() -> (Self, std::net::SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let addr = socket.local_addr().unwrap();
        (
            GlitchingServer {
                socket,
                stop: Arc::new(AtomicBool::new(false)),
            },
            addr,
        )
    }

    fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Delays the reply to the `glitch_at`-th request (0-indexed) by `delay`;
    /// every other request is echoed back immediately.
    fn run(self, glitch_at: usize, delay: Duration) {
        let mut buf = [0u8; driftsync::wire::SIZE];
        let mut seen = 0usize;
        while !self.stop.load(Ordering::Relaxed) {
            let (n, peer) = match self.socket.recv_from(&mut buf) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let Ok(req) = driftsync::wire::Packet::from_bytes(&buf[..n]) else {
                continue;
            };
            if seen == glitch_at {
                std::thread::sleep(delay);
            }
            seen += 1;
            let reply = req.into_reply(req.local);
            let _ = self.socket.send_to(&reply.to_bytes(), peer);
        }
    }
}

#[test]
fn rtt_outlier_is_rejected() {
    let (server, addr) = GlitchingServer::bind();
    let stop = server.stop_handle();
    // Glitch the 5th request with a 100ms hold against an otherwise
    // sub-millisecond loopback round trip.
    let handle = std::thread::spawn(move || server.run(5, Duration::from_millis(100)));

    let settings = Settings {
        capacity: 10,
        interval: Duration::from_millis(20),
        scale: 1.0,
        measure_accuracy: false,
    };
    let client = Client::connect(addr, settings).expect("connect");
    std::thread::sleep(Duration::from_millis(500));

    assert_eq!(client.statistics().rejected, 1, "stats={:?}", client.statistics());

    stop.store(true, Ordering::SeqCst);
    let _ = handle.join();
}

#[test]
fn capacity_one_keeps_default_clock_rate() {
    let (addr, stop, handle) = start_server();

    let settings = Settings {
        capacity: 1,
        interval: Duration::from_millis(10),
        scale: 1.0,
        measure_accuracy: false,
    };
    let client = Client::connect(addr, settings).expect("connect");
    std::thread::sleep(Duration::from_millis(200));

    // With only the newest sample ever retained, clock_rate can never see
    // two samples at once and stays at its initial value.
    assert_eq!(client.clock_rate(), 1.0);
    assert!(client.statistics().received > 0);

    stop_server(stop, handle);
}
