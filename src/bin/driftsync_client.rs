//! Demo client binary: connects to a reference server and reports the
//! estimated global time, offset, clock rate, and accuracy.

use std::time::Duration;

use driftsync::wire::DEFAULT_PORT;
use driftsync::{Client, Settings};

fn main() {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| {
        eprintln!("usage: driftsync-client HOST [--port N] [--stream] [--interval MS]");
        std::process::exit(2);
    });
    let mut port = DEFAULT_PORT;
    let mut stream = false;
    let mut interval_ms = 100u64;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => port = args.next().and_then(|v| v.parse().ok()).expect("--port requires a number"),
            "--stream" => stream = true,
            "--interval" => {
                interval_ms = args
                    .next()
                    .and_then(|v| v.parse().ok())
                    .expect("--interval requires a number of milliseconds")
            }
            other => {
                eprintln!("unrecognized argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let settings = Settings {
        interval: Duration::from_millis(10),
        scale: 1e-3, // report in milliseconds
        ..Settings::default()
    };
    let client = Client::connect((host.as_str(), port), settings).expect("failed to start client");

    if stream {
        loop {
            println!("global_time={}", client.global_time());
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    loop {
        std::thread::sleep(Duration::from_millis(interval_ms));
        let accuracy = client.accuracy(true, false, Some(Duration::from_secs(15)));
        println!(
            "global_time={} offset={} clock_rate={:.6} median_rtt={} {} {}",
            client.global_time(),
            client.offset(),
            client.clock_rate(),
            client.median_round_trip_time(),
            client.statistics().format_display(),
            accuracy.format_display(),
        );
    }
}
