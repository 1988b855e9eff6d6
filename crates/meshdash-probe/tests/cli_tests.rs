#![cfg(unix)]

use meshdash_model::{PathTag, Peer, ProbeResult, RelayTable};
use meshdash_probe::{MeshClient, ProbeSampler, ResultStore, SamplerSettings, TailscaleCli};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const PONG: &str = "pong from nas (100.70.1.2) via 192.168.1.30:41641 in 3ms";

/// Writes an executable stand-in for the client; each subcommand runs the
/// given shell snippet.
fn fake_client(name: &str, status: &str, ping: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meshdash-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("tailscale");
    let script = format!(
        "#!/bin/sh\ncase \"$1\" in\n  ip) echo 100.64.0.1 ;;\n  status) {status} ;;\n  ping) {ping} ;;\nesac\n"
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    // A concurrent fork in another test can briefly keep the file busy.
    for _ in 0..50 {
        match Command::new(&path).arg("ip").output() {
            Err(err) if err.raw_os_error() == Some(26) => thread::sleep(Duration::from_millis(20)),
            _ => break,
        }
    }
    path
}

#[test]
fn stalled_status_is_cut_off() {
    let binary = fake_client("stalled-status", "sleep 30", &format!("echo '{PONG}'"));
    let cli = TailscaleCli::new(binary).with_command_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let err = cli.status().unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(err.to_string().contains("timed out"));
}

#[test]
fn stalled_ping_is_cut_off_after_grace() {
    let binary = fake_client("stalled-ping", "echo", "sleep 30");
    let cli = TailscaleCli::new(binary);

    let started = Instant::now();
    assert!(cli.ping("100.70.1.2", Duration::from_millis(200)).is_err());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn ping_output_is_captured() {
    let binary = fake_client("ping-ok", "echo", &format!("echo '{PONG}'; exit 1"));
    let cli = TailscaleCli::new(binary);
    assert_eq!(cli.ping("100.70.1.2", Duration::from_secs(1)).unwrap(), PONG);
    assert_eq!(cli.self_ip().unwrap(), "100.64.0.1");
}

#[test]
fn round_finishes_when_status_hangs() {
    let binary = fake_client("round-hang", "sleep 30", &format!("echo '{PONG}'"));
    let cli = TailscaleCli::new(binary).with_command_timeout(Duration::from_millis(300));

    let mut store = ResultStore::new();
    let writer = store.register(Peer::new("nas", "100.70.1.2"), ProbeResult::new());
    let settings = SamplerSettings {
        ping_timeout: Duration::from_secs(1),
        round_delay: Duration::ZERO,
    };
    let sampler = ProbeSampler::new(Arc::new(cli), Arc::new(RelayTable::new()), settings, writer);

    let started = Instant::now();
    sampler.run_round();
    assert!(started.elapsed() < Duration::from_secs(2));

    let nas = store.get("100.70.1.2").unwrap();
    assert_eq!(nas.latencies, vec![Some(3)]);
    assert_eq!(nas.tag, PathTag::Direct);
}

#[test]
fn round_fails_when_ping_hangs() {
    let binary = fake_client("round-ping-hang", "echo", "sleep 30");
    let cli = TailscaleCli::new(binary);

    let mut store = ResultStore::new();
    let writer = store.register(Peer::new("nas", "100.70.1.2"), ProbeResult::new());
    let settings = SamplerSettings {
        ping_timeout: Duration::from_millis(200),
        round_delay: Duration::ZERO,
    };
    let sampler = ProbeSampler::new(Arc::new(cli), Arc::new(RelayTable::new()), settings, writer);

    let started = Instant::now();
    sampler.run_round();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(store.get("100.70.1.2").unwrap().latencies, vec![None]);
}
