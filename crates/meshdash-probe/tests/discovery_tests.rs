use anyhow::anyhow;
use meshdash_model::Peer;
use meshdash_probe::{discover, MeshClient};
use std::time::Duration;

struct StaticClient {
    self_ip: Option<&'static str>,
    status: Option<&'static str>,
}

impl MeshClient for StaticClient {
    fn self_ip(&self) -> anyhow::Result<String> {
        self.self_ip
            .map(str::to_string)
            .ok_or_else(|| anyhow!("ip failed"))
    }

    fn status(&self) -> anyhow::Result<String> {
        self.status
            .map(str::to_string)
            .ok_or_else(|| anyhow!("status failed"))
    }

    fn ping(&self, _address: &str, _timeout: Duration) -> anyhow::Result<String> {
        Err(anyhow!("not used"))
    }
}

#[test]
fn discovery_marks_self_and_keeps_order() {
    let client = StaticClient {
        self_ip: Some("100.64.0.1\n"),
        status: Some(
            "100.64.0.1   desktop  me@  linux  -\n\
             100.90.0.7   phone    me@  iOS    offline\n\
             100.70.1.2   nas      me@  linux  idle, tx 10 rx 20",
        ),
    };

    let discovery = discover(&client);
    assert_eq!(discovery.self_address.as_deref(), Some("100.64.0.1"));
    assert_eq!(
        discovery.peers,
        vec![Peer::new("desktop", "100.64.0.1"), Peer::new("nas", "100.70.1.2")]
    );
    assert!(discovery.is_self(&discovery.peers[0]));
    assert!(!discovery.is_self(&discovery.peers[1]));
}

#[test]
fn client_failure_yields_empty_discovery() {
    let client = StaticClient {
        self_ip: None,
        status: None,
    };

    let discovery = discover(&client);
    assert!(discovery.self_address.is_none());
    assert!(discovery.peers.is_empty());
}
