use crate::client::MeshClient;
use log::{debug, warn};
use meshdash_model::Peer;
use std::collections::HashSet;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub self_address: Option<String>,
    pub peers: Vec<Peer>,
}

impl Discovery {
    pub fn is_self(&self, peer: &Peer) -> bool {
        self.self_address.as_deref() == Some(peer.address.as_str())
    }
}

/// Queries the client for the local address and the online peers. Client
/// failures leave the corresponding part empty.
pub fn discover(client: &dyn MeshClient) -> Discovery {
    let self_address = match client.self_ip() {
        Ok(text) => text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string),
        Err(err) => {
            warn!("could not read own mesh address: {err:#}");
            None
        }
    };

    let peers = match client.status() {
        Ok(text) => parse_status_peers(&text),
        Err(err) => {
            warn!("could not list peers: {err:#}");
            Vec::new()
        }
    };

    debug!(
        "discovered {} online peers (self: {})",
        peers.len(),
        self_address.as_deref().unwrap_or("unknown")
    );

    Discovery {
        self_address,
        peers,
    }
}

/// Online peers from a `status` listing, in listing order.
///
/// A peer line starts with its mesh address followed by the node name, e.g.
/// `100.101.102.103  laptop  user@  linux  active; direct 192.168.1.20:41641`.
pub fn parse_status_peers(text: &str) -> Vec<Peer> {
    let mut seen = HashSet::new();
    let mut peers = Vec::new();

    for line in text.lines() {
        if line.contains("offline") {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let (address, name) = match (tokens.next(), tokens.next()) {
            (Some(address), Some(name)) => (address, name),
            _ => continue,
        };

        if !is_mesh_address(address) || !seen.insert(address.to_string()) {
            continue;
        }

        peers.push(Peer::new(name, address));
    }

    peers
}

/// Whether `token` is an IPv4 address in the mesh range `100.64.0.0/10`.
pub fn is_mesh_address(token: &str) -> bool {
    match token.parse::<Ipv4Addr>() {
        Ok(addr) => {
            let octets = addr.octets();
            octets[0] == 100 && octets[1] & 0xc0 == 64
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_range_bounds() {
        assert!(is_mesh_address("100.64.0.1"));
        assert!(is_mesh_address("100.127.255.254"));
        assert!(!is_mesh_address("100.63.0.1"));
        assert!(!is_mesh_address("100.128.0.1"));
        assert!(!is_mesh_address("10.0.0.1"));
        assert!(!is_mesh_address("fd7a:115c:a1e0::1"));
        assert!(!is_mesh_address("100.64.0"));
    }

    #[test]
    fn offline_and_foreign_lines_are_skipped() {
        let text = "\
100.101.102.103  desktop   me@   linux   -
100.70.1.2       nas       me@   linux   active; direct 192.168.1.30:41641, tx 1 rx 2
100.70.1.9       old-vm    me@   linux   offline
192.168.1.4      printer   me@   linux   -

# Health check:
#     - not connected to home DERP region 1
100.70.1.2       nas-dup   me@   linux   idle";

        let peers = parse_status_peers(text);
        assert_eq!(
            peers,
            vec![
                Peer::new("desktop", "100.101.102.103"),
                Peer::new("nas", "100.70.1.2"),
            ]
        );
    }

    #[test]
    fn empty_listing_yields_no_peers() {
        assert!(parse_status_peers("").is_empty());
        assert!(parse_status_peers("Tailscale is stopped.").is_empty());
    }
}
