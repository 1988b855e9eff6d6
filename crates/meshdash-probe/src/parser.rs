use meshdash_model::{PathClass, PathTag, RelayTable};
use std::net::{Ipv4Addr, Ipv6Addr};

pub const RELAY_PREFIX: &str = "DERP: ";

/// Classifies one round. The ping output is checked first, the status line
/// only when the ping names no transport. `None` means nothing matched and
/// the previous classification should stay.
pub fn classify(ping: &str, status_line: &str, relays: &RelayTable) -> Option<PathClass> {
    if let Some(addr) = find_direct_via(ping) {
        return Some(PathClass {
            tag: PathTag::Direct,
            detail: Some(addr.to_string()),
        });
    }

    if let Some(code) = find_relay_via(ping) {
        return Some(PathClass {
            tag: PathTag::Relay,
            detail: Some(format!("{RELAY_PREFIX}{}", relays.resolve(code))),
        });
    }

    classify_status_line(status_line)
}

/// `via 192.168.1.20:41641` in ping output.
pub fn find_direct_via(ping: &str) -> Option<&str> {
    ping.match_indices("via ")
        .find_map(|(idx, marker)| socket_addr_prefix(&ping[idx + marker.len()..]))
}

/// Region code out of `via DERP(nyc)` in ping output.
pub fn find_relay_via(ping: &str) -> Option<&str> {
    ping.match_indices("via DERP(").find_map(|(idx, marker)| {
        let rest = &ping[idx + marker.len()..];
        let end = rest.find(|c: char| !(c.is_alphanumeric() || c == '_'))?;
        if end == 0 || !rest[end..].starts_with(')') {
            return None;
        }
        Some(&rest[..end])
    })
}

/// Round-trip time from `in 12ms`. Only whole milliseconds count as a reply.
pub fn parse_latency_ms(ping: &str) -> Option<u32> {
    ping.match_indices("in ").find_map(|(idx, marker)| {
        let preceded_by_word = ping[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric());
        if preceded_by_word {
            return None;
        }

        let rest = &ping[idx + marker.len()..];
        let digits_end = digit_run(rest);
        if digits_end == 0 || !rest[digits_end..].starts_with("ms") {
            return None;
        }
        rest[..digits_end].parse().ok()
    })
}

/// The status line whose first column is `address`.
pub fn find_status_line<'a>(status: &'a str, address: &str) -> Option<&'a str> {
    status
        .lines()
        .find(|line| line.split_whitespace().next() == Some(address))
}

/// Fallback classification from a `status` line.
///
/// A bare `active` with no transport detail is counted as direct; on a LAN
/// that is usually what it means, but a relayed peer can read the same way.
pub fn classify_status_line(line: &str) -> Option<PathClass> {
    let lower = line.to_ascii_lowercase();

    if lower.contains("direct") {
        let detail = lower
            .match_indices("direct")
            .find_map(|(idx, marker)| {
                let rest = &lower[idx + marker.len()..];
                let trimmed = rest.trim_start();
                if trimmed.len() == rest.len() {
                    return None;
                }
                socket_addr_prefix(trimmed)
            })
            .map(str::to_string);
        return Some(PathClass {
            tag: PathTag::Direct,
            detail,
        });
    }

    if lower.contains("relay") || lower.contains("derp") {
        return Some(PathClass {
            tag: PathTag::Relay,
            detail: None,
        });
    }

    if lower.contains("active") {
        return Some(PathClass {
            tag: PathTag::Direct,
            detail: None,
        });
    }

    None
}

/// Leading `a.b.c.d:port` or `[v6]:port` of `text`.
fn socket_addr_prefix(text: &str) -> Option<&str> {
    if let Some(inner) = text.strip_prefix('[') {
        let close = inner.find(']')?;
        if inner[..close].parse::<Ipv6Addr>().is_err() {
            return None;
        }
        let port = port_len(&inner[close + 1..])?;
        return Some(&text[..close + 3 + port]);
    }

    let host_end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    if text[..host_end].parse::<Ipv4Addr>().is_err() {
        return None;
    }
    let port = port_len(&text[host_end..])?;
    Some(&text[..host_end + 1 + port])
}

fn port_len(text: &str) -> Option<usize> {
    let digits = text.strip_prefix(':')?;
    match digit_run(digits) {
        0 => None,
        len => Some(len),
    }
}

fn digit_run(text: &str) -> usize {
    text.find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len())
}
