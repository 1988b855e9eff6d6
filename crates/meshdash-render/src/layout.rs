use meshdash_model::{Peer, ProbeResult, NO_PATH, ROUNDS};

pub const PATH_WIDTH: usize = 25;

/// One dashboard row, padded or cut to `width - 1` columns so it never wraps.
pub fn format_row(peer: &Peer, result: &ProbeResult, width: usize) -> String {
    let latency = latency_cell(result);
    let path = center_text(&result.path, PATH_WIDTH);

    let line = if result.is_local() {
        format!(
            "{:<15} [{:<12}] - {:<11} {{{:>8}}} [{}]",
            peer.name, peer.address, result.tag, latency, path
        )
    } else {
        format!(
            "{:<15} [{:<12}] - {:<11} {{{:>8}}} [{}] [{:>7}] {}",
            peer.name,
            peer.address,
            result.tag,
            latency,
            path,
            format_percent(result.success_percent()),
            progress_cell(result)
        )
    };

    fit_width(&line, width.saturating_sub(1))
}

/// Average once sampling is done, otherwise the latest round.
pub fn latency_cell(result: &ProbeResult) -> String {
    if result.done {
        return match result.average_latency() {
            Some(avg) => format!("{avg} ms"),
            None => "Timeout".to_string(),
        };
    }

    if result.latencies.is_empty() {
        return NO_PATH.to_string();
    }
    match result.last_latency {
        Some(ms) => format!("{ms} ms"),
        None => "Timeout".to_string(),
    }
}

pub fn progress_cell(result: &ProbeResult) -> String {
    let rounds = if result.done {
        ROUNDS
    } else {
        result.rounds().max(1)
    };
    format!("[{rounds}/{ROUNDS}]")
}

/// Whole percentages print without decimals, anything else with two.
pub fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}%", value as u64)
    } else {
        format!("{value:.2}%")
    }
}

pub fn center_text(text: &str, width: usize) -> String {
    let text = if text.is_empty() { NO_PATH } else { text };
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }
    let pad = width - len;
    let left = pad / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(pad - left))
}

pub fn fit_width(line: &str, width: usize) -> String {
    let mut out: String = line.chars().take(width).collect();
    let len = out.chars().count();
    if len < width {
        out.push_str(&" ".repeat(width - len));
    }
    out
}
