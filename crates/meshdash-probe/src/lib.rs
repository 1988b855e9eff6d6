//! Peer discovery, path classification and the per-peer sampling engine.

pub mod client;
pub mod discovery;
pub mod parser;
pub mod relay;
pub mod sampler;
pub mod store;

pub use client::{MeshClient, TailscaleCli, DEFAULT_COMMAND_TIMEOUT, PING_GRACE};
pub use discovery::{discover, is_mesh_address, parse_status_peers, Discovery};
pub use parser::{
    classify, classify_status_line, find_direct_via, find_relay_via, find_status_line,
    parse_latency_ms,
};
pub use relay::{fetch_relay_table, load_relay_table, parse_derp_map, DEFAULT_DERP_MAP_URL};
pub use sampler::{launch, quiet_sampler_panics, Campaign, ProbeSampler, SamplerSettings};
pub use store::{ResultStore, ResultView, ResultWriter, StoreEntry};
