use crate::client::MeshClient;
use crate::discovery::Discovery;
use crate::parser::{classify, find_status_line, parse_latency_ms};
use crate::store::{ResultStore, ResultWriter};
use anyhow::{Context, Result};
use log::{debug, warn};
use meshdash_model::{PathClass, ProbeResult, RelayTable, ROUNDS};
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const THREAD_PREFIX: &str = "probe-";

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub ping_timeout: Duration,
    /// Pause between rounds. Pacing only.
    pub round_delay: Duration,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(1),
            round_delay: Duration::from_millis(600),
        }
    }
}

/// Drives the fixed round campaign for one peer.
pub struct ProbeSampler<C: MeshClient + ?Sized> {
    client: Arc<C>,
    relays: Arc<RelayTable>,
    settings: SamplerSettings,
    writer: ResultWriter,
}

impl<C: MeshClient + ?Sized> ProbeSampler<C> {
    pub fn new(
        client: Arc<C>,
        relays: Arc<RelayTable>,
        settings: SamplerSettings,
        writer: ResultWriter,
    ) -> Self {
        Self {
            client,
            relays,
            settings,
            writer,
        }
    }

    pub fn run(self) {
        let address = self.writer.peer().address.clone();
        debug!("sampling {} ({address})", self.writer.peer().name);

        for round in 0..ROUNDS {
            self.run_round();
            if round + 1 < ROUNDS && !self.settings.round_delay.is_zero() {
                thread::sleep(self.settings.round_delay);
            }
        }

        self.writer.update(ProbeResult::finish);
        debug!("finished sampling {address}");
    }

    /// Runs one round and records it. A panic during the round counts as a lost
    /// round.
    pub fn run_round(&self) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.probe()));
        let (class, latency) = outcome.unwrap_or_else(|_| {
            debug!("round for {} panicked", self.writer.peer().address);
            (None, None)
        });

        self.writer.update(|result| {
            if let Some(class) = class {
                result.apply_path(class);
            }
            result.record_round(latency);
        });
    }

    fn probe(&self) -> (Option<PathClass>, Option<u32>) {
        let address = &self.writer.peer().address;

        let ping = self
            .client
            .ping(address, self.settings.ping_timeout)
            .unwrap_or_else(|err| {
                debug!("ping {address} failed: {err:#}");
                String::new()
            });

        let status = self.client.status().unwrap_or_else(|err| {
            debug!("status for {address} failed: {err:#}");
            String::new()
        });
        let status_line = find_status_line(&status, address).unwrap_or("");

        let class = classify(&ping, status_line, &self.relays);
        let latency = parse_latency_ms(&ping);
        if latency.is_none() {
            debug!("no reply from {address}: {}", ping.trim());
        }
        (class, latency)
    }
}

/// A running sampling campaign: the shared store plus the detached workers.
pub struct Campaign {
    store: ResultStore,
    workers: Vec<JoinHandle<()>>,
}

impl Campaign {
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker. Only meaningful once the store reports done;
    /// an interrupted run just drops the campaign instead.
    pub fn join(self) -> ResultStore {
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("sampler thread panicked");
            }
        }
        self.store
    }
}

/// Registers a record per discovered peer and starts one worker thread for
/// every peer except the local machine, whose record is complete up front.
pub fn launch<C>(
    discovery: &Discovery,
    client: Arc<C>,
    relays: Arc<RelayTable>,
    settings: SamplerSettings,
) -> Result<Campaign>
where
    C: MeshClient + ?Sized + 'static,
{
    quiet_sampler_panics();

    let mut store = ResultStore::new();
    let mut samplers = Vec::new();

    for peer in &discovery.peers {
        if discovery.is_self(peer) {
            store.register(peer.clone(), ProbeResult::local());
            continue;
        }
        let writer = store.register(peer.clone(), ProbeResult::new());
        samplers.push(ProbeSampler::new(
            Arc::clone(&client),
            Arc::clone(&relays),
            settings.clone(),
            writer,
        ));
    }

    let mut workers = Vec::with_capacity(samplers.len());
    for sampler in samplers {
        let address = sampler.writer.peer().address.clone();
        let handle = thread::Builder::new()
            .name(format!("{THREAD_PREFIX}{address}"))
            .spawn(move || sampler.run())
            .with_context(|| format!("failed to start sampler for {address}"))?;
        workers.push(handle);
    }

    Ok(Campaign { store, workers })
}

/// Sends panic reports from sampler threads to the debug log instead of
/// stderr, where they would land on top of the table. Other threads keep the
/// previous hook.
pub fn quiet_sampler_panics() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let sampler = thread::current()
                .name()
                .is_some_and(|name| name.starts_with(THREAD_PREFIX));
            if sampler {
                debug!("sampler panic: {info}");
            } else {
                previous(info);
            }
        }));
    });
}
