pub mod bulk;
pub mod daemon;
pub mod fingerprint;
pub mod services;

use chrono::{DateTime, Utc};
use lvs_model::protocol::{NUMERIC, SAVE};
use lvs_model::{decode_dump, DumpDecode, Server, ServerKey, Service, ServiceKey};
use crate::backend::Backend;
use crate::config::{Config, SyncConfig, TimeoutConfig};
use crate::error::{MirrorError, MirrorResult};

pub use bulk::SaveReport;
pub use daemon::DaemonOutcome;

/// What the mirror needs to know about the control program and the
/// kernel-wide settings it pushes.
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub binary: String,
    pub timeouts: TimeoutConfig,
    pub sync: Option<SyncConfig>,
    pub verify_deletes: bool,
}

impl MirrorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.ipvsadm.path.clone(),
            timeouts: config.timeouts,
            sync: config.sync.clone(),
            verify_deletes: config.ipvsadm.verify_deletes,
        }
    }
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// In-memory copy of the kernel's virtual service table.
///
/// Every mutation runs the matching control program command first and
/// touches the stored services only once that command succeeded, so a
/// failed call leaves the mirror as it was. The mirror is not shared:
/// one owner (see [`crate::handle::MirrorHandle`]) serializes all access.
pub struct Mirror<B> {
    backend: B,
    settings: MirrorSettings,
    services: Vec<Service>,
    last_sync: Option<DateTime<Utc>>,
}

impl<B: Backend> Mirror<B> {
    pub fn new(backend: B, settings: MirrorSettings) -> Self {
        Self {
            backend,
            settings,
            services: Vec::new(),
            last_sync: None,
        }
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    /// Services in the order they were added or loaded
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn find_service(&self, key: &ServiceKey) -> Option<&Service> {
        self.services.iter().find(|service| service.matches(key))
    }

    pub fn get_service(&self, key: &ServiceKey) -> MirrorResult<&Service> {
        self.find_service(key)
            .ok_or_else(|| MirrorError::NotFound(key.to_string()))
    }

    pub fn list_servers(&self, key: &ServiceKey) -> MirrorResult<&[Server]> {
        Ok(&self.get_service(key)?.servers)
    }

    pub fn get_server(&self, key: &ServiceKey, server: &ServerKey) -> MirrorResult<&Server> {
        self.get_service(key)?
            .find_server(server)
            .ok_or_else(|| server_not_found(key, server))
    }

    /// When the mirror was last rebuilt from, or pushed wholesale to, the
    /// live table
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn fingerprint(&self) -> String {
        fingerprint::compute_fingerprint(&self.services)
    }

    fn position(&self, key: &ServiceKey) -> MirrorResult<usize> {
        self.services
            .iter()
            .position(|service| service.matches(key))
            .ok_or_else(|| MirrorError::NotFound(key.to_string()))
    }

    /// Full command line: program, verb, then `args`
    fn command(&self, verb: &str, args: Vec<String>) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.push(self.settings.binary.clone());
        argv.push(verb.to_string());
        argv.extend(args);
        argv
    }

    fn execute(&self, argv: Vec<String>) -> MirrorResult<()> {
        self.backend.run(&argv).map(|_| ()).map_err(|e| {
            tracing::warn!("{}", e);
            MirrorError::from(e)
        })
    }

    /// Reads and decodes the live table
    fn dump(&self) -> MirrorResult<DumpDecode> {
        let output = self
            .backend
            .run(&self.command(SAVE, vec![NUMERIC.to_string()]))?;
        Ok(decode_dump(&String::from_utf8_lossy(&output)))
    }

    /// Confirms a delete by re-reading the table, when configured to
    fn verify_gone(&self, what: String, still_there: impl Fn(&[Service]) -> bool) -> MirrorResult<()> {
        if !self.settings.verify_deletes {
            return Ok(());
        }
        let live = self.dump().map_err(|e| {
            tracing::warn!(
                "Delete of {} went through but could not be confirmed; mirror may be ahead of the live table",
                what
            );
            e
        })?;
        if still_there(&live.services) {
            tracing::error!("{} is still in the live table after delete", what);
            return Err(MirrorError::DeleteFailed(what));
        }
        Ok(())
    }
}

fn server_not_found(key: &ServiceKey, server: &ServerKey) -> MirrorError {
    MirrorError::NotFound(format!("server {} in {}", server, key))
}

#[cfg(test)]
pub(crate) mod testing {
    use lvs_model::{Scheduler, Server, Service, ServiceType};
    use crate::backend::fake::FakeBackend;
    use super::{Mirror, MirrorSettings};

    pub fn mirror() -> (Mirror<FakeBackend>, FakeBackend) {
        mirror_with(MirrorSettings::default())
    }

    pub fn mirror_with(settings: MirrorSettings) -> (Mirror<FakeBackend>, FakeBackend) {
        let backend = FakeBackend::new();
        (Mirror::new(backend.clone(), settings), backend)
    }

    /// tcp 10.0.0.1:80, wrr, one real server
    pub fn web_service() -> Service {
        let mut service = Service::new(ServiceType::Tcp, "10.0.0.1", 80);
        service.scheduler = Scheduler::WeightedRoundRobin;
        service.servers.push(Server::new("10.0.0.2", 8080));
        service
    }
}
