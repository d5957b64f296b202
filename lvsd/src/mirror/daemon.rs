use lvs_model::protocol::{
    MCAST_INTERFACE, ROLE_BACKUP, ROLE_MASTER, SET_TIMEOUTS, START_DAEMON, STOP_DAEMON, SYNC_ID,
    ZERO,
};
use lvs_model::ServiceKey;
use crate::backend::Backend;
use crate::config::{SyncConfig, TimeoutConfig};
use crate::error::{MirrorError, MirrorResult};
use super::Mirror;

/// Result of driving both sync daemon roles. Each role is attempted even
/// when the other fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonOutcome {
    pub master: MirrorResult<()>,
    pub backup: MirrorResult<()>,
}

impl DaemonOutcome {
    fn skipped() -> Self {
        Self { master: Ok(()), backup: Ok(()) }
    }

    pub fn is_ok(&self) -> bool {
        self.master.is_ok() && self.backup.is_ok()
    }
}

impl<B: Backend> Mirror<B> {
    /// Fails with [`MirrorError::ToolMissing`] when the control program
    /// cannot be located
    pub fn check_tool(&self) -> MirrorResult<()> {
        let argv = vec!["which".to_string(), self.settings.binary.clone()];
        match self.backend.run(&argv) {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::debug!("{}", e);
                Err(MirrorError::ToolMissing(self.settings.binary.clone()))
            }
        }
    }

    /// Sets the kernel connection timeouts. All three at 0 means nothing
    /// is configured and no command is run.
    pub fn set_timeouts(&mut self, timeouts: TimeoutConfig) -> MirrorResult<()> {
        if timeouts.is_unset() {
            self.settings.timeouts = timeouts;
            return Ok(());
        }

        let args = [timeouts.tcp, timeouts.tcp_fin, timeouts.udp]
            .iter()
            .map(u32::to_string)
            .collect();
        self.execute(self.command(SET_TIMEOUTS, args))?;

        tracing::info!(
            "Set connection timeouts tcp={} tcpfin={} udp={}",
            timeouts.tcp,
            timeouts.tcp_fin,
            timeouts.udp
        );
        self.settings.timeouts = timeouts;
        Ok(())
    }

    /// Starts the master and backup connection sync daemons. Does nothing
    /// unless a multicast interface is configured.
    pub fn start_daemon(&self) -> DaemonOutcome {
        let Some(sync) = self.sync_config() else {
            return DaemonOutcome::skipped();
        };

        let start = |role: &str| {
            let mut args = vec![role.to_string(), MCAST_INTERFACE.to_string(), sync.interface.clone()];
            if sync.sync_id > 0 {
                args.push(SYNC_ID.to_string());
                args.push(sync.sync_id.to_string());
            }
            self.execute(self.command(START_DAEMON, args))
        };

        let outcome = DaemonOutcome {
            master: start(ROLE_MASTER),
            backup: start(ROLE_BACKUP),
        };
        if outcome.is_ok() {
            tracing::info!("Started sync daemons on {}", sync.interface);
        }
        outcome
    }

    /// Stops both sync daemons. Does nothing unless a multicast interface
    /// is configured.
    pub fn stop_daemon(&self) -> DaemonOutcome {
        if self.sync_config().is_none() {
            return DaemonOutcome::skipped();
        }

        let stop = |role: &str| self.execute(self.command(STOP_DAEMON, vec![role.to_string()]));
        let outcome = DaemonOutcome {
            master: stop(ROLE_MASTER),
            backup: stop(ROLE_BACKUP),
        };
        if outcome.is_ok() {
            tracing::info!("Stopped sync daemons");
        }
        outcome
    }

    /// Resets the packet and byte counters of every service
    pub fn zero(&self) -> MirrorResult<()> {
        self.execute(self.command(ZERO, Vec::new()))
    }

    pub fn zero_service(&self, key: &ServiceKey) -> MirrorResult<()> {
        self.get_service(key)?;
        self.execute(self.command(ZERO, key.to_args()))
    }

    fn sync_config(&self) -> Option<&SyncConfig> {
        self.settings
            .sync
            .as_ref()
            .filter(|sync| !sync.interface.is_empty())
    }
}
