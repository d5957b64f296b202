use std::collections::HashSet;
use chrono::Utc;
use lvs_model::protocol::RESTORE;
use lvs_model::{encode_dump, DecodeError, Service};
use crate::backend::Backend;
use crate::error::{MirrorError, MirrorResult};
use super::Mirror;

/// Outcome of rebuilding the mirror from the live table
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub services: usize,
    /// Dump chunks and lines that could not be decoded and were left out
    pub anomalies: Vec<DecodeError>,
}

impl<B: Backend> Mirror<B> {
    /// Replaces the mirror with what the live table holds. Parts of the
    /// dump that do not decode are skipped and reported; the rest is still
    /// adopted.
    pub fn save(&mut self) -> MirrorResult<SaveReport> {
        let live = self.dump()?;
        for anomaly in &live.anomalies {
            tracing::warn!("Skipped unreadable part of rule dump: {}", anomaly);
        }

        let report = SaveReport {
            services: live.services.len(),
            anomalies: live.anomalies,
        };
        self.services = live.services;
        self.last_sync = Some(Utc::now());

        tracing::debug!(
            "Loaded {} services from live table ({} skipped)",
            report.services,
            report.anomalies.len()
        );
        Ok(report)
    }

    /// Pushes a full rule set in one batched invocation and adopts it as
    /// the mirror. Rules already in the table that `services` does not
    /// mention are left in place; [`Mirror::clear`] first for a clean
    /// replacement.
    pub fn restore(&mut self, services: Vec<Service>) -> MirrorResult<()> {
        let mut seen = HashSet::new();
        for service in &services {
            service.validate()?;
            if !seen.insert(service.key()) {
                return Err(MirrorError::Conflict(service.key().to_string()));
            }
        }

        let input = encode_dump(&services);
        self.backend
            .run_with_input(&input, &self.command(RESTORE, Vec::new()))
            .map_err(|e| {
                tracing::warn!("{}", e);
                MirrorError::from(e)
            })?;

        tracing::info!("Restored {} services", services.len());
        self.services = services;
        self.last_sync = Some(Utc::now());
        Ok(())
    }

    /// Renders the mirror in the restore format
    pub fn export(&self) -> String {
        encode_dump(&self.services)
    }
}
