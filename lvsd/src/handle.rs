use std::thread;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use lvs_model::{Server, ServerKey, Service, ServiceKey};
use crate::backend::Backend;
use crate::config::TimeoutConfig;
use crate::error::{MirrorError, MirrorResult};
use crate::mirror::{DaemonOutcome, Mirror, SaveReport};

/// Reply channel of a command
pub type Reply<T> = oneshot::Sender<MirrorResult<T>>;

/// Commands sent to the mirror thread
pub enum MirrorCommand {
    CheckTool(Reply<()>),
    AddService(Service, Reply<()>),
    EditService(Service, Reply<()>),
    RemoveService(ServiceKey, Reply<()>),
    Clear(Reply<()>),
    AddServer(ServiceKey, Server, Reply<()>),
    EditServer(ServiceKey, Server, Reply<()>),
    RemoveServer(ServiceKey, ServerKey, Reply<()>),
    SetServerWeight {
        service: ServiceKey,
        server: ServerKey,
        weight: u32,
        reply: Reply<()>,
    },
    SetTimeouts(TimeoutConfig, Reply<()>),
    Save(Reply<SaveReport>),
    Restore(Vec<Service>, Reply<()>),
    Export(oneshot::Sender<String>),
    GetAll(oneshot::Sender<Vec<Service>>),
    GetService(ServiceKey, Reply<Service>),
    GetServer(ServiceKey, ServerKey, Reply<Server>),
    Status(oneshot::Sender<MirrorStatus>),
    StartDaemon(oneshot::Sender<DaemonOutcome>),
    StopDaemon(oneshot::Sender<DaemonOutcome>),
    Zero(Reply<()>),
    ZeroService(ServiceKey, Reply<()>),
    Shutdown,
}

/// Point-in-time summary of the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorStatus {
    pub services: usize,
    pub servers: usize,
    pub fingerprint: String,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Handle to the thread that owns the mirror. All operations are queued
/// and applied one at a time in arrival order.
#[derive(Clone)]
pub struct MirrorHandle {
    tx: mpsc::Sender<MirrorCommand>,
    fingerprint_rx: watch::Receiver<String>,
}

/// Publishes a new fingerprint after a successful mutation, then replies
fn publish_and_reply<B: Backend, T>(
    mirror: &Mirror<B>,
    fingerprint_tx: &watch::Sender<String>,
    result: MirrorResult<T>,
    reply: Reply<T>,
) {
    if result.is_ok() {
        fingerprint_tx.send_if_modified(|current| {
            let next = mirror.fingerprint();
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
    let _ = reply.send(result);
}

impl MirrorHandle {
    /// Spawn a new mirror thread that owns `mirror`
    pub fn spawn<B: Backend + Send + 'static>(mut mirror: Mirror<B>) -> Self {
        let (tx, mut rx) = mpsc::channel::<MirrorCommand>(256);
        let (fingerprint_tx, fingerprint_rx) = watch::channel(mirror.fingerprint());

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    MirrorCommand::CheckTool(reply) => {
                        let _ = reply.send(mirror.check_tool());
                    }
                    MirrorCommand::AddService(service, reply) => {
                        let result = mirror.add_service(service);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::EditService(service, reply) => {
                        let result = mirror.edit_service(service);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::RemoveService(key, reply) => {
                        let result = mirror.remove_service(&key);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::Clear(reply) => {
                        let result = mirror.clear();
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::AddServer(key, server, reply) => {
                        let result = mirror.add_server(&key, server);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::EditServer(key, server, reply) => {
                        let result = mirror.edit_server(&key, server);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::RemoveServer(key, server, reply) => {
                        let result = mirror.remove_server(&key, &server);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::SetServerWeight { service, server, weight, reply } => {
                        let result = mirror.set_server_weight(&service, &server, weight);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::SetTimeouts(timeouts, reply) => {
                        let _ = reply.send(mirror.set_timeouts(timeouts));
                    }
                    MirrorCommand::Save(reply) => {
                        let result = mirror.save();
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::Restore(services, reply) => {
                        let result = mirror.restore(services);
                        publish_and_reply(&mirror, &fingerprint_tx, result, reply);
                    }
                    MirrorCommand::Export(reply) => {
                        let _ = reply.send(mirror.export());
                    }
                    MirrorCommand::GetAll(reply) => {
                        let _ = reply.send(mirror.services().to_vec());
                    }
                    MirrorCommand::GetService(key, reply) => {
                        let _ = reply.send(mirror.get_service(&key).cloned());
                    }
                    MirrorCommand::GetServer(key, server, reply) => {
                        let _ = reply.send(mirror.get_server(&key, &server).cloned());
                    }
                    MirrorCommand::Status(reply) => {
                        let _ = reply.send(MirrorStatus {
                            services: mirror.services().len(),
                            servers: mirror.services().iter().map(|s| s.servers.len()).sum(),
                            fingerprint: mirror.fingerprint(),
                            last_sync: mirror.last_sync(),
                        });
                    }
                    MirrorCommand::StartDaemon(reply) => {
                        let _ = reply.send(mirror.start_daemon());
                    }
                    MirrorCommand::StopDaemon(reply) => {
                        let _ = reply.send(mirror.stop_daemon());
                    }
                    MirrorCommand::Zero(reply) => {
                        let _ = reply.send(mirror.zero());
                    }
                    MirrorCommand::ZeroService(key, reply) => {
                        let _ = reply.send(mirror.zero_service(&key));
                    }
                    MirrorCommand::Shutdown => {
                        tracing::info!("Mirror thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx, fingerprint_rx }
    }

    /// Sends a command and waits for the thread's answer
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> MirrorCommand) -> MirrorResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| MirrorError::Stopped)?;
        rx.await.map_err(|_| MirrorError::Stopped)
    }

    /// Current fingerprint of the mirror contents
    pub fn fingerprint(&self) -> String {
        self.fingerprint_rx.borrow().clone()
    }

    /// Receiver that is notified whenever the mirror contents change
    pub fn watch_fingerprint(&self) -> watch::Receiver<String> {
        self.fingerprint_rx.clone()
    }

    pub async fn check_tool(&self) -> MirrorResult<()> {
        self.request(MirrorCommand::CheckTool).await?
    }

    pub async fn add_service(&self, service: Service) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::AddService(service, reply)).await?
    }

    pub async fn edit_service(&self, service: Service) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::EditService(service, reply)).await?
    }

    pub async fn remove_service(&self, key: ServiceKey) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::RemoveService(key, reply)).await?
    }

    pub async fn clear(&self) -> MirrorResult<()> {
        self.request(MirrorCommand::Clear).await?
    }

    pub async fn add_server(&self, key: ServiceKey, server: Server) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::AddServer(key, server, reply)).await?
    }

    pub async fn edit_server(&self, key: ServiceKey, server: Server) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::EditServer(key, server, reply)).await?
    }

    pub async fn remove_server(&self, key: ServiceKey, server: ServerKey) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::RemoveServer(key, server, reply)).await?
    }

    pub async fn set_server_weight(&self, service: ServiceKey, server: ServerKey, weight: u32) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::SetServerWeight { service, server, weight, reply })
            .await?
    }

    pub async fn set_timeouts(&self, timeouts: TimeoutConfig) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::SetTimeouts(timeouts, reply)).await?
    }

    /// Rebuild the mirror from the live table
    pub async fn save(&self) -> MirrorResult<SaveReport> {
        self.request(MirrorCommand::Save).await?
    }

    /// Push a full rule set and adopt it
    pub async fn restore(&self, services: Vec<Service>) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::Restore(services, reply)).await?
    }

    pub async fn export(&self) -> MirrorResult<String> {
        self.request(MirrorCommand::Export).await
    }

    /// Snapshot of every service
    pub async fn services(&self) -> MirrorResult<Vec<Service>> {
        self.request(MirrorCommand::GetAll).await
    }

    pub async fn get_service(&self, key: ServiceKey) -> MirrorResult<Service> {
        self.request(|reply| MirrorCommand::GetService(key, reply)).await?
    }

    pub async fn get_server(&self, key: ServiceKey, server: ServerKey) -> MirrorResult<Server> {
        self.request(|reply| MirrorCommand::GetServer(key, server, reply)).await?
    }

    pub async fn status(&self) -> MirrorResult<MirrorStatus> {
        self.request(MirrorCommand::Status).await
    }

    pub async fn start_daemon(&self) -> MirrorResult<DaemonOutcome> {
        self.request(MirrorCommand::StartDaemon).await
    }

    pub async fn stop_daemon(&self) -> MirrorResult<DaemonOutcome> {
        self.request(MirrorCommand::StopDaemon).await
    }

    pub async fn zero(&self) -> MirrorResult<()> {
        self.request(MirrorCommand::Zero).await?
    }

    pub async fn zero_service(&self, key: ServiceKey) -> MirrorResult<()> {
        self.request(|reply| MirrorCommand::ZeroService(key, reply)).await?
    }

    /// Shutdown the mirror thread
    pub async fn shutdown(&self) -> MirrorResult<()> {
        self.tx
            .send(MirrorCommand::Shutdown)
            .await
            .map_err(|_| MirrorError::Stopped)
    }
}
