use lvs_model::protocol::{
    ADD_SERVER, ADD_SERVICE, CLEAR, DELETE_SERVER, DELETE_SERVICE, EDIT_SERVER, EDIT_SERVICE,
    REAL_SERVER,
};
use lvs_model::{Server, ServerKey, Service, ServiceKey};
use crate::backend::Backend;
use crate::error::{MirrorError, MirrorResult};
use super::{server_not_found, Mirror};

impl<B: Backend> Mirror<B> {
    /// Creates a service and then each of its servers. A server that fails
    /// to add aborts the operation; the service itself stays in the live
    /// table until the next save picks it up.
    pub fn add_service(&mut self, service: Service) -> MirrorResult<()> {
        service.validate()?;
        let key = service.key();
        if self.find_service(&key).is_some() {
            return Err(MirrorError::Conflict(key.to_string()));
        }

        self.execute(self.command(ADD_SERVICE, service.to_args()))?;
        for server in &service.servers {
            if let Err(e) = self.execute(self.command(ADD_SERVER, service.server_args(server))) {
                tracing::warn!(
                    "Service {} was created but server {} was not; mirror is behind the live table",
                    key,
                    server.host_port()
                );
                return Err(e);
            }
        }

        tracing::info!("Added service {} with {} servers", key, service.servers.len());
        self.services.push(service);
        Ok(())
    }

    /// Changes the scheduling attributes of an existing service. Servers
    /// are managed separately: the stored servers are kept and those on
    /// `service` are ignored.
    pub fn edit_service(&mut self, mut service: Service) -> MirrorResult<()> {
        service.validate()?;
        let index = self.position(&service.key())?;

        self.execute(self.command(EDIT_SERVICE, service.to_args()))?;

        service.servers = std::mem::take(&mut self.services[index].servers);
        tracing::info!("Edited service {}", service.key());
        self.services[index] = service;
        Ok(())
    }

    pub fn remove_service(&mut self, key: &ServiceKey) -> MirrorResult<()> {
        let index = self.position(key)?;

        self.execute(self.command(DELETE_SERVICE, key.to_args()))?;
        self.verify_gone(key.to_string(), |live| {
            live.iter().any(|service| service.matches(key))
        })?;

        self.services.remove(index);
        tracing::info!("Removed service {}", key);
        Ok(())
    }

    /// Flushes the whole table
    pub fn clear(&mut self) -> MirrorResult<()> {
        self.execute(self.command(CLEAR, Vec::new()))?;
        self.services.clear();
        tracing::info!("Cleared all services");
        Ok(())
    }

    pub fn add_server(&mut self, key: &ServiceKey, server: Server) -> MirrorResult<()> {
        server.validate()?;
        let index = self.position(key)?;
        if self.services[index].find_server(&server.key()).is_some() {
            return Err(MirrorError::Conflict(format!("server {} in {}", server.host_port(), key)));
        }

        self.execute(self.command(ADD_SERVER, self.services[index].server_args(&server)))?;

        tracing::info!("Added server {} to {}", server.host_port(), key);
        self.services[index].servers.push(server);
        Ok(())
    }

    /// Replaces the forwarding attributes of a server, identified by its
    /// host and port
    pub fn edit_server(&mut self, key: &ServiceKey, server: Server) -> MirrorResult<()> {
        server.validate()?;
        let index = self.position(key)?;
        let slot = self.services[index]
            .server_position(&server.key())
            .ok_or_else(|| server_not_found(key, &server.key()))?;

        self.execute(self.command(EDIT_SERVER, self.services[index].server_args(&server)))?;

        tracing::info!("Edited server {} in {}", server.host_port(), key);
        self.services[index].servers[slot] = server;
        Ok(())
    }

    pub fn remove_server(&mut self, key: &ServiceKey, server: &ServerKey) -> MirrorResult<()> {
        let index = self.position(key)?;
        let slot = self.services[index]
            .server_position(server)
            .ok_or_else(|| server_not_found(key, server))?;

        let mut args = key.to_args();
        args.push(REAL_SERVER.to_string());
        args.push(server.host_port());
        self.execute(self.command(DELETE_SERVER, args))?;
        self.verify_gone(format!("server {} in {}", server, key), |live| {
            live.iter()
                .any(|service| service.matches(key) && service.find_server(server).is_some())
        })?;

        self.services[index].servers.remove(slot);
        tracing::info!("Removed server {} from {}", server, key);
        Ok(())
    }

    /// Changes only the weight of a server. Weight 0 drains it.
    pub fn set_server_weight(&mut self, key: &ServiceKey, server: &ServerKey, weight: u32) -> MirrorResult<()> {
        let mut updated = self.get_server(key, server)?.clone();
        updated.weight = weight;
        self.edit_server(key, updated)
    }
}

#[cfg(test)]
mod tests {
    use lvs_model::{ForwardingMethod, Scheduler, Server, ServerKey, ServiceKey, ServiceType, ValidationError};
    use crate::error::MirrorError;
    use crate::mirror::testing::{mirror, mirror_with, web_service};
    use crate::mirror::MirrorSettings;

    fn web_key() -> ServiceKey {
        web_service().key()
    }

    #[test]
    fn test_add_service_issues_create_then_servers() {
        let (mut mirror, backend) = mirror();
        let mut service = web_service();
        service.servers.push(Server::new("10.0.0.3", 8080));
        mirror.add_service(service.clone()).unwrap();

        assert_eq!(
            backend.commands(),
            vec![
                "-A -t 10.0.0.1:80 -s wrr",
                "-a -t 10.0.0.1:80 -r 10.0.0.2:8080 -g -w 1",
                "-a -t 10.0.0.1:80 -r 10.0.0.3:8080 -g -w 1",
            ]
        );
        assert_eq!(mirror.services(), &[service]);
    }

    #[test]
    fn test_add_service_from_json_without_persistence() {
        let (mut mirror, backend) = mirror();
        let service: lvs_model::Service = serde_json::from_str(
            r#"{"type": "tcp", "host": "10.0.0.1", "port": 80, "scheduler": "wrr", "servers": []}"#,
        )
        .unwrap();
        mirror.add_service(service).unwrap();

        assert_eq!(backend.commands(), vec!["-A -t 10.0.0.1:80 -s wrr"]);
        assert_eq!(mirror.services()[0].persistence, 0);
    }

    #[test]
    fn test_add_duplicate_service_is_rejected_without_command() {
        let (mut mirror, backend) = mirror();
        mirror.add_service(web_service()).unwrap();
        backend.clear_calls();

        let mut again = web_service();
        again.scheduler = Scheduler::RoundRobin;
        assert_eq!(
            mirror.add_service(again),
            Err(MirrorError::Conflict("tcp 10.0.0.1:80".to_string()))
        );
        assert!(backend.calls().is_empty());
        assert_eq!(mirror.services().len(), 1);
        assert_eq!(mirror.services()[0].scheduler, Scheduler::WeightedRoundRobin);
    }

    #[test]
    fn test_same_address_other_protocol_is_distinct() {
        let (mut mirror, _) = mirror();
        mirror.add_service(web_service()).unwrap();
        let mut udp = web_service();
        udp.service_type = ServiceType::Udp;
        mirror.add_service(udp).unwrap();
        assert_eq!(mirror.services().len(), 2);
    }

    #[test]
    fn test_failed_command_leaves_mirror_unchanged() {
        let (mut mirror, backend) = mirror();
        backend.fail_on("-A");
        let err = mirror.add_service(web_service()).unwrap_err();
        assert!(matches!(err, MirrorError::Command(_)));
        assert!(mirror.services().is_empty());
    }

    #[test]
    fn test_failed_server_aborts_add() {
        let (mut mirror, backend) = mirror();
        backend.fail_on("10.0.0.2:8080");
        assert!(mirror.add_service(web_service()).is_err());
        assert!(mirror.services().is_empty());
        assert_eq!(backend.commands().len(), 2);
    }

    #[test]
    fn test_invalid_service_is_rejected_before_any_command() {
        let (mut mirror, backend) = mirror();
        let mut service = web_service();
        service.servers.push(Server::new("10.0.0.2", 8080));
        assert!(matches!(
            mirror.add_service(service),
            Err(MirrorError::Validation(ValidationError::DuplicateServer { .. }))
        ));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_edit_service_keeps_servers() {
        let (mut mirror, backend) = mirror();
        mirror.add_service(web_service()).unwrap();
        backend.clear_calls();

        let mut edited = web_service();
        edited.scheduler = Scheduler::SourceHashing;
        edited.persistence = 600;
        edited.servers.clear();
        mirror.edit_service(edited).unwrap();

        assert_eq!(backend.commands(), vec!["-E -t 10.0.0.1:80 -s sh -p 600"]);
        let stored = mirror.get_service(&web_key()).unwrap();
        assert_eq!(stored.scheduler, Scheduler::SourceHashing);
        assert_eq!(stored.persistence, 600);
        assert_eq!(stored.servers.len(), 1);
    }

    #[test]
    fn test_edit_missing_service() {
        let (mut mirror, backend) = mirror();
        assert!(matches!(mirror.edit_service(web_service()), Err(MirrorError::NotFound(_))));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_remove_service() {
        let (mut mirror, backend) = mirror();
        mirror.add_service(web_service()).unwrap();
        backend.clear_calls();

        mirror.remove_service(&web_key()).unwrap();
        assert_eq!(backend.commands(), vec!["-D -t 10.0.0.1:80"]);
        assert!(mirror.services().is_empty());

        assert!(matches!(mirror.remove_service(&web_key()), Err(MirrorError::NotFound(_))));
    }

    #[test]
    fn test_remove_service_verified_against_live_table() {
        let settings = MirrorSettings {
            verify_deletes: true,
            ..MirrorSettings::default()
        };
        let (mut mirror, backend) = mirror_with(settings);
        mirror.add_service(web_service()).unwrap();

        backend.set_dump("-A -t 10.0.0.1:80 -s wrr\n");
        assert_eq!(
            mirror.remove_service(&web_key()),
            Err(MirrorError::DeleteFailed("tcp 10.0.0.1:80".to_string()))
        );
        assert_eq!(mirror.services().len(), 1);

        backend.set_dump("");
        backend.clear_calls();
        mirror.remove_service(&web_key()).unwrap();
        assert_eq!(backend.commands(), vec!["-D -t 10.0.0.1:80", "-S -n"]);
        assert!(mirror.services().is_empty());
    }

    #[test]
    fn test_add_then_remove_restores_collection() {
        let (mut mirror, _) = mirror();
        let mut dns = lvs_model::Service::new(ServiceType::Udp, "10.0.0.1", 53);
        dns.servers.push(Server::new("10.0.0.4", 53));
        mirror.add_service(web_service()).unwrap();
        mirror.add_service(dns).unwrap();
        let before = mirror.services().to_vec();

        let mut extra = lvs_model::Service::new(ServiceType::Tcp, "10.0.0.1", 443);
        extra.servers.push(Server::new("10.0.0.5", 443));
        mirror.add_service(extra.clone()).unwrap();
        mirror.add_service(lvs_model::Service::new(ServiceType::Fwmark, "9", 0)).unwrap();
        let after_add = mirror.services().to_vec();

        mirror.remove_service(&extra.key()).unwrap();
        assert_eq!(mirror.services()[..2], before[..]);
        assert_eq!(mirror.services()[2], after_add[3]);

        mirror.remove_service(&after_add[3].key()).unwrap();
        assert_eq!(mirror.services(), before.as_slice());
    }

    #[test]
    fn test_remove_service_unconfirmed_keeps_entry() {
        let settings = MirrorSettings {
            verify_deletes: true,
            ..MirrorSettings::default()
        };
        let (mut mirror, backend) = mirror_with(settings);
        mirror.add_service(web_service()).unwrap();
        backend.fail_on("-S");

        assert!(matches!(mirror.remove_service(&web_key()), Err(MirrorError::Command(_))));
        assert_eq!(backend.commands().last().unwrap(), "-S -n");
        assert_eq!(mirror.services().len(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut mirror, backend) = mirror();
        mirror.add_service(web_service()).unwrap();
        backend.clear_calls();

        mirror.clear().unwrap();
        assert!(mirror.services().is_empty());
        mirror.clear().unwrap();
        assert!(mirror.services().is_empty());
        assert_eq!(backend.commands(), vec!["-C", "-C"]);
    }

    #[test]
    fn test_clear() {
        let (mut mirror, backend) = mirror();
        mirror.add_service(web_service()).unwrap();
        mirror.clear().unwrap();
        assert!(mirror.services().is_empty());
        assert_eq!(backend.commands().last().unwrap(), "-C");
    }

    #[test]
    fn test_server_lifecycle() {
        let (mut mirror, backend) = mirror();
        mirror.add_service(web_service()).unwrap();
        let key = web_key();
        backend.clear_calls();

        let mut server = Server::new("10.0.0.3", 8080);
        server.forwarder = ForwardingMethod::Masquerade;
        server.upper_threshold = 500;
        mirror.add_server(&key, server.clone()).unwrap();
        assert_eq!(mirror.list_servers(&key).unwrap().len(), 2);

        server.weight = 4;
        mirror.edit_server(&key, server.clone()).unwrap();
        assert_eq!(mirror.get_server(&key, &server.key()).unwrap().weight, 4);

        mirror.remove_server(&key, &server.key()).unwrap();
        assert_eq!(mirror.list_servers(&key).unwrap(), &[Server::new("10.0.0.2", 8080)]);

        assert_eq!(
            backend.commands(),
            vec![
                "-a -t 10.0.0.1:80 -r 10.0.0.3:8080 -m -x 500 -w 1",
                "-e -t 10.0.0.1:80 -r 10.0.0.3:8080 -m -x 500 -w 4",
                "-d -t 10.0.0.1:80 -r 10.0.0.3:8080",
            ]
        );
    }

    #[test]
    fn test_server_errors() {
        let (mut mirror, backend) = mirror();
        let key = web_key();
        assert!(matches!(
            mirror.add_server(&key, Server::new("10.0.0.3", 80)),
            Err(MirrorError::NotFound(_))
        ));

        mirror.add_service(web_service()).unwrap();
        backend.clear_calls();
        assert!(matches!(
            mirror.add_server(&key, Server::new("10.0.0.2", 8080)),
            Err(MirrorError::Conflict(_))
        ));
        assert!(matches!(
            mirror.edit_server(&key, Server::new("10.0.0.9", 8080)),
            Err(MirrorError::NotFound(_))
        ));
        assert!(matches!(
            mirror.remove_server(&key, &ServerKey::new("10.0.0.9", 8080)),
            Err(MirrorError::NotFound(_))
        ));
        assert_eq!(
            mirror.add_server(&key, Server::new(" ", 80)),
            Err(MirrorError::Validation(ValidationError::EmptyHost))
        );
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_remove_server_verified_against_live_table() {
        let settings = MirrorSettings {
            verify_deletes: true,
            ..MirrorSettings::default()
        };
        let (mut mirror, backend) = mirror_with(settings);
        mirror.add_service(web_service()).unwrap();
        let server = ServerKey::new("10.0.0.2", 8080);

        backend.set_dump("-A -t 10.0.0.1:80 -s wrr\n-a -t 10.0.0.1:80 -r 10.0.0.2:8080 -g -w 1\n");
        assert!(matches!(
            mirror.remove_server(&web_key(), &server),
            Err(MirrorError::DeleteFailed(_))
        ));
        assert_eq!(mirror.list_servers(&web_key()).unwrap().len(), 1);

        backend.set_dump("-A -t 10.0.0.1:80 -s wrr\n");
        mirror.remove_server(&web_key(), &server).unwrap();
        assert!(mirror.list_servers(&web_key()).unwrap().is_empty());
    }

    #[test]
    fn test_set_server_weight() {
        let (mut mirror, backend) = mirror();
        mirror.add_service(web_service()).unwrap();
        backend.clear_calls();

        let server = ServerKey::new("10.0.0.2", 8080);
        mirror.set_server_weight(&web_key(), &server, 0).unwrap();
        assert_eq!(backend.commands(), vec!["-e -t 10.0.0.1:80 -r 10.0.0.2:8080 -g -w 0"]);
        assert_eq!(mirror.get_server(&web_key(), &server).unwrap().weight, 0);
    }

    #[test]
    fn test_fwmark_service() {
        let (mut mirror, backend) = mirror();
        let mut service = lvs_model::Service::new(ServiceType::Fwmark, "7", 0);
        service.servers.push(Server::new("10.0.0.2", 0));
        mirror.add_service(service).unwrap();

        assert_eq!(
            backend.commands(),
            vec!["-A -f 7 -s wlc", "-a -f 7 -r 10.0.0.2 -g -w 1"]
        );
    }
}
