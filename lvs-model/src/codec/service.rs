use crate::codec::hostport::split_host_port;
use crate::codec::tokens::{scan, Action, Flag};
use crate::error::DecodeError;
use crate::protocol::{
    ADD_SERVER, ADD_SERVER_LONG, ADD_SERVICE, ADD_SERVICE_LONG, DEFAULT_PERSISTENCE, NETMASK,
    PERSISTENT, SCHEDULER,
};
use crate::types::{Scheduler, Server, Service, ServiceKey, ServiceType};

/// Service under construction while its flags are scanned
struct ServiceDraft {
    service: Service,
    address: Option<Result<(String, u16), DecodeError>>,
    scheduler: Option<String>,
}

impl ServiceDraft {
    fn new() -> Self {
        Self {
            service: Service {
                persistence: DEFAULT_PERSISTENCE,
                ..Service::default()
            },
            address: None,
            scheduler: None,
        }
    }

    fn select(&mut self, service_type: ServiceType, value: Option<&str>) {
        self.service.service_type = service_type;
        self.address = value.map(split_host_port);
    }

    fn finish(mut self, source: &str) -> Result<Service, DecodeError> {
        let (host, port) = self
            .address
            .ok_or_else(|| DecodeError::MissingAddress(source.to_string()))??;
        self.service.host = host;
        self.service.port = port;

        if let Some(name) = self.scheduler {
            self.service.scheduler = name
                .parse()
                .map_err(|_| DecodeError::UnknownScheduler(name))?;
        }
        Ok(self.service)
    }
}

fn tcp_service(draft: &mut ServiceDraft, value: Option<&str>) {
    draft.select(ServiceType::Tcp, value);
}

fn udp_service(draft: &mut ServiceDraft, value: Option<&str>) {
    draft.select(ServiceType::Udp, value);
}

fn fwmark_service(draft: &mut ServiceDraft, value: Option<&str>) {
    draft.select(ServiceType::Fwmark, value);
}

fn scheduler(draft: &mut ServiceDraft, value: Option<&str>) {
    draft.scheduler = value.map(str::to_string);
}

fn persistent(draft: &mut ServiceDraft, value: Option<&str>) {
    draft.service.persistence = value
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PERSISTENCE);
}

fn netmask(draft: &mut ServiceDraft, value: Option<&str>) {
    draft.service.netmask = value.unwrap_or_default().to_string();
}

static SERVICE_FLAGS: &[Flag<ServiceDraft>] = &[
    Flag { spellings: &["-t", "--tcp-service"], action: Action::Value(tcp_service) },
    Flag { spellings: &["-u", "--udp-service"], action: Action::Value(udp_service) },
    Flag { spellings: &["-f", "--fwmark-service"], action: Action::Value(fwmark_service) },
    Flag { spellings: &["-s", "--scheduler"], action: Action::Value(scheduler) },
    Flag { spellings: &["-p", "--persistent"], action: Action::Value(persistent) },
    Flag { spellings: &["-M", "--netmask"], action: Action::Value(netmask) },
];

/// True for lines that add a real server, as opposed to lines that create
/// a service.
pub fn is_server_line(line: &str) -> bool {
    matches!(line.split_whitespace().next(), Some(ADD_SERVER | ADD_SERVER_LONG))
}

fn strip_marker<'a>(tokens: &'a [&'a str], markers: &[&str]) -> &'a [&'a str] {
    match tokens.first() {
        Some(first) if markers.contains(first) => &tokens[1..],
        _ => tokens,
    }
}

impl ServiceKey {
    /// Protocol flag and address, the prefix shared by every command that
    /// targets this service.
    pub fn to_args(&self) -> Vec<String> {
        vec![self.service_type.flag().to_string(), self.host_port()]
    }
}

impl Service {
    pub fn address_args(&self) -> Vec<String> {
        self.key().to_args()
    }

    pub fn persistence_args(&self) -> Vec<String> {
        if self.persistence == 0 {
            return Vec::new();
        }
        vec![PERSISTENT.to_string(), self.persistence.to_string()]
    }

    pub fn netmask_args(&self) -> Vec<String> {
        if self.netmask.is_empty() {
            return Vec::new();
        }
        vec![NETMASK.to_string(), self.netmask.clone()]
    }

    /// Arguments of a create/edit command in the order the control program
    /// expects: protocol, address, scheduler, persistence, netmask.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.address_args();
        args.push(SCHEDULER.to_string());
        args.push(self.scheduler.as_str().to_string());
        args.extend(self.persistence_args());
        args.extend(self.netmask_args());
        args
    }

    /// Arguments that add `server` to this service, minus the verb.
    pub fn server_args(&self, server: &Server) -> Vec<String> {
        let mut args = self.address_args();
        args.extend(server.to_args());
        args
    }

    /// Bulk restore block: one create line, then one add line per server.
    pub fn to_text(&self) -> String {
        let mut text = format!("{} {}\n", ADD_SERVICE, self.to_args().join(" "));
        for server in &self.servers {
            text.push_str(&format!("{} {}\n", ADD_SERVER, self.server_args(server).join(" ")));
        }
        text
    }

    /// Decodes one service block. Fails on the first bad line; use
    /// [`Service::decode_lenient`] to keep the good servers.
    pub fn decode(text: &str) -> Result<Service, DecodeError> {
        let (service, anomalies) = Self::decode_lenient(text)?;
        match anomalies.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(service),
        }
    }

    /// Decodes one service block. The first non-empty line is the service
    /// (its `-A` marker is optional), every following line a server. Server
    /// lines that fail to decode are skipped and returned next to the service.
    pub fn decode_lenient(text: &str) -> Result<(Service, Vec<DecodeError>), DecodeError> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let first = lines
            .next()
            .ok_or_else(|| DecodeError::MissingAddress(String::new()))?;
        if is_server_line(first) {
            return Err(DecodeError::OrphanServer(first.to_string()));
        }

        let tokens: Vec<&str> = first.split_whitespace().collect();
        let mut service = decode_service_tokens(strip_marker(&tokens, &[ADD_SERVICE, ADD_SERVICE_LONG]))?;
        let key = service.key();

        let mut anomalies = Vec::new();
        for line in lines {
            match decode_server_line(line, &key) {
                Ok(server) => service.servers.push(server),
                Err(err) => anomalies.push(err),
            }
        }
        Ok((service, anomalies))
    }
}

fn decode_service_tokens(tokens: &[&str]) -> Result<Service, DecodeError> {
    let mut draft = ServiceDraft::new();
    scan(tokens, SERVICE_FLAGS, &mut draft);
    draft.finish(&tokens.join(" "))
}

/// Decodes a server line, checking that the service address it names is
/// the one of the enclosing block.
fn decode_server_line(line: &str, key: &ServiceKey) -> Result<Server, DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let tokens = strip_marker(&tokens, &[ADD_SERVER, ADD_SERVER_LONG]);

    let mut draft = ServiceDraft::new();
    scan(tokens, SERVICE_FLAGS, &mut draft);
    if let Some(Ok((host, port))) = &draft.address {
        if draft.service.service_type != key.service_type || *host != key.host || *port != key.port {
            return Err(DecodeError::ServerMismatch {
                service: key.to_string(),
                line: line.to_string(),
            });
        }
    }

    Server::decode_tokens(tokens)
}
