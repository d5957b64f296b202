use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use crate::codec::hostport::format_host_port;
use crate::error::ValidationError;
use crate::protocol::DEFAULT_WEIGHT;

/// Implements the string conversions shared by the wire enums: `Display`
/// and `From<T> for &'static str` via `as_str`, `TryFrom<String>` via `FromStr`.
macro_rules! wire_strings {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$ty> for &'static str {
            fn from(value: $ty) -> Self {
                value.as_str()
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// Protocol a virtual service is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ServiceType {
    #[default]
    Tcp,
    Udp,
    /// Firewall-mark service: the "host" is the mark and there is no port
    Fwmark,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Tcp => "tcp",
            ServiceType::Udp => "udp",
            ServiceType::Fwmark => "fwmark",
        }
    }

    /// Flag that selects this protocol on the command line
    pub fn flag(self) -> &'static str {
        match self {
            ServiceType::Tcp => "-t",
            ServiceType::Udp => "-u",
            ServiceType::Fwmark => "-f",
        }
    }
}

impl FromStr for ServiceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" | "" => Ok(ServiceType::Tcp),
            "udp" => Ok(ServiceType::Udp),
            "fwmark" => Ok(ServiceType::Fwmark),
            other => Err(ValidationError::InvalidServiceType(other.to_string())),
        }
    }
}

wire_strings!(ServiceType);

/// Connection scheduling algorithm of a virtual service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Scheduler {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnection,
    #[default]
    WeightedLeastConnection,
    LocalityBasedLeastConnection,
    LocalityBasedLeastConnectionReplicated,
    DestinationHashing,
    SourceHashing,
    ShortestExpectedDelay,
    NeverQueue,
}

impl Scheduler {
    pub const ALL: [Scheduler; 10] = [
        Scheduler::RoundRobin,
        Scheduler::WeightedRoundRobin,
        Scheduler::LeastConnection,
        Scheduler::WeightedLeastConnection,
        Scheduler::LocalityBasedLeastConnection,
        Scheduler::LocalityBasedLeastConnectionReplicated,
        Scheduler::DestinationHashing,
        Scheduler::SourceHashing,
        Scheduler::ShortestExpectedDelay,
        Scheduler::NeverQueue,
    ];

    /// Name understood by the control program
    pub fn as_str(self) -> &'static str {
        match self {
            Scheduler::RoundRobin => "rr",
            Scheduler::WeightedRoundRobin => "wrr",
            Scheduler::LeastConnection => "lc",
            Scheduler::WeightedLeastConnection => "wlc",
            Scheduler::LocalityBasedLeastConnection => "lblc",
            Scheduler::LocalityBasedLeastConnectionReplicated => "lblcr",
            Scheduler::DestinationHashing => "dh",
            Scheduler::SourceHashing => "sh",
            Scheduler::ShortestExpectedDelay => "sed",
            Scheduler::NeverQueue => "nq",
        }
    }
}

impl FromStr for Scheduler {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Scheduler::default());
        }
        Scheduler::ALL
            .into_iter()
            .find(|scheduler| scheduler.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidScheduler(s.to_string()))
    }
}

wire_strings!(Scheduler);

/// How dispatched packets reach a real server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ForwardingMethod {
    /// Direct routing
    #[default]
    Gateway,
    /// IP-in-IP encapsulation
    Ipip,
    /// NAT
    Masquerade,
}

impl ForwardingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ForwardingMethod::Gateway => "g",
            ForwardingMethod::Ipip => "i",
            ForwardingMethod::Masquerade => "m",
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            ForwardingMethod::Gateway => "-g",
            ForwardingMethod::Ipip => "-i",
            ForwardingMethod::Masquerade => "-m",
        }
    }
}

impl FromStr for ForwardingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "g" | "" => Ok(ForwardingMethod::Gateway),
            "i" => Ok(ForwardingMethod::Ipip),
            "m" => Ok(ForwardingMethod::Masquerade),
            other => Err(ValidationError::InvalidForwardingMethod(other.to_string())),
        }
    }
}

wire_strings!(ForwardingMethod);

/// Identity of a real server within its virtual service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerKey {
    pub host: String,
    pub port: u16,
}

impl ServerKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn host_port(&self) -> String {
        format_host_port(&self.host, self.port)
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host_port())
    }
}

/// Identity of a virtual service within the mirror
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceKey {
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub host: String,
    pub port: u16,
}

impl ServiceKey {
    pub fn new(service_type: ServiceType, host: impl Into<String>, port: u16) -> Self {
        Self { service_type, host: host.into(), port }
    }

    /// `host` alone for port 0 (fwmark addressing), `host:port` otherwise
    pub fn host_port(&self) -> String {
        format_host_port(&self.host, self.port)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.service_type, self.host_port())
    }
}

/// A real server (destination) behind a virtual service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,

    /// 0 means "no port"
    pub port: u16,

    pub forwarder: ForwardingMethod,

    /// 0 quiesces the server: existing connections stay, no new ones arrive
    pub weight: u32,

    /// Connection thresholds, 0 = unset
    pub upper_threshold: u32,
    pub lower_threshold: u32,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            forwarder: ForwardingMethod::default(),
            weight: DEFAULT_WEIGHT,
            upper_threshold: 0,
            lower_threshold: 0,
        }
    }
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn key(&self) -> ServerKey {
        ServerKey::new(self.host.clone(), self.port)
    }

    pub fn matches(&self, key: &ServerKey) -> bool {
        self.host == key.host && self.port == key.port
    }

    pub fn host_port(&self) -> String {
        format_host_port(&self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        Ok(())
    }
}

/// A virtual service and the real servers it dispatches to.
/// This is the record the mirror stores and the codecs translate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub host: String,

    pub port: u16,

    #[serde(rename = "type")]
    pub service_type: ServiceType,

    pub scheduler: Scheduler,

    /// Persistence timeout in seconds, 0 disables persistence
    pub persistence: u32,

    /// Persistence granularity, empty when unset
    pub netmask: String,

    /// Real servers in insertion order
    pub servers: Vec<Server>,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            service_type: ServiceType::default(),
            scheduler: Scheduler::default(),
            persistence: 0,
            netmask: String::new(),
            servers: Vec::new(),
        }
    }
}

impl Service {
    pub fn new(service_type: ServiceType, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            service_type,
            ..Self::default()
        }
    }

    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(self.service_type, self.host.clone(), self.port)
    }

    pub fn matches(&self, key: &ServiceKey) -> bool {
        self.service_type == key.service_type && self.host == key.host && self.port == key.port
    }

    pub fn host_port(&self) -> String {
        format_host_port(&self.host, self.port)
    }

    pub fn find_server(&self, key: &ServerKey) -> Option<&Server> {
        self.servers.iter().find(|server| server.matches(key))
    }

    pub fn server_position(&self, key: &ServerKey) -> Option<usize> {
        self.servers.iter().position(|server| server.matches(key))
    }

    /// Checks everything the type system does not: a usable address and
    /// unique servers.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost);
        }

        if self.service_type == ServiceType::Fwmark {
            if self.port != 0 {
                return Err(ValidationError::FwmarkWithPort(self.host_port()));
            }
            match self.host.parse::<u32>() {
                Ok(mark) if mark > 0 => {}
                _ => return Err(ValidationError::InvalidFwmark(self.host.clone())),
            }
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            server.validate()?;
            if !seen.insert(server.key()) {
                return Err(ValidationError::DuplicateServer {
                    service: self.key().to_string(),
                    server: server.host_port(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_service() -> Service {
        let mut service = Service::new(ServiceType::Tcp, "10.0.0.1", 80);
        service.scheduler = Scheduler::WeightedRoundRobin;
        service.servers.push(Server::new("10.0.0.2", 8080));
        service
    }

    #[test]
    fn test_enum_spellings() {
        assert_eq!("udp".parse::<ServiceType>().unwrap(), ServiceType::Udp);
        assert_eq!("".parse::<ServiceType>().unwrap(), ServiceType::Tcp);
        assert_eq!("lblcr".parse::<Scheduler>().unwrap(), Scheduler::LocalityBasedLeastConnectionReplicated);
        assert_eq!("".parse::<Scheduler>().unwrap(), Scheduler::WeightedLeastConnection);
        assert_eq!("m".parse::<ForwardingMethod>().unwrap(), ForwardingMethod::Masquerade);

        for scheduler in Scheduler::ALL {
            assert_eq!(scheduler.as_str().parse::<Scheduler>().unwrap(), scheduler);
        }
    }

    #[test]
    fn test_invalid_spellings_are_rejected() {
        assert_eq!(
            "x".parse::<ForwardingMethod>(),
            Err(ValidationError::InvalidForwardingMethod("x".to_string()))
        );
        assert_eq!(
            "sctp".parse::<ServiceType>(),
            Err(ValidationError::InvalidServiceType("sctp".to_string()))
        );
        assert_eq!(
            "fastest".parse::<Scheduler>(),
            Err(ValidationError::InvalidScheduler("fastest".to_string()))
        );
    }

    #[test]
    fn test_defaults() {
        let server = Server::new("10.0.0.2", 80);
        assert_eq!(server.forwarder, ForwardingMethod::Gateway);
        assert_eq!(server.weight, 1);
        assert_eq!(server.upper_threshold, 0);
        assert_eq!(server.lower_threshold, 0);

        let service = Service::new(ServiceType::Tcp, "10.0.0.1", 80);
        assert_eq!(service.scheduler, Scheduler::WeightedLeastConnection);
        assert_eq!(service.persistence, 0);
        assert!(service.netmask.is_empty());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(web_service()).unwrap();
        assert_eq!(json["type"], "tcp");
        assert_eq!(json["scheduler"], "wrr");
        assert_eq!(json["persistence"], 0);
        assert_eq!(json["servers"][0]["forwarder"], "g");
        assert_eq!(json["servers"][0]["weight"], 1);

        let parsed: Service = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, web_service());
    }

    #[test]
    fn test_json_missing_fields_take_defaults() {
        let service: Service = serde_json::from_str(
            r#"{"host": "10.0.0.1", "port": 443, "servers": [{"host": "10.0.0.9", "port": 443}]}"#,
        )
        .unwrap();
        assert_eq!(service.service_type, ServiceType::Tcp);
        assert_eq!(service.scheduler, Scheduler::WeightedLeastConnection);
        assert_eq!(service.persistence, 0);
        assert_eq!(service.servers[0].weight, 1);
    }

    #[test]
    fn test_json_rejects_unknown_forwarder() {
        let result: Result<Server, _> =
            serde_json::from_str(r#"{"host": "10.0.0.2", "port": 80, "forwarder": "x"}"#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid forwarding method 'x'"));
    }

    #[test]
    fn test_validate() {
        assert!(web_service().validate().is_ok());

        let mut service = web_service();
        service.host.clear();
        assert_eq!(service.validate(), Err(ValidationError::EmptyHost));

        let mut service = web_service();
        service.servers.push(Server::new("", 80));
        assert_eq!(service.validate(), Err(ValidationError::EmptyHost));

        let mut service = web_service();
        service.servers.push(Server::new("10.0.0.2", 8080));
        assert!(matches!(service.validate(), Err(ValidationError::DuplicateServer { .. })));
    }

    #[test]
    fn test_validate_fwmark() {
        let service = Service::new(ServiceType::Fwmark, "7", 0);
        assert!(service.validate().is_ok());

        let service = Service::new(ServiceType::Fwmark, "7", 80);
        assert_eq!(service.validate(), Err(ValidationError::FwmarkWithPort("7:80".to_string())));

        let service = Service::new(ServiceType::Fwmark, "10.0.0.1", 0);
        assert_eq!(service.validate(), Err(ValidationError::InvalidFwmark("10.0.0.1".to_string())));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(web_service().key().to_string(), "tcp 10.0.0.1:80");
        assert_eq!(ServiceKey::new(ServiceType::Fwmark, "3", 0).to_string(), "fwmark 3");
    }
}
