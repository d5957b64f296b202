use thiserror::Error;

/// Rejections raised before anything is sent to the control program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid service type '{0}'")]
    InvalidServiceType(String),

    #[error("invalid scheduler '{0}'")]
    InvalidScheduler(String),

    #[error("invalid forwarding method '{0}'")]
    InvalidForwardingMethod(String),

    #[error("host must not be empty")]
    EmptyHost,

    #[error("fwmark service {0} must not carry a port")]
    FwmarkWithPort(String),

    #[error("fwmark '{0}' is not a positive integer")]
    InvalidFwmark(String),

    #[error("server {server} is listed more than once in service {service}")]
    DuplicateServer { service: String, server: String },
}

/// Problems found while decoding dump text. A decode error only ever
/// discards the chunk or line it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no address in '{0}'")]
    MissingAddress(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("unknown scheduler '{0}'")]
    UnknownScheduler(String),

    #[error("server line '{0}' has no service line before it")]
    OrphanServer(String),

    #[error("server line '{line}' does not belong to service {service}")]
    ServerMismatch { service: String, line: String },
}
