use crate::error::DecodeError;

/// Renders an address the way the control program expects it.
/// Port 0 yields the bare host; IPv6 hosts are bracketed.
pub fn format_host_port(host: &str, port: u16) -> String {
    if port == 0 {
        host.to_string()
    } else if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Splits `host:port`, `[v6]:port`, a bare host or a bare IPv6 address.
/// A missing port is reported as 0.
pub fn split_host_port(address: &str) -> Result<(String, u16), DecodeError> {
    let invalid = || DecodeError::InvalidAddress(address.to_string());

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = match tail {
            "" => 0,
            _ => tail
                .strip_prefix(':')
                .and_then(|port| port.parse().ok())
                .ok_or_else(invalid)?,
        };
        return Ok((host.to_string(), port));
    }

    match address.matches(':').count() {
        0 if !address.is_empty() => Ok((address.to_string(), 0)),
        1 => {
            let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid());
            }
            let port = port.parse().map_err(|_| invalid())?;
            Ok((host.to_string(), port))
        }
        // unbracketed IPv6
        n if n > 1 => Ok((address.to_string(), 0)),
        _ => Err(invalid()),
    }
}
