use crate::codec::hostport::split_host_port;
use crate::codec::tokens::{scan, Action, Flag};
use crate::error::DecodeError;
use crate::protocol::{DEFAULT_WEIGHT, LOWER_THRESHOLD, REAL_SERVER, UPPER_THRESHOLD, WEIGHT};
use crate::types::{ForwardingMethod, Server};

/// Server under construction while its flags are scanned
struct ServerDraft {
    server: Server,
    address: Option<Result<(String, u16), DecodeError>>,
}

fn real_server(draft: &mut ServerDraft, value: Option<&str>) {
    draft.address = value.map(split_host_port);
}

fn gatewaying(draft: &mut ServerDraft) {
    draft.server.forwarder = ForwardingMethod::Gateway;
}

fn ipip(draft: &mut ServerDraft) {
    draft.server.forwarder = ForwardingMethod::Ipip;
}

fn masquerading(draft: &mut ServerDraft) {
    draft.server.forwarder = ForwardingMethod::Masquerade;
}

fn weight(draft: &mut ServerDraft, value: Option<&str>) {
    draft.server.weight = value.and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_WEIGHT);
}

fn upper_threshold(draft: &mut ServerDraft, value: Option<&str>) {
    draft.server.upper_threshold = value.and_then(|v| v.parse().ok()).unwrap_or(0);
}

fn lower_threshold(draft: &mut ServerDraft, value: Option<&str>) {
    draft.server.lower_threshold = value.and_then(|v| v.parse().ok()).unwrap_or(0);
}

static SERVER_FLAGS: &[Flag<ServerDraft>] = &[
    Flag { spellings: &["-r", "--real-server"], action: Action::Value(real_server) },
    Flag { spellings: &["-g", "--gatewaying"], action: Action::Switch(gatewaying) },
    Flag { spellings: &["-i", "--ipip"], action: Action::Switch(ipip) },
    Flag { spellings: &["-m", "--masquerading"], action: Action::Switch(masquerading) },
    Flag { spellings: &["-w", "--weight"], action: Action::Value(weight) },
    Flag { spellings: &["-x", "--u-threshold"], action: Action::Value(upper_threshold) },
    Flag { spellings: &["-y", "--l-threshold"], action: Action::Value(lower_threshold) },
];

impl Server {
    /// Destination part of an add/edit command, in canonical order:
    /// address, forwarding flag, lower threshold, upper threshold, weight.
    /// Thresholds are only emitted when set; the weight always is, since 0
    /// is a meaningful value.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            REAL_SERVER.to_string(),
            self.host_port(),
            self.forwarder.flag().to_string(),
        ];
        if self.lower_threshold > 0 {
            args.push(LOWER_THRESHOLD.to_string());
            args.push(self.lower_threshold.to_string());
        }
        if self.upper_threshold > 0 {
            args.push(UPPER_THRESHOLD.to_string());
            args.push(self.upper_threshold.to_string());
        }
        args.push(WEIGHT.to_string());
        args.push(self.weight.to_string());
        args
    }

    pub fn to_line(&self) -> String {
        self.to_args().join(" ")
    }

    /// Decodes a whitespace separated server fragment or dump line.
    pub fn decode(text: &str) -> Result<Server, DecodeError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        Self::decode_tokens(&tokens)
    }

    pub fn decode_tokens(tokens: &[&str]) -> Result<Server, DecodeError> {
        let mut draft = ServerDraft {
            server: Server::default(),
            address: None,
        };
        scan(tokens, SERVER_FLAGS, &mut draft);

        let (host, port) = draft
            .address
            .ok_or_else(|| DecodeError::MissingAddress(tokens.join(" ")))??;
        draft.server.host = host;
        draft.server.port = port;
        Ok(draft.server)
    }
}
