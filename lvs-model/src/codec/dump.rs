use crate::codec::service::is_server_line;
use crate::error::DecodeError;
use crate::types::Service;

/// Result of decoding a full rule dump. Chunks and lines that could not be
/// decoded are skipped and reported in `anomalies`.
#[derive(Debug, Default)]
pub struct DumpDecode {
    pub services: Vec<Service>,
    pub anomalies: Vec<DecodeError>,
}

/// Splits dump text into one chunk per service. Every line that does not
/// add a server opens a chunk; server lines join the chunk before them.
/// Server lines that precede any service line form their own chunk so the
/// decoder reports them instead of dropping them silently.
pub fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut open = false;

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let server_line = is_server_line(line);
        if open && server_line {
            if let Some(chunk) = chunks.last_mut() {
                chunk.push_str(line);
                chunk.push('\n');
            }
            continue;
        }
        open = !server_line;
        chunks.push(format!("{}\n", line));
    }
    chunks
}

/// Decodes the output of a numeric rule dump. Never fails as a whole.
pub fn decode_dump(text: &str) -> DumpDecode {
    let mut decoded = DumpDecode::default();
    for chunk in split_chunks(text) {
        match Service::decode_lenient(&chunk) {
            Ok((service, anomalies)) => {
                decoded.services.push(service);
                decoded.anomalies.extend(anomalies);
            }
            Err(err) => decoded.anomalies.push(err),
        }
    }
    decoded
}

/// Renders services in the bulk restore format.
pub fn encode_dump(services: &[Service]) -> String {
    services.iter().map(Service::to_text).collect()
}
