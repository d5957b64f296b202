pub mod codec;
pub mod error;
pub mod protocol;
pub mod types;

pub use codec::dump::{decode_dump, encode_dump, split_chunks, DumpDecode};
pub use error::{DecodeError, ValidationError};
pub use types::{ForwardingMethod, Scheduler, Server, ServerKey, Service, ServiceKey, ServiceType};
