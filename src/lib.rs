pub mod error;
pub mod checksum;
pub mod revision;
pub mod component;
pub mod header;
pub mod block;
pub mod naming;
pub mod record;
pub mod config;
pub mod product;
pub mod report;
pub mod io_stream;

pub use error::{EepromError, ChecksumRegion, Result};
pub use component::ComponentType;
pub use header::{ApiVersion, IdHeader, DataHeader};
pub use block::{Block, BlockPayload, BlockType, MacBlock, KeyValueBlock};
pub use record::{EepromRecord, PartialRecord, encode, decode, decode_header};
pub use config::ProductConfig;
pub use product::ProductArgs;
