// reqflow-api: transport executors, response envelope, and lifecycle sink

pub mod envelope;
pub mod error;
pub mod events;
pub mod executor;
pub mod request;
pub mod serde_ms;
pub mod transport;

pub use envelope::{Envelope, STATUS_NO_RESPONSE, is_success_status};
pub use error::{Error, RequestError};
pub use events::{EventSink, NoopSink, Progress, ProgressReport};
pub use executor::{BufferedExecutor, DEFAULT_CHUNK_SIZE, HttpExecutor, StreamingExecutor};
pub use request::{Payload, ResolvedRequest, TransportOptions};
pub use transport::{TlsMode, TransportConfig};
