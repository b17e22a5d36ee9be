//! HTTP layer: request/response envelopes, the transport seam and the
//! authenticated [`BoxSession`].

pub mod envelope;
pub mod session;
pub mod transport;

pub use envelope::{
    BodyStream, MultipartPart, RequestBody, RequestEnvelope, ResponseEnvelope, SeekableRead,
    TransportBody, TransportPart, TransportRequest,
};
pub use session::BoxSession;
pub use transport::{ReqwestTransport, Transport};
