pub mod tracing;

pub use self::tracing::{REQUEST_ID_HEADER, RequestIdMakeSpan, request_id_middleware};
