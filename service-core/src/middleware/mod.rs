pub mod metrics;
pub mod timing;
pub mod tracing;

pub use self::metrics::metrics_middleware;
pub use self::timing::{PROCESS_TIME_HEADER, process_time_middleware};
pub use self::tracing::{REQUEST_ID_HEADER, make_request_span, request_id_middleware};
