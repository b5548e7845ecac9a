//! Background currency conversion.

pub mod handle;
pub mod protocol;
pub mod transform;

pub use handle::{Callback, WorkerHandle};
pub use protocol::{
    CorrelationToken, RequestKind, TransformFailure, TransformRequest, TransformResponse,
    TransformedData, WorkerMessage, WorkerReply,
};
