#![forbid(unsafe_code)]

//! `aulos-storage`
//!
//! Storage primitives of the elementary-stream pipeline:
//!
//! - [`PacketStorage`] — per-stream bounded FIFO of encoded packets with a
//!   running stored-duration estimate. The only cross-task data channel in
//!   the pipeline: producers push from the event side, the per-stream
//!   transfer task is the single consumer.
//! - [`StreamBuffer`] — per-stream buffer-level accountant deriving
//!   [`DataRequest`](aulos_core::DataRequest) hints for the producer.

mod error;
mod packet_storage;
mod stream_buffer;

pub use error::{StorageError, StorageResult};
pub use packet_storage::PacketStorage;
pub use stream_buffer::StreamBuffer;
