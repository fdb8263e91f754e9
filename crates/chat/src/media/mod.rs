/// Data URI encoding for durable image replay.
pub mod encode;
/// Lifecycle of revocable preview references.
pub mod preview;

pub use encode::{encode_data_uri, to_data_uri};
pub use preview::{PreviewRef, PreviewRegistry};
