//! Stream Ingestion
//!
//! トランザクションストリームの取り込み層。レコード型、供給元、
//! スライディングウィンドウバッファを提供します。

pub mod record;
pub mod source;
pub mod window;

pub use record::TransactionRecord;
pub use source::{RecordSource, SyntheticRecordSource};
pub use window::{SlidingWindow, WindowSnapshot};
