//! ferry-transfer — the transfer session layer.
//!
//! Builds the per-connection machinery on top of ferry-core: framed stream
//! I/O with timeouts, the sender and receiver state machines, the session
//! registry, the file store, and send-path fault injection.

pub mod fault;
pub mod receiver;
pub mod report;
pub mod sender;
pub mod session;
pub mod storage;
pub mod stream;

pub use fault::{FaultAction, FaultPlan};
pub use receiver::{ReceiverOutcome, ReceiverSession};
pub use report::{TransferReport, TransferStatus};
pub use sender::{SendOutcome, SenderSession, SenderState};
pub use session::{SessionMeta, SessionRegistry};
pub use storage::FileStore;
pub use stream::FrameStream;
