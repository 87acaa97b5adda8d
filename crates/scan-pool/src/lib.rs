#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod backend;
pub mod dispatch;
pub mod normalize;
pub mod pool;

pub use adapter::{PollStatus, ScannerAdapter};
pub use backend::{BackendTier, ScannerBackend};
pub use dispatch::ScanDispatcher;
pub use normalize::ResultNormalizer;
pub use pool::ScannerPool;
