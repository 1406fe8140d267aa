//! In-memory repositories owned exclusively by the Command Processor's
//! single-threaded context. Locks here only let concurrent *readers*
//! (query tools, the UI) in safely; every write happens on the processor
//! thread, so write contention never occurs in practice.

#![deny(missing_docs)]

pub mod message_repo;
pub mod process_repo;
pub mod queue_repo;
pub mod task_repo;

pub use message_repo::MessageRepository;
pub use process_repo::ProcessRepository;
pub use queue_repo::QueueRepository;
pub use task_repo::TaskRepository;
