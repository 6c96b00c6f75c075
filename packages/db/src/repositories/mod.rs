//! Repository implementations for the queue and result collections.

mod entry_repo;
mod result_repo;

pub use entry_repo::EntryRepository;
pub use result_repo::ResultRepository;
