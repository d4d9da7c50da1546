//! Synchronous queries, run inside [`Database::transaction`](crate::store::Database::transaction).

pub mod clinicians;
pub mod patients;
pub mod samples;
pub mod sessions;
