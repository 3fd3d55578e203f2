//! Connection strings, managed connections and the thread-affine pool.

mod managed;
pub mod pool;
mod string;

pub use managed::{ConnectionError, ManagedConnection, ManagedTransaction, TransactionState};
pub use string::ConnectionStringBuilder;
