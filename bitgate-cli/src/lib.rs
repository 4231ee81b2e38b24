//! Library half of the `bitgate` CLI: the JSON-file order store and the
//! notification HTTP endpoint, exposed so they can be tested without a binary.

pub mod orders;
pub mod server;

pub use orders::FileOrderStore;
