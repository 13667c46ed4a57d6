mod paradedb;

pub use paradedb::*;
