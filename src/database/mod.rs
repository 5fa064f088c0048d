// Database module
// SQLite holds both the relational records and the chunk vectors

pub mod sqlite;

pub use sqlite::*;
