pub mod connection;
pub mod fetch_runs;
pub mod listings;
pub mod submissions;
pub mod submitters;

pub use connection::Database;
