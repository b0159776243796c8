pub mod connection;
pub mod entities;
pub mod schema;

pub use connection::*;
pub use entities::*;
pub use schema::create_tables;
