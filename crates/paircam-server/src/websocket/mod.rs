//! WebSocket gateway: per-connection state, the connection table, and the
//! session loop that runs each upgraded socket.

pub mod connection;
pub mod session;
pub mod table;

pub use connection::RelayConnection;
pub use table::ConnectionTable;
