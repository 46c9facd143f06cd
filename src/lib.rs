pub mod cli;
pub mod id;
pub mod protocol;
pub mod storage;

pub use cli::{AssignmentError, parse_assignments};
pub use id::{IdError, IdGenerator};
pub use protocol::{Client, ClientError, Dispatcher, Listener, ListenerConfig};
pub use storage::{Record, Store, Table};
