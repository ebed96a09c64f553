pub mod connection;
pub mod process;

pub use connection::{Connection, IpVersion, Protocol};
pub use process::ProcessRecord;
