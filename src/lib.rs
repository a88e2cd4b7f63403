//! Blocking client for the Yandex Disk REST API.
//!
//! ```no_run
//! use yandex_disk::DiskClient;
//!
//! # fn main() -> yandex_disk::Result<()> {
//! let client = DiskClient::new("AQAAAA...")?;
//! client.mkdir("app:/backups")?;
//! for record in client.ls_all("app:/")? {
//!     println!("{} {}", record.name, record.size);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Uploads, downloads and copy/move operations run on their own thread and
//! report through callbacks; the returned handles can be joined or dropped.

pub mod api;
pub mod error;
pub mod settings;

#[cfg(test)]
mod test_support;

pub use api::auth::{DeviceIdentity, OAuthClient, OAuthToken, Pkce};
pub use api::disk::{
    AsyncOutcome, ClientOptions, DiskClient, OperationStatus, Progress, ResourceRecord,
    ResourceType, TaskHandle, TransferCallbacks, TransferOutcome,
};
pub use error::{DiskError, Result};
pub use settings::{Config, ConfigKeys};
