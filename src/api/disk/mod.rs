mod client;
mod list;
mod models;
mod operations;
mod resources;
mod task;
mod transfer;

pub(crate) use client::build_blocking_client;
pub use client::{ClientOptions, DiskClient, DEFAULT_API_TIMEOUT};
pub use list::{list_paged, MAX_PAGES, PAGE_SIZE};
pub use models::{OperationStatus, Progress, ResourceRecord, ResourceType, TransferOutcome};
pub use operations::{operation_id_from_href, OperationCallback, OperationHandle, PollPolicy};
pub use resources::AsyncOutcome;
pub use task::TaskHandle;
pub use transfer::{CompletionCallback, ProgressCallback, TransferCallbacks, TransferHandle};

pub const API_HOST: &str = "https://cloud-api.yandex.net";
