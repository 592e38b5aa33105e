//! Data models shared by the record store, the services and the HTTP layer.

mod reconcile;
mod upload;

pub use reconcile::{Inconsistency, StoredObject, SweepReport};
pub use upload::{NewUploadRecord, UploadRecord, UploadResponse};
