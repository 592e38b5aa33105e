pub mod reconcile;
pub mod upload;

pub use reconcile::ReconciliationService;
pub use upload::{IncomingFile, RetrievedFile, RetrievedStream, UploadService};
