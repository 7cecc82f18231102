// Adapters layer: concrete implementations of the domain ports for external systems.

pub mod chrome;
pub mod smtp;
pub mod source;
pub mod storage;

pub use chrome::ChromeBackend;
pub use smtp::{SmtpMailTransport, SmtpSettings};
pub use source::{LocalFileSource, RemoteSheetSource};
pub use storage::FileLedgerStore;
