pub mod dispatcher;
pub mod ledger;
pub mod pipeline;
pub mod renderer;
pub mod roster;

pub use crate::domain::model::{CertificateArtifact, OutgoingMail, PageSetup, Participant};
pub use crate::domain::ports::{
    LedgerStore, MailTransport, ParticipantSource, PdfBackend, PdfEngine,
};
pub use crate::utils::error::Result;
