use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertmailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Roster file not found: {0}")]
    RosterNotFound(String),

    #[error("Base certificate not found: {0}")]
    BaseCertificateNotFound(String),

    #[error("Base certificate is not usable: {0}")]
    InvalidBaseCertificate(String),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP credentials missing: set SMTP_USERNAME and SMTP_PASSWORD")]
    MissingCredentials,
}

pub type Result<T> = std::result::Result<T, CertmailError>;
