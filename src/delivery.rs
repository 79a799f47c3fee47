//! Sending finished reports.
//!
//! [`ReportMailer`] renders a record, composes the [`ReportEmail`] and hands
//! it to a [`MailTransport`]. [`handle_send_report`] wraps that flow with the
//! status semantics of the `send-report` endpoint, so any HTTP framework can
//! host it by forwarding the method and body.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{error, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::ReportBuilder;
use crate::email::{DeliveryRequest, ReportEmail};
use crate::error::ReportError;
use crate::record::ReportRecord;

pub const SMTP_HOST_ENV: &str = "SMTP_HOST";
pub const SMTP_PORT_ENV: &str = "SMTP_PORT";
pub const SMTP_SECURE_ENV: &str = "SMTP_SECURE";
pub const SMTP_USER_ENV: &str = "SMTP_USER";
/// Password of the relay account. Only the relay process reads it; it is
/// never loaded into [`MailSettings`] nor written to the outbox.
pub const SMTP_PASS_ENV: &str = "SMTP_PASS";
pub const SMTP_FROM_ENV: &str = "SMTP_FROM";

/// Invalid or incomplete mail configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {var} `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the external relay should submit spooled messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,
    /// Implicit TLS on connect.
    pub secure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Sender identity and, when `SMTP_HOST` is set, the relay to submit through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailSettings {
    pub from: String,
    pub relay: Option<RelaySettings>,
}

impl MailSettings {
    const DEFAULT_PORT: u16 = 465;

    /// Reads the `SMTP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// Only a sender is required (`SMTP_FROM`, falling back to `SMTP_USER`).
    /// Port and TLS flag are validated even without a host.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match value(SMTP_PORT_ENV) {
            Some(port) => port.parse::<u16>().map_err(|err| ConfigError::Invalid {
                var: SMTP_PORT_ENV,
                value: port.clone(),
                reason: err.to_string(),
            })?,
            None => Self::DEFAULT_PORT,
        };
        let secure = match value(SMTP_SECURE_ENV) {
            Some(secure) => parse_flag(&secure).ok_or_else(|| ConfigError::Invalid {
                var: SMTP_SECURE_ENV,
                value: secure.clone(),
                reason: "expected true or false".to_string(),
            })?,
            None => true,
        };
        let user = value(SMTP_USER_ENV);
        let from = value(SMTP_FROM_ENV)
            .or_else(|| user.clone())
            .ok_or(ConfigError::Missing(SMTP_FROM_ENV))?;
        let relay = value(SMTP_HOST_ENV).map(|host| RelaySettings {
            host,
            port,
            secure,
            user,
        });

        Ok(Self { from, relay })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Failure reported by a [`MailTransport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode message envelope: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Hands composed messages to a mail system.
pub trait MailTransport {
    /// Sends `email` once and returns the identifier given to the message.
    fn send(&self, email: &ReportEmail) -> Result<String, TransportError>;
}

/// Spools messages into a directory for an external relay.
///
/// Every message gets its own subdirectory holding `message.json` (the
/// envelope), `body.html` and an `attachments/` folder. When relay settings
/// are known they are copied into each envelope.
#[derive(Clone, Debug)]
pub struct OutboxTransport {
    directory: PathBuf,
    from: String,
    relay: Option<RelaySettings>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    id: &'a str,
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relay: Option<&'a RelaySettings>,
    subject: &'a str,
    body: &'static str,
    attachments: Vec<EnvelopeAttachment<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    size: usize,
}

impl OutboxTransport {
    const BODY_FILE: &'static str = "body.html";
    const ENVELOPE_FILE: &'static str = "message.json";
    const ATTACHMENTS_DIR: &'static str = "attachments";

    pub fn new(directory: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            from: from.into(),
            relay: None,
        }
    }

    /// An outbox sending as the configured sender through the configured relay.
    pub fn from_settings(directory: impl Into<PathBuf>, settings: &MailSettings) -> Self {
        Self::new(directory, settings.from.clone()).with_relay(settings.relay.clone())
    }

    pub fn with_relay(mut self, relay: Option<RelaySettings>) -> Self {
        self.relay = relay;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn write_file(path: PathBuf, contents: &[u8]) -> Result<(), TransportError> {
    fs::write(&path, contents).map_err(|source| TransportError::Io { path, source })
}

fn create_dir(path: &Path) -> Result<(), TransportError> {
    fs::create_dir_all(path).map_err(|source| TransportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Keeps a file name inside its directory.
fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "attachment".to_string(),
        rest => rest.to_string(),
    }
}

impl MailTransport for OutboxTransport {
    fn send(&self, email: &ReportEmail) -> Result<String, TransportError> {
        if email.to.trim().is_empty() {
            return Err(TransportError::Rejected("no recipients".to_string()));
        }

        let id = Uuid::new_v4().simple().to_string();
        let message_dir = self.directory.join(&id);
        let attachments_dir = message_dir.join(Self::ATTACHMENTS_DIR);
        create_dir(&attachments_dir)?;

        for attachment in &email.attachments {
            write_file(
                attachments_dir.join(safe_file_name(&attachment.filename)),
                &attachment.content,
            )?;
        }
        write_file(
            message_dir.join(Self::BODY_FILE),
            email.html_body.as_bytes(),
        )?;

        let envelope = Envelope {
            id: &id,
            from: &self.from,
            to: &email.to,
            cc: email.cc.as_deref(),
            relay: self.relay.as_ref(),
            subject: &email.subject,
            body: Self::BODY_FILE,
            attachments: email
                .attachments
                .iter()
                .map(|attachment| EnvelopeAttachment {
                    filename: &attachment.filename,
                    content_type: &attachment.content_type,
                    size: attachment.content.len(),
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&envelope)?;
        write_file(message_dir.join(Self::ENVELOPE_FILE), &json)?;

        info!(
            "Spooled '{}' for {} into {}",
            email.subject,
            email.to,
            message_dir.display()
        );
        Ok(id)
    }
}

/// Failure while delivering a report.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to build the report")]
    Build(#[from] ReportError),
    #[error("failed to send the report")]
    Transport(#[from] TransportError),
}

/// Renders reports and sends them through a transport.
#[derive(Clone, Debug)]
pub struct ReportMailer<T> {
    builder: ReportBuilder,
    transport: T,
}

impl<T: MailTransport> ReportMailer<T> {
    pub fn new(transport: T) -> Self {
        Self::with_builder(ReportBuilder::new(), transport)
    }

    pub fn with_builder(builder: ReportBuilder, transport: T) -> Self {
        Self { builder, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the PDF for `record` and sends it as requested. No retry is
    /// attempted; the first failure is returned.
    pub fn deliver(
        &self,
        record: &ReportRecord,
        request: &DeliveryRequest,
    ) -> Result<String, DeliveryError> {
        let report = self.builder.build(record)?;
        let email = ReportEmail::compose(record, request, &report.bytes);
        let id = self.transport.send(&email)?;
        info!(
            "Report {} sent to {} ({} attachment(s))",
            record.number_label(),
            email.to,
            email.attachments.len()
        );
        Ok(id)
    }
}

/// Body of a `send-report` request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendReportPayload {
    pub form_data: ReportRecord,
    pub email_data: DeliveryRequest,
}

/// HTTP method of an endpoint call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        })
    }
}

/// Status code and JSON body returned by the endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EndpointResponse {
    #[serde(skip)]
    pub status: u16,
    pub message: String,
}

impl EndpointResponse {
    pub const SENT: &'static str = "Reporte enviado correctamente";
    pub const FAILED: &'static str = "Error al enviar el reporte";
    pub const METHOD_NOT_ALLOWED: &'static str = "Method not allowed";

    fn new(status: u16, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    /// The `{"message": ...}` body.
    pub fn body(&self) -> String {
        serde_json::json!({ "message": self.message }).to_string()
    }
}

/// Handles one call of the `send-report` endpoint.
///
/// Only `POST` is accepted. Every failure after that, including a body that
/// does not parse, produces the same generic 500 response; the cause is
/// logged.
pub fn handle_send_report<T: MailTransport>(
    method: &Method,
    body: &[u8],
    mailer: &ReportMailer<T>,
) -> EndpointResponse {
    if *method != Method::Post {
        return EndpointResponse::new(405, EndpointResponse::METHOD_NOT_ALLOWED);
    }

    let result = serde_json::from_slice::<SendReportPayload>(body)
        .map_err(|err| err.to_string())
        .and_then(|payload| {
            mailer
                .deliver(&payload.form_data, &payload.email_data)
                .map_err(|err| error_chain(&err))
        });

    match result {
        Ok(_) => EndpointResponse::new(200, EndpointResponse::SENT),
        Err(cause) => {
            error!("Failed to process report: {}", cause);
            EndpointResponse::new(500, EndpointResponse::FAILED)
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
