//! The contact form on the landing page.

use crate::error::{Error, Result};
use async_trait::async_trait;
use clap::Args;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncStd1Executor, AsyncTransport, Message,
};
use serde::Deserialize;

/// SMTP options for delivering contact form messages.
///
/// Every option is optional so the site can run without mail configured; submitting the contact
/// form then fails with a server error.
#[derive(Clone, Debug, Default, Args)]
pub struct SmtpOptions {
    /// SMTP server host.
    #[clap(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP server port. Port 465 uses implicit TLS; any other port uses STARTTLS.
    #[clap(long, env = "SMTP_PORT", default_value = "587")]
    pub smtp_port: u16,

    /// SMTP user name.
    #[clap(long, env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP password.
    #[clap(long, env = "SMTP_PASS", hide_env_values = true)]
    pub smtp_pass: Option<String>,

    /// Sender address of contact form messages.
    #[clap(long, env = "CONTACT_FROM_EMAIL")]
    pub contact_from_email: Option<String>,

    /// Address contact form messages are delivered to.
    #[clap(long, env = "CONTACT_TO_EMAIL")]
    pub contact_to_email: Option<String>,
}

/// A contact form submission, as received.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// A validated contact form submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inquiry {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub details: String,
}

impl TryFrom<ContactRequest> for Inquiry {
    type Error = Error;

    fn try_from(req: ContactRequest) -> Result<Self> {
        let field = |value: Option<String>| {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        match (field(req.name), field(req.email), field(req.details)) {
            (Some(name), Some(email), Some(details)) => Ok(Self {
                name,
                email,
                phone: field(req.phone),
                details,
            }),
            _ => Err(Error::invalid("Faltan campos requeridos.")),
        }
    }
}

impl Inquiry {
    /// Subject line of the message sent to the studio.
    pub fn subject(&self) -> String {
        format!("Nueva consulta web - {}", self.name)
    }

    /// Plain text body of the message sent to the studio.
    pub fn text(&self) -> String {
        format!(
            "Nombre: {}\nEmail: {}\nTeléfono: {}\n\nMensaje:\n{}",
            self.name,
            self.email,
            self.phone.as_deref().unwrap_or("-"),
            self.details
        )
    }
}

/// Something that can deliver inquiries to the studio.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn deliver(&self, inquiry: &Inquiry) -> Result<()>;
}

/// Validate and deliver a contact form submission.
pub async fn submit<M: Mailer + ?Sized>(mailer: &M, req: ContactRequest) -> Result<()> {
    let inquiry = Inquiry::try_from(req)?;
    mailer.deliver(&inquiry).await?;
    tracing::info!(from = %inquiry.email, "delivered contact inquiry");
    Ok(())
}

/// Delivers inquiries over SMTP.
#[derive(Clone, Debug)]
pub struct SmtpMailer {
    options: SmtpOptions,
}

impl SmtpMailer {
    pub fn new(options: SmtpOptions) -> Self {
        Self { options }
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|err| Error::internal(format!("invalid address {address}: {err}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, inquiry: &Inquiry) -> Result<()> {
        let opt = &self.options;
        let (Some(host), Some(user), Some(pass), Some(from), Some(to)) = (
            &opt.smtp_host,
            &opt.smtp_user,
            &opt.smtp_pass,
            &opt.contact_from_email,
            &opt.contact_to_email,
        ) else {
            tracing::error!("contact form submitted but SMTP is not configured");
            return Err(Error::internal("Configuración SMTP incompleta."));
        };

        let reply_to = inquiry
            .email
            .parse::<Mailbox>()
            .map_err(|_| Error::invalid("El email ingresado no es válido."))?;
        let message = Message::builder()
            .from(mailbox(from)?)
            .to(mailbox(to)?)
            .reply_to(reply_to)
            .subject(inquiry.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(inquiry.text())
            .map_err(|err| Error::internal(err.to_string()))?;

        let builder = if opt.smtp_port == 465 {
            AsyncSmtpTransport::<AsyncStd1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<AsyncStd1Executor>::starttls_relay(host)
        }
        .map_err(|err| Error::internal(err.to_string()))?;
        let transport = builder
            .port(opt.smtp_port)
            .credentials(Credentials::new(user.clone(), pass.clone()))
            .build();

        transport.send(message).await.map_err(|err| {
            tracing::error!("cannot deliver contact inquiry: {err}");
            Error::internal(err.to_string())
        })?;
        Ok(())
    }
}

#[cfg(any(test, feature = "testing"))]
pub use mock::MockMailer;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use super::*;
    use async_std::sync::{Arc, Mutex};

    /// A mailer which records inquiries instead of sending them.
    #[derive(Clone, Debug, Default)]
    pub struct MockMailer {
        sent: Arc<Mutex<Vec<Inquiry>>>,
        unconfigured: bool,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        /// A mailer which behaves like an SMTP mailer with missing configuration.
        pub fn unconfigured() -> Self {
            Self {
                unconfigured: true,
                ..Default::default()
            }
        }

        /// Every inquiry delivered so far.
        pub async fn sent(&self) -> Vec<Inquiry> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn deliver(&self, inquiry: &Inquiry) -> Result<()> {
            if self.unconfigured {
                return Err(Error::internal("Configuración SMTP incompleta."));
            }
            self.sent.lock().await.push(inquiry.clone());
            Ok(())
        }
    }
}
