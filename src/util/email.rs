use crate::config::{ConfigError, EmailConfig};
use crate::util::notifier::{Audience, Notification, NotificationError, Notifier, WorkflowEvent};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, error, info, instrument};

/// Email service errors
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SMTP error: {0}")]
    SmtpError(String),

    #[error("Message building error: {0}")]
    MessageError(String),

    #[error("Address error: {0}")]
    AddressError(String),
}

impl From<ConfigError> for EmailError {
    fn from(err: ConfigError) -> Self {
        EmailError::ConfigError(err.to_string())
    }
}

impl From<EmailError> for NotificationError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::AddressError(msg) => NotificationError::Rejected(msg),
            other => NotificationError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Delivers workflow notifications over SMTP. Customer-facing events go to
/// the estimate's contact address, staff-facing ones to the operations
/// mailbox when one is configured.
pub struct EmailNotifier {
    pub config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    #[instrument(skip(config), fields(host = %config.smtp_host, port = config.smtp_port))]
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        info!("Initializing SMTP email notifier");

        config.validate().map_err(EmailError::from)?;

        let mut transport_builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .timeout(Some(std::time::Duration::from_secs(config.connection_timeout_secs)));

        if config.use_tls {
            let tls_parameters = TlsParameters::new(config.smtp_host.clone())
                .map_err(|e| EmailError::ConfigError(format!("TLS configuration error: {}", e)))?;
            transport_builder = if config.use_starttls {
                transport_builder.tls(Tls::Required(tls_parameters))
            } else {
                transport_builder.tls(Tls::Wrapper(tls_parameters))
            };
        } else {
            transport_builder = transport_builder.tls(Tls::None);
        }

        if config.has_credentials() {
            let credentials = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
            transport_builder = transport_builder.credentials(credentials);
        }

        let transport = transport_builder.build();
        info!("SMTP email notifier initialized successfully");
        Ok(Self { config, transport })
    }

    /// Address the notification should be mailed to, if any.
    pub fn recipient(&self, notification: &Notification) -> Option<String> {
        match notification.event.audience() {
            Audience::Customer => Some(notification.customer_email.clone()),
            Audience::Operations => self.config.operations_email.clone(),
        }
    }

    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    pub async fn send_email(&self, message: EmailMessage) -> Result<(), EmailError> {
        validate_email_address(&message.to)?;
        let email_message = self.build_message(message)?;
        self.transport.send(email_message).await.map_err(|e| {
            error!("Failed to send email: {}", e);
            EmailError::SmtpError(format!("Failed to send email: {}", e))
        })?;
        info!("Email sent successfully");
        Ok(())
    }

    fn build_message(&self, email_message: EmailMessage) -> Result<Message, EmailError> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| EmailError::AddressError(format!("Invalid from address: {}", e)))?;
        let to_mailbox: Mailbox = email_message
            .to
            .parse()
            .map_err(|e| EmailError::AddressError(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&email_message.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email_message.text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email_message.html_body),
                    ),
            )
            .map_err(|e| EmailError::MessageError(format!("Failed to build multipart message: {}", e)))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        let Some(to) = self.recipient(notification) else {
            debug!(event = notification.event.name(), "No recipient configured, skipping email");
            return Ok(());
        };
        let message = render(notification, to);
        self.send_email(message).await.map_err(NotificationError::from)
    }
}

fn validate_email_address(email: &str) -> Result<(), EmailError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(EmailError::AddressError(format!("Invalid email format: {}", email)));
    }
    Ok(())
}

/// Subject line and one-paragraph summary of an event.
fn summary(notification: &Notification) -> (String, String) {
    let id = notification.estimate_id.to_hex();
    match &notification.event {
        WorkflowEvent::EstimateReceived => (
            "We received your estimate request".to_string(),
            format!("Your request {} has been received and will be reviewed by our team shortly.", id),
        ),
        WorkflowEvent::SupervisorAssigned { supervisor } => (
            format!("Estimate {} assigned", id),
            format!("Estimate {} was assigned to supervisor {}.", id, supervisor),
        ),
        WorkflowEvent::SentToFreelancers { freelancers } => (
            format!("Estimate {} sent to freelancers", id),
            format!("Estimate {} was sent to {} freelancer(s) for pricing.", id, freelancers.len()),
        ),
        WorkflowEvent::QuotationSubmitted { freelancer, quotation } => (
            format!("New quotation for estimate {}", id),
            format!("Freelancer {} submitted quotation {} for estimate {}.", freelancer, quotation, id),
        ),
        WorkflowEvent::QuotationsCollected => (
            format!("All quotations received for estimate {}", id),
            format!("Every freelancer has responded on estimate {}. The final quotation can now be prepared.", id),
        ),
        WorkflowEvent::FinalQuotationCreated { quotation } => (
            format!("Final quotation ready for approval ({})", id),
            format!("Final quotation {} for estimate {} is waiting for approval.", quotation, id),
        ),
        WorkflowEvent::SentToCustomer { grand_total, .. } => (
            "Your quotation is ready".to_string(),
            format!("Your quotation for request {} is ready. Total: {:.2}. Please review and respond.", id, grand_total),
        ),
        WorkflowEvent::CustomerResponded { status, reason } => (
            format!("Customer responded on estimate {}", id),
            match reason {
                Some(reason) => format!("The customer {:?} the quotation for estimate {}: {}", status, id, reason),
                None => format!("The customer {:?} the quotation for estimate {}.", status, id),
            }
            .to_lowercase(),
        ),
        WorkflowEvent::DealCreated { lead_id, application_id } => (
            format!("Deal created from estimate {}", id),
            match application_id {
                Some(app) => format!("Estimate {} converted into lead {} with mortgage application {}.", id, lead_id, app),
                None => format!("Estimate {} converted into lead {}.", id, lead_id),
            },
        ),
        WorkflowEvent::Cancelled { reason } => (
            "Your estimate request was cancelled".to_string(),
            match reason {
                Some(reason) => format!("Request {} was cancelled: {}", id, reason),
                None => format!("Request {} was cancelled.", id),
            },
        ),
    }
}

fn render(notification: &Notification, to: String) -> EmailMessage {
    let (subject, body) = summary(notification);
    let text_body = format!(
        "Hello {name},\n\n{body}\n\n---\nThis is an automated message. Please do not reply to this email.",
        name = notification.customer_name,
        body = body
    );
    let html_body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{subject}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto;">
    <p>Hello {name},</p>
    <p>{body}</p>
    <p style="font-size: 12px; color: #6c757d;">This is an automated message. Please do not reply to this email.</p>
</body>
</html>"#,
        subject = html_escape::encode_text(&subject),
        name = html_escape::encode_text(&notification.customer_name),
        body = html_escape::encode_text(&body)
    );
    EmailMessage {
        to,
        subject,
        text_body,
        html_body,
    }
}
