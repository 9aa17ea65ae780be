//! Email service for order notifications.
//!
//! Uses SMTP via lettre for delivery with Askama templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{Order, User};

/// One rendered order line.
pub struct ConfirmationLine {
    pub name: String,
    pub details: Option<String>,
    pub quantity: i32,
    pub total: String,
}

/// HTML template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    username: &'a str,
    order_number: String,
    lines: &'a [ConfirmationLine],
    total: String,
    currency: &'a str,
    status: String,
    order_url: Option<String>,
}

/// Plain text template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    username: &'a str,
    order_number: String,
    lines: &'a [ConfirmationLine],
    total: String,
    currency: &'a str,
    status: String,
    order_url: Option<String>,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send the confirmation for a paid order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        user: &User,
        order: &Order,
        currency: &str,
        public_url: &str,
    ) -> Result<(), EmailError> {
        let (text, html) = render_order_confirmation(user, order, currency, public_url)?;
        let subject = format!("Your Order {} is Confirmed!", order.order_number);

        self.send_multipart_email(&user.email, &subject, &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Render the text and HTML bodies of an order confirmation.
fn render_order_confirmation(
    user: &User,
    order: &Order,
    currency: &str,
    public_url: &str,
) -> Result<(String, String), askama::Error> {
    let lines: Vec<ConfirmationLine> = order
        .items
        .iter()
        .map(|item| ConfirmationLine {
            name: item.product_name_snapshot.clone(),
            details: item.variant_details_snapshot.clone(),
            quantity: item.quantity,
            total: item.total_price_at_purchase.to_string(),
        })
        .collect();

    let order_url = (!public_url.is_empty())
        .then(|| format!("{}/orders/{}", public_url.trim_end_matches('/'), order.id));

    let text = OrderConfirmationText {
        username: &user.username,
        order_number: order.order_number.to_string(),
        lines: &lines,
        total: order.total_price.to_string(),
        currency,
        status: order.status.to_string(),
        order_url: order_url.clone(),
    }
    .render()?;

    let html = OrderConfirmationHtml {
        username: &user.username,
        order_number: order.order_number.to_string(),
        lines: &lines,
        total: order.total_price.to_string(),
        currency,
        status: order.status.to_string(),
        order_url,
    }
    .render()?;

    Ok((text, html))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::{
        CartId, Money, OrderId, OrderItemId, OrderNumber, OrderStatus, UserId, VariantId,
    };
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::OrderItem;

    fn order() -> Order {
        Order {
            id: OrderId::new(42),
            order_number: OrderNumber::from_uuid(Uuid::nil()),
            user_id: UserId::new(1),
            cart_id: CartId::new(1),
            status: OrderStatus::Paid,
            total_price: Money::from_cents(280_000),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(42),
                variant_id: Some(VariantId::new(5)),
                quantity: 2,
                unit_price_at_purchase: Money::from_cents(100_000),
                total_price_at_purchase: Money::from_cents(200_000),
                product_name_snapshot: "Trail <Runner>".to_owned(),
                variant_details_snapshot: Some("Size: 42".to_owned()),
            }],
            shipping_address: None,
        }
    }

    fn user() -> User {
        User {
            id: UserId::new(1),
            email: "ada@example.com".to_owned(),
            username: "ada".to_owned(),
        }
    }

    #[test]
    fn test_text_confirmation_lists_items() {
        let (text, _) =
            render_order_confirmation(&user(), &order(), "USD", "https://shop.example").unwrap();
        assert!(text.contains("Thank you for your purchase, ada!"));
        assert!(text.contains("00000000-0000-0000-0000-000000000000"));
        assert!(text.contains("Trail <Runner> (Size: 42) x 2: 2000.00"));
        assert!(text.contains("Total: 2800.00 USD"));
        assert!(text.contains("https://shop.example/orders/42"));
    }

    #[test]
    fn test_html_confirmation_escapes_names() {
        let (_, html) = render_order_confirmation(&user(), &order(), "USD", "").unwrap();
        assert!(html.contains("Trail &#60;Runner&#62;") || html.contains("Trail &lt;Runner&gt;"));
        assert!(!html.contains("View your order"));
    }
}
