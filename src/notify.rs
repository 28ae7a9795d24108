//! Outbound email collaborator. Sends are best-effort: a failed or
//! unconfigured send is logged and never fails the request that triggered
//! it.

use serde::Serialize;
use std::env;

/// Template identifier plus its context, rendered to a subject and a plain
/// text body just before the send.
#[derive(Debug, Clone)]
pub enum EmailTemplate {
    VerificationCode {
        code: String,
    },
    DonationClaimedDonor {
        donor_name: String,
        recipient_name: String,
        item_name: String,
    },
    DonationClaimedRecipient {
        recipient_name: String,
        donor_name: String,
        item_name: String,
    },
    ActivityJoinedVolunteer {
        volunteer_name: String,
        activity_title: String,
    },
    ActivityJoinedOrganizer {
        organizer_name: String,
        volunteer_name: String,
        activity_title: String,
    },
    ContactMessage {
        subject: String,
        message: String,
        sender_name: String,
        sender_email: String,
    },
}

impl EmailTemplate {
    pub fn render(&self) -> (String, String) {
        match self {
            EmailTemplate::VerificationCode { code } => (
                "Your HopeBridge verification code".to_string(),
                format!(
                    "Your verification code is {}.\n\nIt expires in 10 minutes. \
                     If you did not request it, you can ignore this email.",
                    code
                ),
            ),
            EmailTemplate::DonationClaimedDonor {
                donor_name,
                recipient_name,
                item_name,
            } => (
                "Your donation has been claimed".to_string(),
                format!(
                    "Hi {},\n\n{} has claimed your donation \"{}\". \
                     Thank you for giving it a second life!",
                    donor_name, recipient_name, item_name
                ),
            ),
            EmailTemplate::DonationClaimedRecipient {
                recipient_name,
                donor_name,
                item_name,
            } => (
                "You have successfully claimed a donation".to_string(),
                format!(
                    "Hi {},\n\nYou claimed \"{}\" donated by {}. \
                     We'll let you know once it ships.",
                    recipient_name, item_name, donor_name
                ),
            ),
            EmailTemplate::ActivityJoinedVolunteer {
                volunteer_name,
                activity_title,
            } => (
                "You joined an activity".to_string(),
                format!(
                    "Hi {},\n\nYou're signed up for \"{}\". See you there!",
                    volunteer_name, activity_title
                ),
            ),
            EmailTemplate::ActivityJoinedOrganizer {
                organizer_name,
                volunteer_name,
                activity_title,
            } => (
                "A new volunteer joined your activity".to_string(),
                format!(
                    "Hi {},\n\n{} just joined \"{}\".",
                    organizer_name, volunteer_name, activity_title
                ),
            ),
            EmailTemplate::ContactMessage {
                subject,
                message,
                sender_name,
                sender_email,
            } => (
                if subject.is_empty() {
                    "New contact message".to_string()
                } else {
                    subject.clone()
                },
                format!(
                    "{}\n\n--- Sender Details ---\nName: {}\nReply-to: {}",
                    message, sender_name, sender_email
                ),
            ),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundEmail {
    sender: OutboundAddress,
    to: Vec<OutboundAddress>,
    subject: String,
    text_content: String,
}

/// HTTP transactional-mail API client. Without `MAILER_API_KEY` it runs
/// disabled and only logs what it would have sent.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from_email: String,
    from_name: Option<String>,
}

impl Mailer {
    pub fn from_env() -> Self {
        let api_key = env::var("MAILER_API_KEY").ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("MAILER_API_KEY not set; outbound email is disabled");
        }
        Mailer {
            http: reqwest::Client::new(),
            api_url: env::var("MAILER_API_URL")
                .unwrap_or_else(|_| "https://api.brevo.com/v3/smtp/email".to_string()),
            api_key,
            from_email: env::var("MAILER_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@hopebridge.org".to_string()),
            from_name: env::var("MAILER_FROM_NAME").ok(),
        }
    }

    pub fn admin_contact_email() -> String {
        env::var("ADMIN_CONTACT_EMAIL").unwrap_or_else(|_| "admin@hopebridge.org".to_string())
    }

    /// Fire-and-forget send; failures are logged, never propagated.
    pub async fn send(&self, to: &str, template: EmailTemplate) {
        let (subject, text) = template.render();

        let Some(api_key) = &self.api_key else {
            tracing::debug!("mailer disabled; skipping \"{}\" to {}", subject, to);
            return;
        };

        let body = OutboundEmail {
            sender: OutboundAddress {
                email: self.from_email.clone(),
                name: self.from_name.clone(),
            },
            to: vec![OutboundAddress {
                email: to.to_string(),
                name: None,
            }],
            subject: subject.clone(),
            text_content: text,
        };

        let result = self
            .http
            .post(&self.api_url)
            .header("api-key", api_key)
            .json(&body)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("sent \"{}\" to {}", subject, to);
            }
            Ok(resp) => {
                tracing::error!("mail send to {} returned {}", to, resp.status());
            }
            Err(e) => {
                tracing::error!("mail send to {} failed: {}", to, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EmailTemplate;

    #[test]
    fn verification_template_carries_the_code() {
        let (subject, body) = EmailTemplate::VerificationCode {
            code: "123456".to_string(),
        }
        .render();
        assert!(subject.contains("verification"));
        assert!(body.contains("123456"));
    }

    #[test]
    fn contact_template_falls_back_to_default_subject() {
        let (subject, body) = EmailTemplate::ContactMessage {
            subject: String::new(),
            message: "Hello there".to_string(),
            sender_name: "Dana".to_string(),
            sender_email: "dana@example.com".to_string(),
        }
        .render();
        assert_eq!(subject, "New contact message");
        assert!(body.contains("Hello there"));
        assert!(body.contains("dana@example.com"));
    }
}
