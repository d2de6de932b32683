//! Inbound mail filtering and acknowledgement texts.

use crate::mail::MailboxMessage;
use helpdesk_proto::Category;
use std::fmt;

const SYSTEM_SUBJECTS: [&str; 5] = [
    "auto-reply",
    "out of office",
    "vacation",
    "delivery status",
    "read receipt",
];
const AUTOMATED_SENDERS: [&str; 3] = ["noreply", "no-reply", "donotreply"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FromSelf,
    Reply,
    SystemMessage,
    AutomatedSender,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::FromSelf => "sent by the support mailbox itself",
            SkipReason::Reply => "reply thread",
            SkipReason::SystemMessage => "system notification",
            SkipReason::AutomatedSender => "automated sender",
        })
    }
}

/// Decides which mailbox messages are worth a ticket.
#[derive(Debug, Clone)]
pub struct InboundFilter {
    own_address: String,
}

impl InboundFilter {
    pub fn new(own_address: impl Into<String>) -> Self {
        Self {
            own_address: own_address.into().to_lowercase(),
        }
    }

    pub fn should_skip(&self, message: &MailboxMessage) -> Option<SkipReason> {
        let from = message.sender_address().to_lowercase();
        let subject = message.subject.to_lowercase();

        if !self.own_address.is_empty() && from == self.own_address {
            return Some(SkipReason::FromSelf);
        }
        if subject.starts_with("re:") {
            return Some(SkipReason::Reply);
        }
        if SYSTEM_SUBJECTS.iter().any(|s| subject.contains(s)) {
            return Some(SkipReason::SystemMessage);
        }
        if AUTOMATED_SENDERS.iter().any(|s| from.contains(s)) {
            return Some(SkipReason::AutomatedSender);
        }
        None
    }
}

/// Acknowledgement sent to the customer once a ticket exists.
pub fn auto_reply(category: Category, product: &str) -> String {
    match category {
        Category::ApiError => format!(
            "Thank you for contacting {product} support. We've received your API issue and our team will investigate shortly. We'll update you within 2 hours."
        ),
        Category::RateLimit => "Thank you for your message. We understand you're experiencing rate limiting issues. Our team will review your account and get back to you soon.".to_string(),
        Category::Billing => "Thank you for your billing inquiry. We've received your request and will respond within 1 business day.".to_string(),
        Category::Integration => "Thank you for your integration question. Our technical team will review your request and provide detailed guidance.".to_string(),
        Category::Question | Category::Usage => format!(
            "Thank you for your question about {product}. We'll get back to you with a comprehensive answer shortly."
        ),
        Category::Bug => format!(
            "Thank you for reporting this problem with {product}. We've logged it and our team will investigate shortly."
        ),
        Category::FeatureRequest => format!(
            "Thank you for your suggestion for {product}. We've recorded your request and will share it with the product team."
        ),
        Category::Other => format!(
            "Thank you for contacting {product} support. We've received your message and will respond as soon as possible."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_proto::Sender;

    fn message(from: &str, subject: &str) -> MailboxMessage {
        MailboxMessage {
            id: "1".into(),
            subject: subject.into(),
            from: Some(Sender::new(from)),
            body: "body".into(),
            body_is_html: false,
            received_at: None,
        }
    }

    #[test]
    fn test_skip_rules() {
        let filter = InboundFilter::new("Support@Desk.io");
        let cases = [
            (message("support@desk.io", "hello"), Some(SkipReason::FromSelf)),
            (message("a@b.io", "RE: your ticket"), Some(SkipReason::Reply)),
            (message("a@b.io", "Out of Office until Monday"), Some(SkipReason::SystemMessage)),
            (message("a@b.io", "Delivery Status Notification"), Some(SkipReason::SystemMessage)),
            (message("no-reply@vendor.io", "Invoice"), Some(SkipReason::AutomatedSender)),
            (message("DoNotReply@bank.io", "Statement"), Some(SkipReason::AutomatedSender)),
            (message("a@b.io", "Scrape returns 500"), None),
        ];
        for (msg, expected) in cases {
            assert_eq!(filter.should_skip(&msg), expected, "{}", msg.subject);
        }
    }

    #[test]
    fn test_auto_reply_per_category() {
        assert!(auto_reply(Category::ApiError, "Scrapey").contains("within 2 hours"));
        assert!(auto_reply(Category::Billing, "Scrapey").contains("1 business day"));
        assert!(auto_reply(Category::Other, "Scrapey").starts_with("Thank you for contacting Scrapey support"));
        for c in [Category::Bug, Category::Usage, Category::FeatureRequest, Category::RateLimit] {
            assert!(!auto_reply(c, "Scrapey").is_empty());
        }
    }
}
