//! End-to-end runs of the triage pipeline over in-memory collaborators.

use helpdesk_core::testing::{RecordingMailer, RecordingTracker, ScriptedLlm, StaticMailbox};
use helpdesk_core::{
    Acknowledgement, MessageDisposition, SupportDesk, TicketComposer, TicketDraft,
};
use helpdesk_proto::{Category, CategoryProfile, Severity};
use std::sync::Arc;

const URGENT: &str = "I keep getting 500 errors and data loss when scraping, please help urgently";

#[tokio::test]
async fn urgent_report_without_model_is_critical_in_both_profiles() {
    for (profile, category) in [
        (CategoryProfile::Support, Category::Bug),
        (CategoryProfile::Api, Category::ApiError),
    ] {
        let desk = SupportDesk::new(profile);
        let record = desk.triage(URGENT).await;
        assert_eq!(record.category, category, "{profile}");
        assert_eq!(record.severity, Severity::Critical, "{profile}");
        assert!(record.needs_human);
        assert_eq!(record.summary, URGENT);
    }
}

#[tokio::test]
async fn model_category_outside_profile_falls_back_to_keywords() {
    let llm = ScriptedLlm::new().reply(
        r#"{"summary":"Scrape fails","category":"bug","severity":"urgent","needs_human":false,"suggested_reply":""}"#,
    );
    let desk = SupportDesk::new(CategoryProfile::Api).with_llm(Some(Arc::new(llm)));
    let record = desk.triage(URGENT).await;

    assert_eq!(record.summary, "Scrape fails");
    assert_eq!(record.category, Category::ApiError);
    assert_eq!(record.severity, Severity::Critical);
    assert!(!record.needs_human);
    assert!(!record.suggested_reply.is_empty());
}

#[tokio::test]
async fn malformed_model_output_still_files_a_ticket() {
    let tracker = Arc::new(RecordingTracker::new());
    let desk = SupportDesk::new(CategoryProfile::Support)
        .with_llm(Some(Arc::new(ScriptedLlm::new().reply("Sure! Here is my analysis."))))
        .with_tracker(tracker.clone());

    let draft = TicketDraft::new("Scraper", URGENT, "dev#9 (77)");
    let outcome = desk.open_ticket(&draft).await.unwrap();
    assert_eq!(outcome.issue.number, 1);

    let issue = &tracker.issues()[0];
    assert_eq!(issue.labels(), ["type/bug", "severity/critical", "ai-triaged"]);
    assert!(issue.body.contains("**Needs human:** Yes"));
}

#[tokio::test]
async fn composed_ticket_redacts_contact_details() {
    let record = SupportDesk::new(CategoryProfile::Support).triage(URGENT).await;
    let draft = TicketDraft::new(
        "Scraper",
        "contact me at ann@corp.io, see https://app.test/run?token=abc123",
        "ann",
    );
    let issue = TicketComposer::default().compose(&record, &draft);
    assert!(!issue.body.contains("ann@corp.io"));
    assert!(!issue.body.contains("abc123"));
}

#[tokio::test]
async fn mailbox_notification_flows_to_issue_and_acknowledgement() {
    let tracker = Arc::new(RecordingTracker::new());
    let mailer = Arc::new(RecordingMailer::new());
    let mailbox = StaticMailbox::new("support@desk.io").with_message(
        "AAMk-1",
        "ann@corp.io",
        "Scraper broken",
        URGENT,
    );
    let desk = SupportDesk::new(CategoryProfile::Api)
        .with_product("Scrapey", None)
        .with_tracker(tracker.clone())
        .with_mailer(mailer.clone())
        .with_mailbox(Arc::new(mailbox));

    let MessageDisposition::Processed(outcome) = desk.process_mailbox_message("AAMk-1").await.unwrap()
    else {
        panic!("message should be processed");
    };
    assert_eq!(outcome.record.category, Category::ApiError);
    assert_eq!(outcome.acknowledgement, Acknowledgement::Sent);
    assert_eq!(tracker.issues()[0].title, "[Email] Scraper broken");
    assert!(mailer.sent()[0].html_body.contains("within 2 hours"));

    assert_eq!(
        desk.process_mailbox_message("AAMk-1").await.unwrap(),
        MessageDisposition::Duplicate
    );
    assert_eq!(mailer.sent().len(), 1);
}
