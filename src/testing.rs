//! Testing utilities and assertion helpers.
//!
//! Convenience assertions over [`LocalProvider`] captures.
//!
//! # Example
//!
//! ```rust,ignore
//! use outbound::providers::LocalProvider;
//! use outbound::testing::*;
//!
//! #[tokio::test]
//! async fn teaser_flow() {
//!     let provider = LocalProvider::new();
//!
//!     // ... trigger sending ...
//!
//!     assert_message_sent(&provider);
//!     assert_message_to(&provider, "target@example.com");
//!     assert_subject_contains(&provider, "Teaser");
//! }
//! ```

use crate::providers::{CapturedMessage, LocalProvider};

/// Format captured messages for assertion failure output.
fn format_summary(messages: &[CapturedMessage]) -> String {
    if messages.is_empty() {
        return "  (no messages sent)".to_string();
    }

    messages
        .iter()
        .enumerate()
        .map(|(i, captured)| {
            let m = &captured.message;
            let to = m.to.as_ref().map(|a| a.email.as_str()).unwrap_or("<none>");
            let from = m.from.as_ref().map(|a| a.email.as_str()).unwrap_or("<none>");
            format!("  {}. To: {}, From: {}, Subject: \"{}\"", i + 1, to, from, m.subject)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assert that at least one message was sent.
pub fn assert_message_sent(provider: &LocalProvider) {
    assert!(
        provider.has_messages(),
        "Expected at least one message to be sent, but none were sent"
    );
}

/// Assert that no messages were sent.
pub fn assert_no_messages_sent(provider: &LocalProvider) {
    let messages = provider.messages();
    assert!(
        messages.is_empty(),
        "Expected no messages to be sent, but {} were sent.\n\nMessages sent:\n{}",
        messages.len(),
        format_summary(&messages)
    );
}

/// Assert that exactly N messages were sent.
pub fn assert_message_count(provider: &LocalProvider, expected: usize) {
    let actual = provider.message_count();
    assert!(
        actual == expected,
        "Expected {} message(s) to be sent, but {} were sent.\n\nMessages sent:\n{}",
        expected,
        actual,
        format_summary(&provider.messages())
    );
}

/// Assert that a message was sent to a specific address.
pub fn assert_message_to(provider: &LocalProvider, email: &str) {
    let messages = provider.messages();
    let found = messages.iter().any(|captured| {
        captured
            .message
            .to
            .as_ref()
            .map(|a| a.email.eq_ignore_ascii_case(email))
            .unwrap_or(false)
    });

    assert!(
        found,
        "Expected a message to be sent to '{}'.\n\nMessages sent:\n{}",
        email,
        format_summary(&messages)
    );
}

/// Assert that no message was sent to a specific address.
pub fn refute_message_to(provider: &LocalProvider, email: &str) {
    let messages = provider.messages();
    let found = messages.iter().any(|captured| {
        captured
            .message
            .to
            .as_ref()
            .map(|a| a.email.eq_ignore_ascii_case(email))
            .unwrap_or(false)
    });

    assert!(
        !found,
        "Expected no message to be sent to '{}', but one was.\n\nMessages sent:\n{}",
        email,
        format_summary(&messages)
    );
}

/// Assert that some sent message's subject contains a substring.
pub fn assert_subject_contains(provider: &LocalProvider, needle: &str) {
    let messages = provider.messages();
    let found = messages
        .iter()
        .any(|captured| captured.message.subject.contains(needle));

    assert!(
        found,
        "Expected a message with subject containing '{}'.\n\nMessages sent:\n{}",
        needle,
        format_summary(&messages)
    );
}

/// Assert that some sent message's HTML body contains a substring.
pub fn assert_html_contains(provider: &LocalProvider, needle: &str) {
    let messages = provider.messages();
    let found = messages.iter().any(|captured| {
        captured
            .message
            .html_body
            .as_ref()
            .map(|b| b.contains(needle))
            .unwrap_or(false)
    });

    assert!(
        found,
        "Expected a message with HTML body containing '{}'.\n\nMessages sent:\n{}",
        needle,
        format_summary(&messages)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;
    use crate::Provider;

    #[tokio::test]
    async fn assertions_pass_on_matching_capture() {
        let provider = LocalProvider::new();
        provider
            .send(
                &Message::new()
                    .from("deals@example.com")
                    .to("target@example.com")
                    .subject("Teaser: Project Andes")
                    .html_body("<p>Hola</p>"),
            )
            .await
            .unwrap();

        assert_message_sent(&provider);
        assert_message_count(&provider, 1);
        assert_message_to(&provider, "target@example.com");
        refute_message_to(&provider, "someone-else@example.com");
        assert_subject_contains(&provider, "Andes");
        assert_html_contains(&provider, "Hola");
    }

    #[test]
    fn no_messages_assertion() {
        let provider = LocalProvider::new();
        assert_no_messages_sent(&provider);
    }
}
