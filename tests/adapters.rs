//! Adapter integration tests.
//!
//! Tests for email provider adapters against mocked HTTP endpoints.

#[path = "adapters/resend_test.rs"]
mod resend_test;
#[path = "adapters/sendgrid_test.rs"]
mod sendgrid_test;
