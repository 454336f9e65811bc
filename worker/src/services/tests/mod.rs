//! Tests for worker services
//!
//! HTTP adapters are exercised against a local wiremock server.
