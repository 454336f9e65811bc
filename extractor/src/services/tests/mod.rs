//! Tests for extractor runtime services
