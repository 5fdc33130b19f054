//! End-to-end tests driving the full router against a mock upstream.
