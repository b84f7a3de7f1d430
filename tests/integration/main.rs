//! Integration tests for the crawler
//!
//! `engine_tests` drive the engine over in-memory sites; `http_crawl_tests`
//! use wiremock to run the full HTTP stack end-to-end.

mod common;
mod engine_tests;
