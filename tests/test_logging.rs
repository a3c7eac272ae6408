//! Tests for logging configuration parsing

use sprinkler_bridge::observability::logging::{apply_verbosity, init_logging, parse_level, LogFormat};
use tracing::Level;

#[test]
fn test_log_format_parsing() {
    let test_cases = vec![
        ("json", LogFormat::Json),
        ("JSON", LogFormat::Json),
        ("pretty", LogFormat::Pretty),
        ("Pretty", LogFormat::Pretty),
        ("compact", LogFormat::Compact),
        ("COMPACT", LogFormat::Compact),
        ("  json  ", LogFormat::Json),
    ];

    for (input, expected) in test_cases {
        assert_eq!(LogFormat::parse(input), expected, "Failed for input: {input}");
    }
}

#[test]
fn test_invalid_log_format_defaults_to_compact() {
    for input in ["invalid", "", "yaml", "full"] {
        assert_eq!(LogFormat::parse(input), LogFormat::Compact, "Failed for input: {input}");
    }
}

#[test]
fn test_log_level_parsing() {
    assert_eq!(parse_level("error"), Level::ERROR);
    assert_eq!(parse_level(" WARN "), Level::WARN);
    assert_eq!(parse_level("debug"), Level::DEBUG);
    assert_eq!(parse_level("verbose"), Level::INFO);
}

#[test]
fn test_verbosity_flags() {
    assert_eq!(apply_verbosity(Level::INFO, 0), Level::INFO);
    assert_eq!(apply_verbosity(Level::ERROR, 1), Level::DEBUG);
    assert_eq!(apply_verbosity(Level::ERROR, 2), Level::TRACE);
    assert_eq!(apply_verbosity(Level::DEBUG, 1), Level::DEBUG);
}

#[test]
fn test_span_macros_usable_after_init() {
    init_logging(Level::DEBUG, LogFormat::Json, true);

    let span = sprinkler_bridge::command_span!(topic = "rpi-sprinkler/relays/set", bytes = 42);
    let _guard = span.enter();
    tracing::info!("inside command span");
}
