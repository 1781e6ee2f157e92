use std::time::{Duration, Instant};

use tollgate::SecurityError;
use tollgate::security::{InputSanitizer, RateLimiter};

#[test]
fn sanitizer_normalizes_ordinary_text() {
    let sanitizer = InputSanitizer::default();
    assert_eq!(
        sanitizer.sanitize("hello\t\tworld  \r\nsecond line").unwrap(),
        "hello world\nsecond line"
    );
}

#[test]
fn sanitizer_rejects_suspicious_and_oversized_input() {
    let sanitizer = InputSanitizer::new(50);
    for (text, label) in [
        ("x' OR '1'='1", "sql_injection"),
        ("<script>alert(1)</script>", "script_tag"),
        ("please eval(payload)", "code_evaluation"),
        ("open ../../etc/passwd", "path_traversal"),
        ("go to javascript:alert(1)", "dangerous_uri"),
    ] {
        match sanitizer.sanitize(text) {
            Err(SecurityError::SuspiciousInput { pattern }) => assert_eq!(pattern, label),
            other => panic!("{text}: expected SuspiciousInput, got {other:?}"),
        }
    }

    assert!(matches!(
        sanitizer.sanitize(&"a".repeat(51)),
        Err(SecurityError::InputTooLong { length: 51, limit: 50 })
    ));
    assert!(matches!(sanitizer.sanitize(""), Err(SecurityError::EmptyInput)));
}

#[test]
fn limiter_window_slides() {
    let limiter = RateLimiter::new("search", 2, Duration::from_secs(10));
    let start = Instant::now();

    limiter.check_at(start).unwrap();
    limiter.check_at(start + Duration::from_secs(4)).unwrap();

    let error = limiter
        .check_at(start + Duration::from_secs(5))
        .unwrap_err();
    assert_eq!(error.retry_after(), Some(Duration::from_secs(5)));

    // The first call leaves the window at t=10
    limiter.check_at(start + Duration::from_secs(10)).unwrap();
    let status = limiter.status_at(start + Duration::from_secs(10));
    assert_eq!(status.calls, 2);
    assert_eq!(status.remaining, 0);
}

#[test]
fn limiter_reset_clears_the_window() {
    let limiter = RateLimiter::new("iterations", 1, Duration::from_secs(60));
    limiter.check().unwrap();
    assert!(limiter.check().is_err());
    limiter.reset();
    assert!(limiter.check().is_ok());
}
