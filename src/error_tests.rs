use super::*;

#[test]
fn status_mapping() {
    assert!(matches!(ConsoleError::from_status(401, "expired", "Me"), ConsoleError::Auth { status: 401, .. }));
    assert!(matches!(ConsoleError::from_status(404, "File not found", "Scan"), ConsoleError::NotFound { .. }));
    assert!(matches!(ConsoleError::from_status(403, "nope", "Scan"), ConsoleError::Validation { status: Some(403), .. }));
    assert!(matches!(ConsoleError::from_status(409, "User already exists", "Create"), ConsoleError::Validation { status: Some(409), .. }));
    assert!(matches!(ConsoleError::from_status(502, "", "Decode"), ConsoleError::Server { status: 502, .. }));
}

#[test]
fn empty_body_falls_back_to_label() {
    let e = ConsoleError::from_status(500, "   ", "Decode");
    assert_eq!(e.message(), "Decode failed: 500");
    let e = ConsoleError::from_status(400, "{\"detail\":\"Invalid email\"}", "Create");
    assert_eq!(e.message(), "{\"detail\":\"Invalid email\"}");
}

#[test]
fn silent_variants() {
    assert!(ConsoleError::Cancelled.is_silent());
    assert!(ConsoleError::from_status(401, "", "Me").is_silent());
    assert!(!ConsoleError::invalid("port out of range").is_silent());
    assert!(!ConsoleError::network("connection refused").is_silent());
}

#[test]
fn serde_tagging() {
    let v = serde_json::to_value(ConsoleError::invalid_token("Scan token expired")).unwrap();
    assert_eq!(v["type"], "invalid_token");
    assert_eq!(v["message"], "Scan token expired");
    assert_eq!(ConsoleError::invalid_token("x").code_str(), "invalid_token");
    assert_eq!(ConsoleError::invalid_token("x").http_status(), Some(404));
}
