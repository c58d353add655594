use assistants_api::headers::{
    build_headers, ASSISTANTS_BETA, HEADER_AUTHORIZATION, HEADER_AZURE_API_KEY,
    HEADER_OPENAI_BETA, HEADER_USER_AGENT,
};
use assistants_api::{AssistantsApiConfig, AssistantsApiError};

#[test]
fn openai_headers_use_bearer_auth() {
    let headers = build_headers(&AssistantsApiConfig::openai(" sk-test ")).expect("headers");

    assert_eq!(
        headers.get(HEADER_AUTHORIZATION).map(String::as_str),
        Some("Bearer sk-test")
    );
    assert!(!headers.contains_key(HEADER_AZURE_API_KEY));
    assert_eq!(
        headers.get(HEADER_OPENAI_BETA).map(String::as_str),
        Some(ASSISTANTS_BETA)
    );
    assert!(headers
        .get(HEADER_USER_AGENT)
        .is_some_and(|ua| ua.starts_with("assistant-chat/")));
}

#[test]
fn azure_headers_use_api_key_header() {
    let config = AssistantsApiConfig::azure("https://res.openai.azure.com", "az-key", "2024-05-01");
    let headers = build_headers(&config).expect("headers");

    assert_eq!(
        headers.get(HEADER_AZURE_API_KEY).map(String::as_str),
        Some("az-key")
    );
    assert!(!headers.contains_key(HEADER_AUTHORIZATION));
}

#[test]
fn extra_headers_are_lowercased_and_user_agent_overridable() {
    let config = AssistantsApiConfig::openai("sk")
        .with_user_agent("custom-agent")
        .insert_header("X-Trace", " abc ");
    let headers = build_headers(&config).expect("headers");

    assert_eq!(headers.get("x-trace").map(String::as_str), Some("abc"));
    assert_eq!(
        headers.get(HEADER_USER_AGENT).map(String::as_str),
        Some("custom-agent")
    );
}

#[test]
fn missing_api_key_is_rejected() {
    let error = build_headers(&AssistantsApiConfig::openai("")).expect_err("empty key");
    assert!(matches!(error, AssistantsApiError::MissingApiKey));
}
