use crate::config::ApiFlavor;

/// Default base URL for the public Assistants API.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Normalize a base URL to the API root for the given flavor.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_OPENAI_BASE_URL`] (OpenAI only)
/// 2) OpenAI: append `/v1` unless the path already ends with it
/// 3) Azure: append `/openai` unless the path already ends with it
pub fn normalize_base_url(input: &str, flavor: &ApiFlavor) -> String {
    let base = match (input.trim(), flavor) {
        ("", ApiFlavor::OpenAi) => DEFAULT_OPENAI_BASE_URL,
        (trimmed, _) => trimmed,
    };

    let trimmed = base.trim_end_matches('/');
    let suffix = match flavor {
        ApiFlavor::OpenAi => "/v1",
        ApiFlavor::Azure { .. } => "/openai",
    };
    if trimmed.ends_with(suffix) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{suffix}")
    }
}

/// Join a normalized API root with a resource path such as `threads/abc/runs`.
pub fn endpoint_url(base_url: &str, flavor: &ApiFlavor, path: &str) -> String {
    let root = normalize_base_url(base_url, flavor);
    format!("{root}/{}", path.trim_start_matches('/'))
}
