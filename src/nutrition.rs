//! Third-party nutrition advice shortcut used by the tools variant.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const NUTRITION_API_HOST: &str = "ai-workout-planner-exercise-fitness-nutrition-guide.p.rapidapi.com";
pub const NUTRITION_TRIGGER: &str = "nutrition advice";

const NUTRITION_PATH: &str = "/nutritionAdvice";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// True when `message` asks for the nutrition shortcut instead of a run.
#[must_use]
pub fn is_nutrition_trigger(message: &str) -> bool {
    message.eq_ignore_ascii_case(NUTRITION_TRIGGER)
}

/// Fixed request body the endpoint is queried with.
#[must_use]
pub fn nutrition_request_body() -> Value {
    json!({
        "goal": "Lose weight",
        "dietary_restrictions": ["Vegetarian"],
        "current_weight": 80,
        "target_weight": 70,
        "daily_activity_level": "Moderate",
        "lang": "en"
    })
}

#[derive(Debug, Clone)]
pub struct NutritionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NutritionClient {
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(format!("https://{NUTRITION_API_HOST}"), api_key)
    }

    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Fetches advice; any failure becomes an `{"error": ...}` value.
    pub async fn advice(&self) -> Value {
        match self.fetch().await {
            Ok(result) => result,
            Err(message) => {
                warn!(%message, "nutrition advice request failed");
                json!({ "error": message })
            }
        }
    }

    async fn fetch(&self) -> Result<Value, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "RAPIDAPI_KEY is not set".to_string())?;

        let response = self
            .http
            .post(format!("{}{NUTRITION_PATH}", self.base_url))
            .query(&[("noqueue", "1")])
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", NUTRITION_API_HOST)
            .json(&nutrition_request_body())
            .send()
            .await
            .map_err(|error| error.to_string())?;
        let status = response.status();
        debug!(status = status.as_u16(), "nutrition advice response");

        let body = response.text().await.map_err(|error| error.to_string())?;
        let mut payload: Value = serde_json::from_str(&body).map_err(|error| error.to_string())?;
        match payload.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(format!("response ({status}) has no 'result' field")),
        }
    }
}

/// Pretty-printed reply text for an advice value.
#[must_use]
pub fn render_advice(advice: &Value) -> String {
    serde_json::to_string_pretty(advice).unwrap_or_else(|_| advice.to_string())
}
