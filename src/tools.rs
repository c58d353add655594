//! Local tools the remote run can call, and the dispatcher that runs them.

use std::ops::RangeInclusive;

use assistant_provider::{ToolCallRequest, ToolDefinition, ToolResult};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const WORKOUT_PLAN_TOOL: &str = "generate_workout_plan";
pub const NUTRITION_ADVICE_TOOL: &str = "nutrition_advice";

const WORKOUT_DAYS: RangeInclusive<i64> = 1..=31;
const DAILY_CALORIES: RangeInclusive<i64> = 500..=10_000;

const WORKOUT_ROTATION: [&str; 7] = [
    "Full-body strength, 45 minutes",
    "Cardio intervals, 30 minutes",
    "Upper-body strength, 40 minutes",
    "Active recovery: mobility and stretching, 30 minutes",
    "Lower-body strength, 40 minutes",
    "Core and balance circuit, 30 minutes",
    "Rest day: light walk",
];

/// A host-side function exposed to the assistant.
pub trait HostTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool. `Err` is reported to the run as an `{"error": ...}` payload.
    fn call(&self, arguments: &Value) -> Result<Value, String>;
}

/// Name-indexed set of host tools.
pub struct ToolTable {
    tools: Vec<Box<dyn HostTool>>,
}

impl ToolTable {
    #[must_use]
    pub fn new(tools: Vec<Box<dyn HostTool>>) -> Self {
        Self { tools }
    }

    /// The workout-plan and nutrition-advice tools.
    #[must_use]
    pub fn fitness() -> Self {
        Self::new(vec![Box::new(WorkoutPlanTool), Box::new(NutritionAdviceTool)])
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    fn find(&self, name: &str) -> Option<&dyn HostTool> {
        self.tools
            .iter()
            .find(|tool| tool.definition().name == name)
            .map(|tool| tool.as_ref())
    }

    /// Runs every requested call in order, producing one result per call.
    #[must_use]
    pub fn dispatch(&self, calls: &[ToolCallRequest]) -> Vec<ToolResult> {
        calls.iter().map(|call| self.dispatch_one(call)).collect()
    }

    fn dispatch_one(&self, call: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.find(&call.tool_name) else {
            warn!(tool = %call.tool_name, call_id = %call.call_id, "run requested unknown tool");
            return error_result(call, format!("unknown tool '{}'", call.tool_name));
        };

        let arguments = match call.parse_arguments() {
            Ok(arguments) => arguments,
            Err(error) => {
                warn!(tool = %call.tool_name, %error, "tool arguments are not valid JSON");
                return error_result(call, format!("invalid arguments: {error}"));
            }
        };

        match tool.call(&arguments) {
            Ok(content) => {
                debug!(tool = %call.tool_name, call_id = %call.call_id, "tool call succeeded");
                ToolResult::success(&call.call_id, &call.tool_name, content)
            }
            Err(message) => {
                debug!(tool = %call.tool_name, %message, "tool call returned an error payload");
                error_result(call, message)
            }
        }
    }
}

impl Default for ToolTable {
    fn default() -> Self {
        Self::fitness()
    }
}

fn error_result(call: &ToolCallRequest, message: String) -> ToolResult {
    ToolResult::error(&call.call_id, &call.tool_name, json!({ "error": message }))
}

/// Reads `key` as an integer from either a JSON number or a numeric string.
fn integer_argument(arguments: &Value, key: &str) -> Result<i64, String> {
    match arguments.get(key) {
        None | Some(Value::Null) => Err(format!("missing '{key}' argument")),
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("'{key}' must be a whole number, got '{raw}'")),
        Some(Value::Number(number)) => number
            .as_i64()
            .ok_or_else(|| format!("'{key}' must be a whole number, got {number}")),
        Some(other) => Err(format!("'{key}' must be a whole number, got {other}")),
    }
}

fn ranged_argument(
    arguments: &Value,
    key: &str,
    range: &RangeInclusive<i64>,
) -> Result<i64, String> {
    let value = integer_argument(arguments, key)?;
    if !range.contains(&value) {
        return Err(format!(
            "'{key}' must be between {} and {}, got {value}",
            range.start(),
            range.end()
        ));
    }
    Ok(value)
}

fn string_parameter_schema(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            name: { "type": "string", "description": description }
        },
        "required": [name]
    })
}

pub struct WorkoutPlanTool;

impl HostTool for WorkoutPlanTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: WORKOUT_PLAN_TOOL.to_string(),
            description: Some("Builds a day-by-day workout plan.".to_string()),
            input_schema: string_parameter_schema("days", "Number of days to plan, 1 to 31."),
        }
    }

    fn call(&self, arguments: &Value) -> Result<Value, String> {
        let days = ranged_argument(arguments, "days", &WORKOUT_DAYS)?;
        let plan: Vec<String> = WORKOUT_ROTATION
            .iter()
            .cycle()
            .take(days as usize)
            .enumerate()
            .map(|(index, session)| format!("Day {}: {session}", index + 1))
            .collect();

        let summary = if days == 1 {
            "A single full-body session to get started.".to_string()
        } else {
            format!(
                "A {days}-day plan rotating strength, cardio and recovery; repeat weekly and raise the load gradually."
            )
        };

        Ok(json!({ "workout_plan": plan, "summary": summary }))
    }
}

pub struct NutritionAdviceTool;

impl HostTool for NutritionAdviceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NUTRITION_ADVICE_TOOL.to_string(),
            description: Some("Gives macro targets and tips for a daily calorie budget.".to_string()),
            input_schema: string_parameter_schema(
                "calories",
                "Daily calorie target, 500 to 10000.",
            ),
        }
    }

    fn call(&self, arguments: &Value) -> Result<Value, String> {
        let calories = ranged_argument(arguments, "calories", &DAILY_CALORIES)?;
        // 30% protein, 40% carbohydrate, 30% fat.
        let protein_g = calories * 30 / 100 / 4;
        let carbs_g = calories * 40 / 100 / 4;
        let fat_g = calories * 30 / 100 / 9;
        let per_meal = calories / 3;

        let tips = vec![
            format!("Aim for about {protein_g} g of protein per day."),
            format!("Plan around {carbs_g} g of carbohydrates, mostly from whole grains and vegetables."),
            format!("Keep fat near {fat_g} g, favouring nuts, seeds and olive oil."),
            format!("Split the day into three meals of roughly {per_meal} kcal."),
            "Drink water with every meal and between workouts.".to_string(),
        ];

        Ok(json!({
            "nutrition_tips": tips,
            "summary": format!("{calories} kcal per day with a 30/40/30 protein/carb/fat split."),
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            call_id: "call_1".to_string(),
            tool_name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn integer_argument_accepts_strings_and_numbers() {
        assert_eq!(integer_argument(&json!({"days": "3"}), "days"), Ok(3));
        assert_eq!(integer_argument(&json!({"days": " 12 "}), "days"), Ok(12));
        assert_eq!(integer_argument(&json!({"days": 5}), "days"), Ok(5));
        assert!(integer_argument(&json!({"days": 2.5}), "days").is_err());
        assert!(integer_argument(&json!({"days": "abc"}), "days").is_err());
        assert!(integer_argument(&json!({"days": true}), "days").is_err());
        assert!(integer_argument(&json!({}), "days").is_err());
    }

    #[test]
    fn workout_plan_lists_one_entry_per_day_in_order() {
        let result = WorkoutPlanTool.call(&json!({"days": "3"})).expect("plan");

        let plan = result["workout_plan"].as_array().expect("plan array");
        assert_eq!(plan.len(), 3);
        assert!(plan[0].as_str().expect("day").starts_with("Day 1:"));
        assert!(plan[2].as_str().expect("day").starts_with("Day 3:"));
        assert!(result["summary"].as_str().is_some());
    }

    #[test]
    fn workout_plan_rotation_wraps_past_a_week() {
        let result = WorkoutPlanTool.call(&json!({"days": 9})).expect("plan");

        let plan = result["workout_plan"].as_array().expect("plan array");
        assert_eq!(plan.len(), 9);
        assert_eq!(plan[7], json!(format!("Day 8: {}", WORKOUT_ROTATION[0])));
    }

    #[test]
    fn out_of_range_days_is_an_error() {
        assert!(WorkoutPlanTool.call(&json!({"days": "0"})).is_err());
        assert!(WorkoutPlanTool.call(&json!({"days": 32})).is_err());
    }

    #[test]
    fn nutrition_advice_derives_macros_from_calories() {
        let result = NutritionAdviceTool
            .call(&json!({"calories": "2000"}))
            .expect("advice");

        let tips = result["nutrition_tips"].as_array().expect("tips");
        assert_eq!(tips[0], json!("Aim for about 150 g of protein per day."));
        assert!(result["summary"]
            .as_str()
            .expect("summary")
            .starts_with("2000 kcal"));
        assert!(NutritionAdviceTool.call(&json!({"calories": "100"})).is_err());
    }

    #[test]
    fn dispatch_reports_unknown_tools_as_error_results() {
        let results = ToolTable::fitness().dispatch(&[call("get_weather", "{}")]);

        assert_eq!(results.len(), 1);
        assert!(results[0].is_error);
        assert_eq!(results[0].call_id, "call_1");
        assert_eq!(
            results[0].content,
            json!({"error": "unknown tool 'get_weather'"})
        );
    }

    #[test]
    fn dispatch_turns_bad_arguments_into_error_payloads() {
        let table = ToolTable::fitness();

        let unparsable = table.dispatch(&[call(WORKOUT_PLAN_TOOL, "{days")]);
        assert!(unparsable[0].is_error);
        assert!(unparsable[0].content["error"]
            .as_str()
            .expect("message")
            .starts_with("invalid arguments"));

        let not_a_number = table.dispatch(&[call(WORKOUT_PLAN_TOOL, r#"{"days":"abc"}"#)]);
        assert!(not_a_number[0].is_error);
        assert!(not_a_number[0].content.get("error").is_some());
    }

    #[test]
    fn definitions_expose_both_tools_with_schemas() {
        let definitions = ToolTable::fitness().definitions();
        let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(names, vec![WORKOUT_PLAN_TOOL, NUTRITION_ADVICE_TOOL]);
        assert_eq!(definitions[0].input_schema["required"], json!(["days"]));
    }
}
