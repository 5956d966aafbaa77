//! AI goal coach: request validation and prompt assembly.
//!
//! The handler in `api::handlers::insights` owns authorization and streaming;
//! this module is pure apart from the [`TextGenerator`] seam.

mod generator;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

pub use generator::{Generation, OpenAiGenerator, SseDecoder, SseEvent, TextGenerator, TextStream};

pub const SYSTEM_PROMPT: &str = "You are a pragmatic, encouraging coach for goal achievement. \
You produce concise, structured guidance with clear next actions. \
Never shame the user. Avoid generic advice. Be specific to the goal data.";

pub const TEMPERATURE: f32 = 0.4;
pub const MAX_OUTPUT_TOKENS: u32 = 450;

const OUTPUT_FORMAT: &str = "\nOutput format:\n\
1) One-sentence diagnosis of momentum and risk\n\
2) 3 concrete actions for the next 7 days (bulleted)\n\
3) If behind schedule, propose an adjusted milestone plan (max 3 bullets)\n\
4) A short motivational line tied to the user's stated reason\n";

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoalInsightsRequest {
    pub goal: GoalPayload,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoalPayload {
    pub id: String,
    pub name: String,
    pub reason: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    pub progress: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "endDateISO")]
    pub end_date_iso: String,
    #[serde(rename = "lastUpdatedISO", default)]
    pub last_updated_iso: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub milestones: Vec<MilestonePayload>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestonePayload {
    pub id: String,
    pub name: String,
    #[serde(rename = "targetDateISO")]
    pub target_date_iso: String,
    pub completed: bool,
    pub weight: f64,
}

/// One validation failure, addressed by a dotted path into the payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, ToSchema)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Parse a request body, accepting the payload either bare or under `data`.
///
/// # Errors
///
/// Returns every issue found; shape errors from deserialization come back as
/// a single issue.
pub fn parse_request(body: &Value) -> Result<GoalInsightsRequest, Vec<Issue>> {
    let candidate = match body {
        Value::Object(map) if map.contains_key("data") => map.get("data").unwrap_or(&Value::Null),
        other => other,
    };
    let request: GoalInsightsRequest = serde_json::from_value(candidate.clone())
        .map_err(|err| vec![Issue::new(shape_error_path(candidate), err.to_string())])?;
    let issues = request.goal.validate();
    if issues.is_empty() {
        Ok(request)
    } else {
        Err(issues)
    }
}

fn shape_error_path(candidate: &Value) -> &'static str {
    if candidate.get("goal").is_some_and(Value::is_object) {
        "goal"
    } else {
        ""
    }
}

impl GoalPayload {
    #[must_use]
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (field, value) in [("id", &self.id), ("name", &self.name), ("reason", &self.reason)] {
            if value.is_empty() {
                issues.push(Issue::new(format!("goal.{field}"), "must not be empty"));
            }
        }
        if !(0.0..=100.0).contains(&self.progress) {
            issues.push(Issue::new("goal.progress", "must be between 0 and 100"));
        }
        if self.end_date_iso.is_empty() {
            issues.push(Issue::new("goal.endDateISO", "must not be empty"));
        } else if parse_date(&self.end_date_iso).is_none() {
            issues.push(Issue::new("goal.endDateISO", "must be a valid date"));
        }
        for (index, milestone) in self.milestones.iter().enumerate() {
            if !(0.0..=100.0).contains(&milestone.weight) {
                issues.push(Issue::new(
                    format!("goal.milestones.{index}.weight"),
                    "must be between 0 and 100",
                ));
            }
            if parse_date(&milestone.target_date_iso).is_none() {
                issues.push(Issue::new(
                    format!("goal.milestones.{index}.targetDateISO"),
                    "must be a valid date",
                ));
            }
        }
        issues
    }
}

/// RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
#[must_use]
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole days from `now` until `until`, rounded up.
#[must_use]
pub fn days_remaining(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    let millis = (until - now).num_milliseconds();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let days = (millis as f64 / MS_PER_DAY).ceil() as i64;
    days
}

fn day(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .take(10)
        .collect()
}

/// Assemble the coaching prompt for `goal` as of `now`.
#[must_use]
pub fn build_prompt(goal: &GoalPayload, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        format!("Goal: {}", goal.name),
        format!("Why it matters: {}", goal.reason),
        format!("Progress: {}%", goal.progress),
    ];
    match parse_date(&goal.end_date_iso) {
        Some(end) => lines.push(format!(
            "Due date: {} ({} days remaining)",
            day(end),
            days_remaining(now, end)
        )),
        None => lines.push(format!("Due date: {}", goal.end_date_iso)),
    }
    for (label, value) in [
        ("Category", &goal.category),
        ("Priority", &goal.priority),
        ("Status", &goal.status),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            lines.push(format!("{label}: {value}"));
        }
    }
    if let Some(tags) = goal.tags.as_ref().filter(|tags| !tags.is_empty()) {
        lines.push(format!("Tags: {}", tags.join(", ")));
    }

    let completed = goal.milestones.iter().filter(|m| m.completed).count();
    lines.push(format!(
        "Milestones completed: {completed}/{}",
        goal.milestones.len()
    ));

    let next = goal
        .milestones
        .iter()
        .filter(|m| !m.completed)
        .filter_map(|m| parse_date(&m.target_date_iso).map(|due| (due, m)))
        .min_by_key(|(due, _)| *due);
    lines.push(match next {
        Some((due, milestone)) => format!(
            "Next milestone: {} due {} (weight {}%)",
            milestone.name,
            day(due),
            milestone.weight
        ),
        None => "Next milestone: none".to_string(),
    });
    lines.push(OUTPUT_FORMAT.to_string());
    lines.join("\n")
}

/// The full generation request for `goal`.
#[must_use]
pub fn generation_for(goal: &GoalPayload, now: DateTime<Utc>) -> Generation {
    Generation {
        system: SYSTEM_PROMPT.to_string(),
        prompt: build_prompt(goal, now),
        temperature: TEMPERATURE,
        max_output_tokens: MAX_OUTPUT_TOKENS,
    }
}
