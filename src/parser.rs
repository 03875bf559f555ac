//! Extracts structured fields from the model's final free-form text.
//!
//! This is the fallback layer for backends that answer in prose: a fenced or
//! inline JSON payload is preferred when present, heuristic text scanning
//! covers the rest. Every extraction degrades to "field absent" rather than
//! failing the request.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::request::TaskType;
use crate::models::response::{Priority, RecommendedAction, Response, Timing};

lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```json\s*\n(.*?)\n```").unwrap();
    static ref ANY_FENCE: Regex = Regex::new(r"(?s)```\s*\n?(.*?)\n?```").unwrap();
    static ref NUMBERED_ITEM: Regex = Regex::new(r"^\s*\d+\.\s+(.+)$").unwrap();
    static ref BULLET_ITEM: Regex = Regex::new(r"^\s*[-*•]\s+(.+)$").unwrap();
    static ref HEADER_LIKE: Regex = Regex::new(r"^(#{2,}|[A-Z][A-Za-z\s]+:\s*$)").unwrap();
    static ref DOLLAR_AMOUNT: Regex = Regex::new(r"\$\s*[\d,]+(?:\.\d{2})?").unwrap();
    static ref PERCENTAGE: Regex = Regex::new(r"\d+(?:\.\d+)?\s*%").unwrap();
}

/// A risk extracted from an analysis answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub severity: Priority,
    pub mitigation: String,
}

/// An upside extracted from an analysis or strategy answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub opportunity: String,
    pub potential_value: String,
    pub action_required: String,
}

/// Extract a JSON payload from the answer text.
///
/// Tries, in order: a fenced block labelled json, any fenced block, and a
/// balanced-brace scan from the first `{`. Returns None on any parse failure.
pub fn extract_json_block(content: &str) -> Option<Value> {
    if let Some(captures) = JSON_FENCE.captures(content) {
        if let Ok(value) = serde_json::from_str(&captures[1]) {
            return Some(value);
        }
    }

    if let Some(captures) = ANY_FENCE.captures(content) {
        if let Ok(value) = serde_json::from_str(&captures[1]) {
            return Some(value);
        }
    }

    let start = content.find('{')?;
    let candidate = extract_balanced_json(content, start)?;
    serde_json::from_str(candidate).ok()
}

/// Scan for the `}` balancing the brace at `start`, skipping braces inside
/// quoted strings and honoring backslash escapes. Returns the candidate span
/// only if it parses as JSON.
fn extract_balanced_json(content: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (idx, ch) in content[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &content[start..start + idx + 1];
                    if serde_json::from_str::<Value>(candidate).is_ok() {
                        return Some(candidate);
                    }
                    return None;
                }
            }
            _ => {}
        }
    }

    None
}

fn normalize_confidence(value: f64) -> f32 {
    let value = if value <= 1.0 { value } else { value / 100.0 };
    value.clamp(0.0, 1.0) as f32
}

/// Extract a confidence score, normalized to 0.0..=1.0.
///
/// Prefers a numeric field in the extracted JSON, then percentage/decimal
/// patterns in the text, then qualitative language. None when no cue exists.
pub fn parse_confidence(content: &str, json_data: Option<&Value>) -> Option<f32> {
    if let Some(data) = json_data {
        for key in ["confidence", "confidence_score"] {
            if let Some(value) = data.get(key).and_then(Value::as_f64) {
                return Some(normalize_confidence(value));
            }
        }
    }

    lazy_static! {
        static ref NUMERIC_PATTERNS: Vec<Regex> = vec![
            Regex::new(r"(?i)confidence:?\s*(\d+(?:\.\d+)?)\s*%").unwrap(),
            Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*confidence").unwrap(),
            Regex::new(r"(?i)confidence(?:\s+score)?:?\s*=?\s*(\d+(?:\.\d+)?)").unwrap(),
        ];
        static ref QUALITATIVE: Vec<(Regex, f32)> = vec![
            (Regex::new(r"(?i)\b(?:very\s+)?high\s+confidence\b").unwrap(), 0.9),
            (Regex::new(r"(?i)\bmoderate\s+confidence\b").unwrap(), 0.7),
            (Regex::new(r"(?i)\bsome\s+confidence\b").unwrap(), 0.6),
            (Regex::new(r"(?i)\bvery\s+low\s+confidence\b").unwrap(), 0.3),
            (Regex::new(r"(?i)\blow\s+confidence\b").unwrap(), 0.4),
            (Regex::new(r"(?i)\bconfident\b").unwrap(), 0.8),
        ];
        static ref BARE_MENTION: Regex = Regex::new(r"(?i)\bconfidence\b").unwrap();
    }

    for pattern in NUMERIC_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(content) {
            if let Ok(value) = captures[1].parse::<f64>() {
                return Some(normalize_confidence(value));
            }
        }
    }

    for (pattern, score) in QUALITATIVE.iter() {
        if pattern.is_match(content) {
            return Some(*score);
        }
    }

    // The word appears but with no parseable strength: moderate default
    if BARE_MENTION.is_match(content) {
        return Some(0.7);
    }

    None
}

/// Collect the numbered or bulleted lines that follow `section_header`,
/// stopping at a blank line or the next header-like line. Numbered items win
/// over bullets when a section mixes both. Absent header yields an empty list.
pub fn extract_list_items(content: &str, section_header: &str) -> Vec<String> {
    let header_pattern = match Regex::new(&format!(
        r"(?i){}:?\s*\r?\n",
        regex::escape(section_header)
    )) {
        Ok(pattern) => pattern,
        Err(_) => return Vec::new(),
    };

    let Some(header) = header_pattern.find(content) else {
        return Vec::new();
    };
    let section = &content[header.end()..];

    let mut numbered: Vec<String> = Vec::new();
    let mut bullets: Vec<String> = Vec::new();
    let mut started = false;

    for line in section.lines() {
        if line.trim().is_empty() {
            if started {
                break;
            }
            continue;
        }
        if HEADER_LIKE.is_match(line) {
            break;
        }
        if let Some(captures) = NUMBERED_ITEM.captures(line) {
            numbered.push(captures[1].trim().to_string());
            started = true;
        } else if let Some(captures) = BULLET_ITEM.captures(line) {
            bullets.push(captures[1].trim().to_string());
            started = true;
        } else if started {
            // continuation of the previous item
            let last = if numbered.is_empty() {
                bullets.last_mut()
            } else {
                numbered.last_mut()
            };
            if let Some(last) = last {
                last.push(' ');
                last.push_str(line.trim());
            }
        }
    }

    if numbered.is_empty() {
        bullets
    } else {
        numbered
    }
}

/// Classify a single extracted action line by keyword presence
pub fn structure_action(action_text: &str) -> RecommendedAction {
    lazy_static! {
        static ref HIGH_PRIORITY: Regex =
            Regex::new(r"(?i)\b(critical|urgent|immediate|high\s+priority)\b").unwrap();
        static ref LOW_PRIORITY: Regex =
            Regex::new(r"(?i)\b(low\s+priority|optional|consider)\b").unwrap();
        static ref TIMING_IMMEDIATE: Regex =
            Regex::new(r"(?i)\b(immediately|immediate|now|asap|today|urgent)\b").unwrap();
        static ref TIMING_URGENT: Regex =
            Regex::new(r"(?i)\b(within\s+24|tomorrow|soon)\b").unwrap();
        static ref TIMING_LOW: Regex =
            Regex::new(r"(?i)\b(next\s+week|later|when\s+possible)\b").unwrap();
    }

    let priority = if HIGH_PRIORITY.is_match(action_text) {
        Priority::High
    } else if LOW_PRIORITY.is_match(action_text) {
        Priority::Low
    } else {
        Priority::Medium
    };

    let timing = if TIMING_IMMEDIATE.is_match(action_text) {
        Timing::Immediate
    } else if TIMING_URGENT.is_match(action_text) {
        Timing::Urgent
    } else if TIMING_LOW.is_match(action_text) {
        Timing::Low
    } else {
        Timing::Moderate
    };

    RecommendedAction {
        action: action_text.trim().to_string(),
        priority,
        timing,
    }
}

fn action_from_value(item: &Value) -> Option<RecommendedAction> {
    if let Ok(action) = serde_json::from_value::<RecommendedAction>(item.clone()) {
        return Some(action);
    }
    match item {
        Value::String(text) => Some(structure_action(text)),
        Value::Object(map) => map
            .get("action")
            .and_then(Value::as_str)
            .map(structure_action),
        _ => None,
    }
}

/// Extract recommended actions, preferring the JSON payload over text sections
pub fn parse_recommended_actions(
    content: &str,
    json_data: Option<&Value>,
) -> Vec<RecommendedAction> {
    if let Some(data) = json_data {
        for key in ["recommended_actions", "actions"] {
            if let Some(items) = data.get(key).and_then(Value::as_array) {
                return items.iter().filter_map(action_from_value).collect();
            }
        }
    }

    let section_headers = [
        "recommended actions",
        "next steps",
        "action items",
        "recommendations",
        "suggested actions",
    ];

    for header in section_headers {
        let items = extract_list_items(content, header);
        if !items.is_empty() {
            // use the first matching section
            return items.iter().map(|item| structure_action(item)).collect();
        }
    }

    Vec::new()
}

/// Classify a single extracted risk line
pub fn structure_risk(risk_text: &str) -> RiskFactor {
    lazy_static! {
        static ref HIGH_SEVERITY: Regex =
            Regex::new(r"(?i)\b(critical|severe|high\s+risk|major)\b").unwrap();
        static ref LOW_SEVERITY: Regex =
            Regex::new(r"(?i)\b(low\s+risk|minor|slight)\b").unwrap();
        static ref MITIGATION: Regex =
            Regex::new(r"(?is)(?:mitigation|solution):\s*(.*)$").unwrap();
    }

    let severity = if HIGH_SEVERITY.is_match(risk_text) {
        Priority::High
    } else if LOW_SEVERITY.is_match(risk_text) {
        Priority::Low
    } else {
        Priority::Medium
    };

    let mitigation = MITIGATION
        .captures(risk_text)
        .map(|captures| captures[1].trim().to_string())
        .unwrap_or_default();

    let factor = MITIGATION.replace(risk_text, "").trim().to_string();
    let factor = factor.trim_end_matches(['.', ';', '-', ' ']).to_string();

    RiskFactor {
        factor,
        severity,
        mitigation,
    }
}

fn risk_from_value(item: &Value) -> Option<RiskFactor> {
    if let Ok(risk) = serde_json::from_value::<RiskFactor>(item.clone()) {
        return Some(risk);
    }
    match item {
        Value::String(text) => Some(structure_risk(text)),
        Value::Object(map) => map.get("factor").and_then(Value::as_str).map(structure_risk),
        _ => None,
    }
}

pub fn parse_risk_factors(content: &str, json_data: Option<&Value>) -> Vec<RiskFactor> {
    if let Some(data) = json_data {
        for key in ["risk_factors", "risks"] {
            if let Some(items) = data.get(key).and_then(Value::as_array) {
                return items.iter().filter_map(risk_from_value).collect();
            }
        }
    }

    let section_headers = ["risk factors", "risks", "potential risks", "concerns", "challenges"];
    for header in section_headers {
        let items = extract_list_items(content, header);
        if !items.is_empty() {
            return items.iter().map(|item| structure_risk(item)).collect();
        }
    }

    Vec::new()
}

/// Classify a single extracted opportunity line, pulling out an explicit value
/// substring (currency, percentage, or qualitative marker) where present
pub fn structure_opportunity(opp_text: &str) -> Opportunity {
    lazy_static! {
        static ref HIGH_VALUE: Regex =
            Regex::new(r"(?i)\b(high|significant|major|substantial)\b").unwrap();
        static ref LOW_VALUE: Regex = Regex::new(r"(?i)\b(low|minimal|small)\b").unwrap();
        static ref ACTION: Regex =
            Regex::new(r"(?is)(?:action|next\s+step):\s*(.*)$").unwrap();
    }

    let potential_value = if let Some(amount) = DOLLAR_AMOUNT.find(opp_text) {
        amount.as_str().to_string()
    } else if let Some(pct) = PERCENTAGE.find(opp_text) {
        pct.as_str().to_string()
    } else if HIGH_VALUE.is_match(opp_text) {
        "high".to_string()
    } else if LOW_VALUE.is_match(opp_text) {
        "low".to_string()
    } else {
        "medium".to_string()
    };

    let action_required = ACTION
        .captures(opp_text)
        .map(|captures| captures[1].trim().to_string())
        .unwrap_or_default();

    let cleaned = ACTION.replace(opp_text, "");
    let cleaned = DOLLAR_AMOUNT.replace_all(&cleaned, "");
    let opportunity = cleaned
        .trim()
        .trim_end_matches(['.', ',', ';', '-', '(', ')', ' '])
        .to_string();

    Opportunity {
        opportunity,
        potential_value,
        action_required,
    }
}

fn opportunity_from_value(item: &Value) -> Option<Opportunity> {
    if let Ok(opportunity) = serde_json::from_value::<Opportunity>(item.clone()) {
        return Some(opportunity);
    }
    match item {
        Value::String(text) => Some(structure_opportunity(text)),
        Value::Object(map) => map
            .get("opportunity")
            .and_then(Value::as_str)
            .map(structure_opportunity),
        _ => None,
    }
}

pub fn parse_opportunities(content: &str, json_data: Option<&Value>) -> Vec<Opportunity> {
    if let Some(data) = json_data {
        if let Some(items) = data.get("opportunities").and_then(Value::as_array) {
            return items.iter().filter_map(opportunity_from_value).collect();
        }
    }

    let section_headers = [
        "opportunities",
        "growth opportunities",
        "upsell potential",
        "competitive advantages",
        "strategic opportunities",
    ];
    for header in section_headers {
        let items = extract_list_items(content, header);
        if !items.is_empty() {
            return items.iter().map(|item| structure_opportunity(item)).collect();
        }
    }

    Vec::new()
}

/// Extract A/B script variants from a script-generation answer
pub fn parse_script_variants(content: &str, json_data: Option<&Value>) -> Vec<Value> {
    if let Some(data) = json_data {
        if let Some(variants) = data.get("variants") {
            if let Some(list) = variants.as_array() {
                return list.clone();
            }
            if let Some(map) = variants.as_object() {
                return map
                    .iter()
                    .map(|(name, value)| match value {
                        Value::Object(fields) => {
                            let mut fields = fields.clone();
                            fields.insert("variant_name".to_string(), json!(name));
                            Value::Object(fields)
                        }
                        Value::String(text) => {
                            json!({"variant_name": name, "script_text": text})
                        }
                        other => json!({"variant_name": name, "script_text": other.to_string()}),
                    })
                    .collect();
            }
        }
        if let Some(scripts) = data.get("scripts") {
            return parse_script_variants(content, Some(&json!({"variants": scripts})));
        }
    }

    lazy_static! {
        static ref VARIANT_HEADER: Regex =
            Regex::new(r"(?im)^(?:Variant|Script|Option)\s+([A-Z0-9]+):\s*$").unwrap();
        static ref RATIONALE: Regex = Regex::new(r"(?is)rationale:?\s*(.*)$").unwrap();
    }

    let headers: Vec<_> = VARIANT_HEADER.captures_iter(content).collect();
    let mut variants = Vec::new();
    for (index, captures) in headers.iter().enumerate() {
        let body_start = captures.get(0).unwrap().end();
        let body_end = headers
            .get(index + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(content.len());
        let body = &content[body_start..body_end];

        let rationale = RATIONALE
            .captures(body)
            .map(|captures| {
                let text = &captures[1];
                text.split("\n\n").next().unwrap_or(text).trim().to_string()
            })
            .unwrap_or_default();
        let script_text = RATIONALE.replace(body, "").trim().to_string();

        variants.push(json!({
            "variant_name": captures[1].to_string(),
            "script_text": script_text,
            "rationale": rationale,
        }));
    }

    variants
}

/// Parse the final turn's text into a structured Response, with task-specific
/// metadata attached. Parse failures leave the corresponding field absent.
pub fn parse_response(content: &str, task_type: TaskType) -> Response {
    let json_data = extract_json_block(content);
    let mut response = Response::with_content(content);

    response.confidence = parse_confidence(content, json_data.as_ref());
    response.recommended_actions = parse_recommended_actions(content, json_data.as_ref());

    match task_type {
        TaskType::ScriptGeneration => {
            let variants = parse_script_variants(content, json_data.as_ref());
            response
                .metadata
                .insert("script_variants".to_string(), Value::Array(variants));
        }
        TaskType::LeadAnalysis => {
            let risks = parse_risk_factors(content, json_data.as_ref());
            let opportunities = parse_opportunities(content, json_data.as_ref());
            response.metadata.insert(
                "risk_factors".to_string(),
                serde_json::to_value(risks).unwrap_or_default(),
            );
            response.metadata.insert(
                "opportunities".to_string(),
                serde_json::to_value(opportunities).unwrap_or_default(),
            );
        }
        TaskType::InterventionStrategy | TaskType::ReportSynthesis => {
            let opportunities = parse_opportunities(content, json_data.as_ref());
            response.metadata.insert(
                "opportunities".to_string(),
                serde_json::to_value(opportunities).unwrap_or_default(),
            );
        }
        _ => {}
    }

    response
}
