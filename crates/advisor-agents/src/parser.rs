use std::collections::BTreeSet;
use std::str::FromStr;

use advisor_models::{BackendReply, Domain, DomainReport, Finding, ToolInvocation};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::AgentError;

/// Pull the first JSON object out of backend output.
///
/// Accepts a bare object, an object inside a markdown fence (with or without a
/// language tag), or an object preceded by free text.
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    let bare = trimmed.starts_with('{').then(|| trimmed.to_string());
    [bare, fenced_block(trimmed), first_balanced_object(trimmed)]
        .into_iter()
        .flatten()
        .find(|candidate| is_json_object(candidate))
        .ok_or_else(|| {
            AgentError::Parse(format!(
                "No valid JSON object found in response (length={})",
                text.len()
            ))
        })
}

fn is_json_object(candidate: &str) -> bool {
    serde_json::from_str::<Value>(candidate)
        .map(|v| v.is_object())
        .unwrap_or(false)
}

/// Body of the first ``` fence, skipping an optional language tag.
fn fenced_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let after_ticks = &text[open + 3..];
    let body_start = after_ticks.find('\n')? + 1;
    let body = &after_ticks[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim().to_string())
}

/// The first `{ ... }` span whose braces balance, ignoring braces inside strings.
fn first_balanced_object(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(text[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse raw backend output into a reply.
///
/// Protocol: `{"action": "invoke_tool", "tool": ..., "params": {...}}` or
/// `{"action": "final", "report": {...}}`. An object without `action` that
/// carries `findings` is taken as a final report.
pub fn parse_backend_reply(raw: &str) -> Result<BackendReply, AgentError> {
    let json_str = extract_json(raw)?;
    let value: Value = serde_json::from_str(&json_str)?;
    reply_from_value(value)
}

pub fn reply_from_value(mut value: Value) -> Result<BackendReply, AgentError> {
    match value.get("action").and_then(Value::as_str) {
        Some("invoke_tool") => {
            let tool = value
                .get("tool")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AgentError::Parse("invoke_tool reply without a tool name".into()))?
                .to_string();
            let params = match value.get_mut("params").map(Value::take) {
                None | Some(Value::Null) => serde_json::json!({}),
                Some(params) => params,
            };
            Ok(BackendReply::Invoke(ToolInvocation { tool, params }))
        }
        Some("final") => match value.get_mut("report").map(Value::take) {
            Some(report @ Value::Object(_)) => Ok(BackendReply::Final(report)),
            _ => Err(AgentError::Parse("final reply without a report object".into())),
        },
        Some(other) => Err(AgentError::Parse(format!("unknown reply action {other:?}"))),
        None if value.get("findings").is_some() => Ok(BackendReply::Final(value)),
        None => Err(AgentError::Parse("reply has no action".into())),
    }
}

/// Build a DomainReport from a backend's final answer.
///
/// `domain` and `tools_used` come from the worker, never from the backend.
pub fn parse_domain_report(
    domain: Domain,
    value: &Value,
    tools_used: BTreeSet<String>,
) -> Result<DomainReport, AgentError> {
    let findings: Vec<Finding> = match value.get("findings") {
        Some(raw) => serde_json::from_value(raw.clone())
            .map_err(|e| AgentError::Parse(format!("findings: {e}")))?,
        None => return Err(AgentError::Parse("Missing field: findings".into())),
    };

    let narrative = value
        .get("narrative")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AgentError::Parse("Missing field: narrative".into()))?
        .to_string();

    let confidence = match value.get("confidence") {
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
    .ok_or_else(|| AgentError::Parse("confidence must be a decimal number".into()))?;

    if confidence < Decimal::ZERO || confidence > Decimal::ONE {
        return Err(AgentError::Parse(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    Ok(DomainReport {
        domain,
        findings,
        narrative,
        confidence,
        tools_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_models::{Direction, Stance};
    use rust_decimal_macros::dec;

    #[test]
    fn extract_clean_json() {
        let input = r#"{"confidence": 0.75, "narrative": "test"}"#;
        assert_eq!(extract_json(input).unwrap(), input);
    }

    #[test]
    fn extract_from_markdown() {
        let input = "Here is my analysis:\n```json\n{\"confidence\": 0.75}\n```\nDone.";
        assert_eq!(extract_json(input).unwrap(), r#"{"confidence": 0.75}"#);
    }

    #[test]
    fn extract_from_markdown_no_lang() {
        let input = "Result:\n```\n{\"confidence\": 0.75}\n```";
        assert_eq!(extract_json(input).unwrap(), r#"{"confidence": 0.75}"#);
    }

    #[test]
    fn extract_with_prefix_text() {
        let input = "Based on the data:\n{\"action\": \"final\", \"report\": {}} trailing";
        let result = extract_json(input).unwrap();
        assert_eq!(result, r#"{"action": "final", "report": {}}"#);
    }

    #[test]
    fn extract_ignores_braces_in_strings() {
        let input = r#"note {"narrative": "range {low} to {high}", "confidence": 0.5}"#;
        let parsed: Value = serde_json::from_str(&extract_json(input).unwrap()).unwrap();
        assert_eq!(parsed["confidence"], 0.5);
    }

    #[test]
    fn extract_no_json() {
        assert!(extract_json("plain text, nothing structured").is_err());
        assert!(extract_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn parse_invoke_reply() {
        let raw = r#"```json
{"action": "invoke_tool", "tool": "get_price_history", "params": {"ticker": "TSLA"}}
```"#;
        let reply = parse_backend_reply(raw).unwrap();
        assert_eq!(
            reply,
            BackendReply::Invoke(ToolInvocation {
                tool: "get_price_history".to_string(),
                params: serde_json::json!({"ticker": "TSLA"}),
            })
        );
    }

    #[test]
    fn invoke_without_params_gets_empty_object() {
        let reply = parse_backend_reply(r#"{"action": "invoke_tool", "tool": "x"}"#).unwrap();
        match reply {
            BackendReply::Invoke(inv) => assert_eq!(inv.params, serde_json::json!({})),
            other => panic!("expected invoke, got {other:?}"),
        }
    }

    #[test]
    fn parse_final_reply_and_bare_report() {
        let wrapped = parse_backend_reply(
            r#"{"action": "final", "report": {"findings": [], "narrative": "n", "confidence": "0.5"}}"#,
        )
        .unwrap();
        let bare =
            parse_backend_reply(r#"{"findings": [], "narrative": "n", "confidence": "0.5"}"#)
                .unwrap();
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn reject_unknown_action() {
        assert!(parse_backend_reply(r#"{"action": "dance"}"#).is_err());
        assert!(parse_backend_reply(r#"{"action": "final"}"#).is_err());
        assert!(parse_backend_reply(r#"{"hello": "world"}"#).is_err());
    }

    #[test]
    fn parse_report_fills_domain_and_tools() {
        let value = serde_json::json!({
            "findings": [
                {"metric": "rsi", "observation": "RSI 28 (oversold)", "direction": "bullish", "value": 28.0},
                {"metric": "macd", "observation": "MACD bearish", "direction": "bearish"},
                {"metric": "trend", "observation": "uptrend", "direction": "bullish"}
            ],
            "narrative": "Momentum turning up.",
            "confidence": "0.72"
        });
        let tools: BTreeSet<String> = ["identify_patterns".to_string()].into();
        let report = parse_domain_report(Domain::Technical, &value, tools.clone()).unwrap();

        assert_eq!(report.domain, Domain::Technical);
        assert_eq!(report.confidence, dec!(0.72));
        assert_eq!(report.findings[0].direction, Direction::Bullish);
        assert_eq!(report.tools_used, tools);
        assert_eq!(report.signal(), Stance::Buy);
    }

    #[test]
    fn parse_report_accepts_numeric_confidence() {
        let value = serde_json::json!({"findings": [], "narrative": "flat", "confidence": 0.4});
        let report = parse_domain_report(Domain::Risk, &value, BTreeSet::new()).unwrap();
        assert_eq!(report.confidence, dec!(0.4));
    }

    #[test]
    fn parse_report_rejects_bad_input() {
        let out_of_range = serde_json::json!({"findings": [], "narrative": "n", "confidence": "1.2"});
        let missing_narrative = serde_json::json!({"findings": [], "confidence": "0.5"});
        let bad_direction = serde_json::json!({
            "findings": [{"metric": "m", "observation": "o", "direction": "sideways"}],
            "narrative": "n",
            "confidence": "0.5"
        });
        for value in [out_of_range, missing_narrative, bad_direction] {
            let err = parse_domain_report(Domain::Fundamental, &value, BTreeSet::new());
            assert!(matches!(err, Err(AgentError::Parse(_))), "{value}");
        }
    }
}
