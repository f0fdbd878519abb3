//! Console and JSON presentation of recommendations.

use std::fmt::Write;

use advisor_models::{Direction, Recommendation};

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Bullish => "bullish",
        Direction::Bearish => "bearish",
        Direction::Neutral => "neutral",
    }
}

/// Human-readable rendering of every field of a recommendation.
pub fn render_text(rec: &Recommendation) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_text(&mut out, rec);
    out
}

fn write_text(out: &mut String, rec: &Recommendation) -> std::fmt::Result {
    writeln!(out, "{} ({} analysis)", rec.ticker, rec.scope)?;
    writeln!(out, "Stance: {}", rec.overall_stance.as_str().to_uppercase())?;
    writeln!(
        out,
        "Decided: {} in {} ms",
        rec.decided_at.to_rfc3339(),
        rec.processing_time_ms
    )?;
    writeln!(out, "Recommendation: {} (request {})", rec.id, rec.request_id)?;

    for report in rec.domain_reports.values() {
        writeln!(out)?;
        writeln!(
            out,
            "[{}] signal {}, confidence {}",
            report.domain,
            report.signal(),
            report.confidence.normalize()
        )?;
        if !report.tools_used.is_empty() {
            let tools: Vec<&str> = report.tools_used.iter().map(String::as_str).collect();
            writeln!(out, "  tools: {}", tools.join(", "))?;
        }
        for finding in &report.findings {
            writeln!(
                out,
                "  - {}: {} ({})",
                finding.metric,
                finding.observation,
                direction_label(finding.direction)
            )?;
        }
        writeln!(out, "  {}", report.narrative)?;
    }

    if !rec.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in &rec.warnings {
            writeln!(out, "  - {}: {} ({})", warning.domain, warning.kind, warning.detail)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Rationale:")?;
    for line in rec.rationale.lines() {
        writeln!(out, "  {line}")?;
    }
    Ok(())
}

/// Serialize a recommendation as JSON.
pub fn render_json(rec: &Recommendation, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(rec)
    } else {
        serde_json::to_string(rec)
    }
}
