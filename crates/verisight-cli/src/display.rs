//! Verdict card display.
//!
//! Renders a [`Report`] as a short human-readable card, or as JSON for
//! scripting. With `explain`, the card also lists the evidence and the
//! labels the model produced.

use verisight_ai::Basis;
use verisight_core::{Prediction, Verdict};

use crate::analyze::Report;

const MAX_LABELS: usize = 10;

// ── Public API ──

pub fn print_report(report: &Report, json: bool, explain: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render_card(report, explain));
    }
    Ok(())
}

// ── Rendering ──

fn render_card(report: &Report, explain: bool) -> String {
    let verdict = &report.assessment.verdict;
    let mut out = String::new();

    out.push_str(&format!("\n=== {} ===\n", headline(verdict)));
    out.push_str(&format!("  {}\n", verdict.summary()));
    out.push('\n');
    row(&mut out, "source", &report.source);
    row(
        &mut out,
        "confidence",
        &format!(
            "{} ({})",
            percent(verdict.confidence),
            verdict.band().as_str()
        ),
    );
    if verdict.display_confidence != verdict.confidence {
        row(
            &mut out,
            "display confidence",
            &percent(verdict.display_confidence),
        );
    }
    row(&mut out, "real score", &percent(verdict.details.real_score));
    row(&mut out, "ai score", &percent(verdict.details.ai_score));
    row(
        &mut out,
        "analyzed at",
        &report.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    if explain {
        out.push_str("\n--- Evidence ---\n");
        render_basis(&mut out, &report.assessment.basis);

        out.push_str("\n--- Labels ---\n");
        if report.labels.is_empty() {
            out.push_str("  (none)\n");
        }
        for p in report.labels.iter().take(MAX_LABELS) {
            row(&mut out, &p.label, &format!("{:.3}", p.score));
        }
        if report.labels.len() > MAX_LABELS {
            out.push_str(&format!(
                "  ... and {} more\n",
                report.labels.len() - MAX_LABELS
            ));
        }
    }
    out
}

fn render_basis(out: &mut String, basis: &Basis) {
    match basis {
        Basis::Keywords {
            ai_matches,
            real_matches,
            ai_keywords,
            real_keywords,
        } => {
            row(out, "stage", "keywords");
            row(out, "ai matches", &list(ai_matches));
            row(out, "ai keywords", &list(ai_keywords));
            row(out, "real matches", &list(real_matches));
            row(out, "real keywords", &list(real_keywords));
        }
        Basis::Rule { name, signals } => {
            row(out, "stage", "fallback");
            row(out, "rule", name);
            row(out, "top score", &format!("{:.3}", signals.top_score));
            row(out, "spread", &format!("{:.3}", signals.spread));
            row(out, "artificial markers", yes_no(signals.artificial_markers));
            row(out, "natural markers", yes_no(signals.natural_markers));
        }
        Basis::NoEvidence => row(out, "stage", "no evidence"),
    }
}

fn headline(verdict: &Verdict) -> &'static str {
    match verdict.prediction {
        Prediction::Real => "Real Image",
        Prediction::Ai => "AI-Generated Image",
    }
}

fn row(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("  {:<26} {}\n", name, value));
}

/// Whole percent, rounding halves up.
fn percent(v: f64) -> String {
    format!("{}%", (v * 100.0).round() as i64)
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}
