// Human-readable diagnostic report over a metrics snapshot

use serde::Serialize;
use std::fmt::Write as _;

use super::types::MetricsSnapshot;

const LATENCY_CRITICAL_S: f64 = 5.0;
const LATENCY_WARNING_S: f64 = 3.0;
const ERROR_RATE_CRITICAL: f64 = 10.0;
const ERROR_RATE_WARNING: f64 = 5.0;
const PRECISION_CRITICAL: f64 = 0.60;
const PRECISION_WARNING: f64 = 0.80;
const RESOURCE_WARNING_PERCENT: f64 = 80.0;

const REPORT_ERRORS_SHOWN: usize = 5;
const REPORT_ERROR_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

impl Severity {
    fn label(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// One threshold check result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    pub recommendation: Option<String>,
}

impl Finding {
    fn new(severity: Severity, message: &str) -> Self {
        Self {
            severity,
            message: message.to_string(),
            recommendation: None,
        }
    }

    fn recommend(mut self, recommendation: &str) -> Self {
        self.recommendation = Some(recommendation.to_string());
        self
    }
}

/// Apply the fixed latency, error-rate, precision and resource thresholds
pub fn evaluate(snapshot: &MetricsSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    findings.push(if snapshot.avg_latency > LATENCY_CRITICAL_S {
        Finding::new(Severity::Critical, "High average latency (>5s)")
            .recommend("Reduce vector store lookups or the number of retrieved documents")
    } else if snapshot.avg_latency > LATENCY_WARNING_S {
        Finding::new(Severity::Warning, "Moderate average latency (>3s)")
            .recommend("Review tool efficiency")
    } else {
        Finding::new(Severity::Ok, "Latency within acceptable range (<3s)")
    });

    findings.push(if snapshot.error_rate > ERROR_RATE_CRITICAL {
        Finding::new(Severity::Critical, "High error rate (>10%)")
            .recommend("Review logs and exception handling")
    } else if snapshot.error_rate > ERROR_RATE_WARNING {
        Finding::new(Severity::Warning, "Moderate error rate (>5%)")
    } else {
        Finding::new(Severity::Ok, "Low error rate (<5%)")
    });

    findings.push(if snapshot.avg_precision < PRECISION_CRITICAL {
        Finding::new(Severity::Critical, "Low tool precision (<60%)")
            .recommend("Review the system prompt and tool selection")
    } else if snapshot.avg_precision < PRECISION_WARNING {
        Finding::new(Severity::Warning, "Moderate tool precision (<80%)")
    } else {
        Finding::new(Severity::Ok, "High tool precision (>80%)")
    });

    if snapshot.avg_cpu_percent > RESOURCE_WARNING_PERCENT {
        findings.push(Finding::new(Severity::Warning, "High CPU usage (>80%)"));
    }
    if snapshot.avg_memory_percent > RESOURCE_WARNING_PERCENT {
        findings.push(Finding::new(Severity::Warning, "High memory usage (>80%)"));
    }

    findings
}

/// Render the full text report. Does not touch aggregator state.
pub fn generate_report(snapshot: &MetricsSnapshot) -> String {
    let rule = "=".repeat(70);
    let thin = "-".repeat(70);
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "AGENT TELEMETRY ANALYSIS REPORT");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "Generated: {}\n",
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    let _ = writeln!(out, "1. GENERAL SUMMARY");
    let _ = writeln!(out, "{}", thin);
    let _ = writeln!(out, "Total requests: {}", snapshot.total_requests);
    let _ = writeln!(out, "Successful requests: {}", snapshot.successful_requests);
    let _ = writeln!(out, "Failed requests: {}", snapshot.failed_requests);
    let _ = writeln!(out, "Success rate: {:.2}%", snapshot.success_rate);
    let _ = writeln!(out, "Error rate: {:.2}%\n", snapshot.error_rate);

    let _ = writeln!(out, "2. PERFORMANCE");
    let _ = writeln!(out, "{}", thin);
    let _ = writeln!(out, "Average latency: {:.3}s", snapshot.avg_latency);
    let _ = writeln!(out, "P95 latency: {:.3}s", snapshot.p95_latency);
    let _ = writeln!(out, "P99 latency: {:.3}s", snapshot.p99_latency);
    let _ = writeln!(out, "Average precision: {:.2}%\n", snapshot.avg_precision * 100.0);

    let _ = writeln!(out, "3. RESOURCE USAGE");
    let _ = writeln!(out, "{}", thin);
    let _ = writeln!(out, "Average CPU: {:.2}%", snapshot.avg_cpu_percent);
    let _ = writeln!(out, "Average memory: {:.2}%\n", snapshot.avg_memory_percent);

    let _ = writeln!(out, "4. TOOL USAGE");
    let _ = writeln!(out, "{}", thin);
    let mut tools: Vec<(&String, &u64)> = snapshot.tool_usage.iter().collect();
    tools.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (tool, count) in tools {
        let share = if snapshot.total_tool_calls > 0 {
            *count as f64 / snapshot.total_tool_calls as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  • {}: {} calls ({:.1}%)", tool, count, share);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "5. FINDINGS");
    let _ = writeln!(out, "{}", thin);
    for finding in evaluate(snapshot) {
        let _ = writeln!(out, "[{}] {}", finding.severity.label(), finding.message);
        if let Some(recommendation) = &finding.recommendation {
            let _ = writeln!(out, "   Recommendation: {}", recommendation);
        }
    }
    let _ = writeln!(out);

    if !snapshot.recent_errors.is_empty() {
        let _ = writeln!(out, "6. RECENT ERRORS");
        let _ = writeln!(out, "{}", thin);
        let skip = snapshot.recent_errors.len().saturating_sub(REPORT_ERRORS_SHOWN);
        for (i, error) in snapshot.recent_errors.iter().skip(skip).enumerate() {
            let text: String = error.error.chars().take(REPORT_ERROR_CHARS).collect();
            let _ = writeln!(out, "{}. [{}]", i + 1, error.timestamp.to_rfc3339());
            let _ = writeln!(out, "   Error: {}", text);
            let _ = writeln!(out, "   Tools: {:?}", error.tools_used);
            let _ = writeln!(out);
        }
    }

    out.push_str(&rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::ErrorRecord;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: 10,
            successful_requests: 10,
            failed_requests: 0,
            success_rate: 100.0,
            error_rate: 0.0,
            avg_latency: 1.5,
            p95_latency: 2.0,
            p99_latency: 2.5,
            latency_history: vec![],
            avg_precision: 0.9,
            precision_history: vec![],
            tool_usage: BTreeMap::new(),
            total_tool_calls: 0,
            recent_errors: vec![],
            error_count: 0,
            avg_cpu_percent: 10.0,
            avg_memory_percent: 30.0,
            resource_usage: vec![],
            execution_traces: vec![],
            consistency_checks: 0,
            generated_at: Utc::now(),
        }
    }

    fn severities(snapshot: &MetricsSnapshot) -> Vec<Severity> {
        evaluate(snapshot).iter().map(|f| f.severity).collect()
    }

    #[test]
    fn test_healthy_snapshot_all_ok() {
        assert_eq!(
            severities(&snapshot()),
            vec![Severity::Ok, Severity::Ok, Severity::Ok]
        );
    }

    #[test]
    fn test_latency_thresholds() {
        let mut s = snapshot();
        s.avg_latency = 5.1;
        assert_eq!(evaluate(&s)[0].severity, Severity::Critical);
        assert!(evaluate(&s)[0].recommendation.is_some());

        s.avg_latency = 3.5;
        assert_eq!(evaluate(&s)[0].severity, Severity::Warning);

        // Boundaries are exclusive
        s.avg_latency = 3.0;
        assert_eq!(evaluate(&s)[0].severity, Severity::Ok);
    }

    #[test]
    fn test_error_rate_thresholds() {
        let mut s = snapshot();
        s.error_rate = 12.0;
        assert_eq!(evaluate(&s)[1].severity, Severity::Critical);
        s.error_rate = 7.5;
        assert_eq!(evaluate(&s)[1].severity, Severity::Warning);
        s.error_rate = 5.0;
        assert_eq!(evaluate(&s)[1].severity, Severity::Ok);
    }

    #[test]
    fn test_precision_thresholds() {
        let mut s = snapshot();
        s.avg_precision = 0.5;
        assert_eq!(evaluate(&s)[2].severity, Severity::Critical);
        s.avg_precision = 0.7;
        assert_eq!(evaluate(&s)[2].severity, Severity::Warning);
        s.avg_precision = 0.8;
        assert_eq!(evaluate(&s)[2].severity, Severity::Ok);
    }

    #[test]
    fn test_resource_warnings() {
        let mut s = snapshot();
        s.avg_cpu_percent = 85.0;
        s.avg_memory_percent = 90.0;
        let findings = evaluate(&s);
        assert_eq!(findings.len(), 5);
        assert!(findings[3].message.contains("CPU"));
        assert!(findings[4].message.contains("memory"));
    }

    #[test]
    fn test_tools_sorted_by_count() {
        let mut s = snapshot();
        s.tool_usage.insert("validate_diet".to_string(), 1);
        s.tool_usage.insert("search_products".to_string(), 3);
        s.total_tool_calls = 4;

        let report = generate_report(&s);
        let search = report.find("search_products: 3 calls (75.0%)").unwrap();
        let diet = report.find("validate_diet: 1 calls (25.0%)").unwrap();
        assert!(search < diet);
    }

    #[test]
    fn test_recent_errors_section() {
        let mut s = snapshot();
        assert!(!generate_report(&s).contains("RECENT ERRORS"));

        s.recent_errors = (0..8)
            .map(|i| ErrorRecord {
                timestamp: Utc::now(),
                error: format!("failure {} {}", i, "x".repeat(200)),
                tools_used: vec!["search_products".to_string()],
                request: "q".to_string(),
            })
            .collect();

        let report = generate_report(&s);
        assert!(report.contains("RECENT ERRORS"));
        assert!(!report.contains("failure 2 "));
        assert!(report.contains("failure 3 "));
        assert!(report.contains("failure 7 "));
        assert!(!report.contains(&"x".repeat(100)));
    }

    #[test]
    fn test_report_sections_present() {
        let report = generate_report(&snapshot());
        for section in ["GENERAL SUMMARY", "PERFORMANCE", "RESOURCE USAGE", "TOOL USAGE", "FINDINGS"] {
            assert!(report.contains(section), "missing {}", section);
        }
        assert!(report.contains("Success rate: 100.00%"));
        assert!(report.contains("Average precision: 90.00%"));
    }
}
