use std::fmt;

use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub mod suggestion;

pub use suggestion::FixSuggestion;

const LINE_BREAK: &str = "<br>";
const PARAGRAPH_BREAK: &str = "<br><br>";
const MAX_SCORE: u8 = 100;

/// Severity marker recognised inside analyzer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// All markers, in the order the automaton patterns are registered.
    pub const ALL: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Info];

    /// Literal token searched for in report text (case-sensitive).
    pub fn marker(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }

    /// Points subtracted from the base score per occurrence.
    pub fn penalty(self) -> u64 {
        match self {
            Self::Error => 10,
            Self::Warning => 5,
            Self::Info => 2,
        }
    }

    /// CSS colour used when highlighting the marker.
    pub fn color(self) -> &'static str {
        match self {
            Self::Error => "red",
            Self::Warning => "orange",
            Self::Info => "blue",
        }
    }
}

/// Occurrence counts of each severity marker in a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub errors: u64,
    pub warnings: u64,
    pub infos: u64,
}

impl SeverityCounts {
    fn record(&mut self, severity: Severity) {
        let slot = match severity {
            Severity::Error => &mut self.errors,
            Severity::Warning => &mut self.warnings,
            Severity::Info => &mut self.infos,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Error => self.errors,
            Severity::Warning => self.warnings,
            Severity::Info => self.infos,
        }
    }

    pub fn total(&self) -> u64 {
        self.errors
            .saturating_add(self.warnings)
            .saturating_add(self.infos)
    }

    /// Sum of per-marker penalties, saturating on pathological inputs.
    pub fn penalty(&self) -> u64 {
        Severity::ALL.iter().fold(0u64, |acc, severity| {
            acc.saturating_add(self.get(*severity).saturating_mul(severity.penalty()))
        })
    }
}

/// Heuristic risk score in `0..=100`; higher means fewer findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(u8);

impl RiskScore {
    pub const MAX: RiskScore = RiskScore(MAX_SCORE);

    pub fn from_counts(counts: &SeverityCounts) -> Self {
        let remaining = u64::from(MAX_SCORE).saturating_sub(counts.penalty());
        // remaining <= 100 so the narrowing is lossless
        Self(remaining as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn band(self) -> RiskBand {
        RiskBand::from_score(self)
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, MAX_SCORE)
    }
}

/// Qualitative bucket for a risk score, matching the score bar colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    const LOW_RISK_FLOOR: u8 = 80;
    const MEDIUM_RISK_FLOOR: u8 = 50;

    pub fn from_score(score: RiskScore) -> Self {
        if score.value() >= Self::LOW_RISK_FLOOR {
            Self::Low
        } else if score.value() >= Self::MEDIUM_RISK_FLOOR {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Bar colour shown next to the score.
    pub fn color(self) -> &'static str {
        match self {
            Self::Low => "green",
            Self::Medium => "orange",
            Self::High => "red",
        }
    }
}

/// One report line with its highlighted markup and optional fix suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedLine {
    pub text: String,
    pub markup: String,
    pub suggestion: Option<FixSuggestion>,
}

impl AnnotatedLine {
    fn to_html(&self) -> String {
        match self.suggestion {
            Some(suggestion) => format!(
                "{}{LINE_BREAK}<em>{}</em>",
                self.markup,
                suggestion.text()
            ),
            None => self.markup.clone(),
        }
    }
}

/// Output of [`Annotator::annotate`].
///
/// `plain_text` is recovered from `html` by turning line breaks into newlines
/// and dropping every other tag. Report text that already contains tag-like
/// sequences (`<...>`) does not survive that conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedReport {
    pub lines: Vec<AnnotatedLine>,
    pub html: String,
    pub plain_text: String,
}

impl AnnotatedReport {
    pub fn suggestions(&self) -> impl Iterator<Item = FixSuggestion> + '_ {
        self.lines.iter().filter_map(|line| line.suggestion)
    }
}

/// Scores analyzer output and decorates it with severity highlighting and fix hints.
#[derive(Debug, Clone)]
pub struct Annotator {
    markers: AhoCorasick,
    line_breaks: Regex,
    tags: Regex,
}

impl Annotator {
    pub fn new() -> Result<Self> {
        let markers = AhoCorasick::new(Severity::ALL.iter().map(|severity| severity.marker()))
            .context("failed to build severity marker automaton")?;
        let line_breaks =
            Regex::new(r"(?i)<br\s*/?>").context("failed to compile line break pattern")?;
        let tags = Regex::new(r"<[^>]+>").context("failed to compile markup tag pattern")?;
        Ok(Self {
            markers,
            line_breaks,
            tags,
        })
    }

    /// Count every marker occurrence, including ones embedded in longer words.
    pub fn count_markers(&self, report: &str) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for mat in self.markers.find_iter(report) {
            counts.record(Severity::ALL[mat.pattern().as_usize()]);
        }
        counts
    }

    pub fn compute_risk_score(&self, report: &str) -> RiskScore {
        let counts = self.count_markers(report);
        let score = RiskScore::from_counts(&counts);
        debug!(
            errors = counts.errors,
            warnings = counts.warnings,
            infos = counts.infos,
            score = score.value(),
            "computed risk score"
        );
        score
    }

    /// Wrap each marker in a bold span coloured by severity.
    pub fn highlight_line(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        self.markers
            .replace_all_with(line, &mut out, |mat, matched, dst| {
                let severity = Severity::ALL[mat.pattern().as_usize()];
                dst.push_str("<span style=\"color:");
                dst.push_str(severity.color());
                dst.push_str(";font-weight:bold\">");
                dst.push_str(matched);
                dst.push_str("</span>");
                true
            });
        out
    }

    #[instrument(name = "annotate_report", skip(self, report), fields(report_len = report.len()))]
    pub fn annotate(&self, report: &str) -> AnnotatedReport {
        let lines: Vec<AnnotatedLine> = report
            .split('\n')
            .map(|line| AnnotatedLine {
                text: line.to_string(),
                markup: self.highlight_line(line),
                suggestion: FixSuggestion::for_line(line),
            })
            .collect();

        let html = lines
            .iter()
            .map(AnnotatedLine::to_html)
            .collect::<Vec<_>>()
            .join(PARAGRAPH_BREAK);
        let plain_text = self.strip_markup(&html);

        debug!(
            lines = lines.len(),
            suggestions = lines.iter().filter(|l| l.suggestion.is_some()).count(),
            "annotated report"
        );
        AnnotatedReport {
            lines,
            html,
            plain_text,
        }
    }

    /// Best-effort markup removal: `<br>` becomes a newline, other tags vanish.
    pub fn strip_markup(&self, html: &str) -> String {
        let with_newlines = self.line_breaks.replace_all(html, "\n");
        self.tags.replace_all(&with_newlines, "").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn annotator() -> Annotator {
        Annotator::new().expect("annotator should build")
    }

    #[test]
    fn empty_report_scores_full_marks() {
        assert_eq!(annotator().compute_risk_score(""), RiskScore::MAX);
    }

    #[test]
    fn ten_errors_bottom_out_at_zero() {
        let report = "ERROR\n".repeat(10);
        assert_eq!(annotator().compute_risk_score(&report).value(), 0);
    }

    #[test]
    fn clamps_instead_of_going_negative() {
        let report = "ERROR WARNING ".repeat(50);
        assert_eq!(annotator().compute_risk_score(&report).value(), 0);
    }

    #[test]
    fn mixed_markers_use_weighted_penalties() {
        let report = "WARNING one\nWARNING two\nERROR three\nINFO a\nINFO b\nINFO c";
        let annotator = annotator();
        let counts = annotator.count_markers(report);
        assert_eq!(
            counts,
            SeverityCounts {
                errors: 1,
                warnings: 2,
                infos: 3
            }
        );
        assert_eq!(annotator.compute_risk_score(report).value(), 74);
    }

    #[test]
    fn markers_inside_words_are_counted() {
        let counts = annotator().count_markers("MISINFO and ERRORS and PERFORMANCE");
        assert_eq!(counts.infos, 1);
        assert_eq!(counts.errors, 1);
        assert_eq!(counts.warnings, 0);
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(
            annotator().compute_risk_score("error warning info Error"),
            RiskScore::MAX
        );
    }

    #[test]
    fn several_markers_on_one_line_count_independently() {
        let counts = annotator().count_markers("ERROR WARNING INFO ERROR");
        assert_eq!(counts.errors, 2);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn risk_band_boundaries() {
        assert_eq!(RiskScore(100).band(), RiskBand::Low);
        assert_eq!(RiskScore(80).band(), RiskBand::Low);
        assert_eq!(RiskScore(79).band(), RiskBand::Medium);
        assert_eq!(RiskScore(50).band(), RiskBand::Medium);
        assert_eq!(RiskScore(49).band(), RiskBand::High);
        assert_eq!(RiskScore(0).band(), RiskBand::High);
    }

    #[test]
    fn score_displays_out_of_hundred() {
        assert_eq!(RiskScore(74).to_string(), "74/100");
    }

    #[test]
    fn reentrancy_line_gets_single_suggestion_without_span() {
        let report = annotator().annotate("Reentrancy detected");
        let reentrancy = FixSuggestion::ReentrancyGuard.text();
        assert_eq!(report.html.matches(reentrancy).count(), 1);
        assert!(report.html.starts_with("Reentrancy detected<br><em>"));
        assert!(!report.html.contains("<span"));
        assert_eq!(report.plain_text, format!("Reentrancy detected\n{reentrancy}"));
    }

    #[test]
    fn highlights_error_and_warning_on_same_line() {
        let markup = annotator().highlight_line("ERROR then WARNING");
        assert_eq!(
            markup,
            "<span style=\"color:red;font-weight:bold\">ERROR</span> then \
             <span style=\"color:orange;font-weight:bold\">WARNING</span>"
        );
    }

    #[test]
    fn highlights_info_in_blue() {
        let markup = annotator().highlight_line("INFO: pragma");
        assert!(markup.starts_with("<span style=\"color:blue;font-weight:bold\">INFO</span>"));
    }

    #[test]
    fn lines_are_joined_with_paragraph_breaks() {
        let report = annotator().annotate("first\nsecond");
        assert_eq!(report.html, "first<br><br>second");
        assert_eq!(report.plain_text, "first\n\nsecond");
        assert_eq!(report.lines.len(), 2);
    }

    #[test]
    fn suggestion_only_appears_in_html_variant_of_line() {
        let report = annotator().annotate("integer overflow in mint()");
        let line = &report.lines[0];
        assert_eq!(line.suggestion, Some(FixSuggestion::CheckedArithmetic));
        assert_eq!(line.markup, "integer overflow in mint()");
        assert!(report.html.contains("<em>Suggestion: Use SafeMath"));
    }

    #[test]
    fn strip_markup_handles_self_closing_breaks() {
        let plain = annotator().strip_markup("a<br/>b<BR>c<em>d</em>");
        assert_eq!(plain, "a\nb\ncd");
    }

    #[test]
    fn tag_like_report_text_is_lost_in_plain_text() {
        let report = annotator().annotate("mapping(address => uint) <internal>");
        assert_eq!(report.plain_text, "mapping(address => uint) ");
    }

    proptest! {
        #[test]
        fn score_is_within_bounds(input in ".{0,400}") {
            let score = annotator().compute_risk_score(&input);
            prop_assert!(score.value() <= 100);
        }

        #[test]
        fn marker_free_text_scores_full(input in "[a-z0-9 \n]{0,200}") {
            prop_assert_eq!(annotator().compute_risk_score(&input), RiskScore::MAX);
        }

        #[test]
        fn adding_markers_never_raises_score(
            base in "[a-z \n]{0,80}",
            extra in proptest::collection::vec(0usize..3, 0..40),
        ) {
            let annotator = annotator();
            let mut report = base;
            let mut previous = annotator.compute_risk_score(&report);
            for idx in extra {
                report.push(' ');
                report.push_str(Severity::ALL[idx].marker());
                let next = annotator.compute_risk_score(&report);
                prop_assert!(next <= previous);
                previous = next;
            }
        }

        #[test]
        fn plain_text_recovers_input_lines(
            lines in proptest::collection::vec("[A-Za-z0-9 ,.()=:]{0,24}", 1..12),
        ) {
            let input = lines.join("\n");
            let report = annotator().annotate(&input);
            let recovered: Vec<&str> = report
                .plain_text
                .split("\n\n")
                .map(|segment| segment.split('\n').next().unwrap_or_default())
                .collect();
            prop_assert_eq!(recovered, lines.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
