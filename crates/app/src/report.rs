use anglicism_core::{normalize_word, ClassificationVerdict};
use clap::ValueEnum;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Markdown table.
    Table,
    /// Semicolon-separated values.
    Csv,
    Json,
}

/// Splits free text into candidate words on whitespace, commas and semicolons.
pub fn read_words(text: &str) -> Vec<String> {
    text.split(|ch: char| ch.is_whitespace() || ch == ',' || ch == ';')
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drops repeated words, keeping the first occurrence. Case and stress variants count as repeats.
pub fn dedup_words(words: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    words
        .into_iter()
        .filter(|word| {
            let key = normalize_word(word).unwrap_or_else(|| word.trim().to_string());
            seen.insert(key)
        })
        .collect()
}

pub fn render(
    verdicts: &[ClassificationVerdict],
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Table => Ok(render_table(verdicts)),
        ReportFormat::Csv => Ok(render_csv(verdicts)),
        ReportFormat::Json => serde_json::to_string_pretty(verdicts),
    }
}

fn render_table(verdicts: &[ClassificationVerdict]) -> String {
    let mut out = String::from("| word | verdict | confidence | replacement | evidence |\n");
    out.push_str("|---|---|---|---|---|\n");
    for verdict in verdicts {
        let row = row(verdict)
            .iter()
            .map(|cell| cell.replace('|', "\\|"))
            .collect::<Vec<_>>()
            .join(" | ");
        out.push_str(&format!("| {row} |\n"));
    }
    out
}

fn render_csv(verdicts: &[ClassificationVerdict]) -> String {
    let mut out = String::from("word;verdict;confidence;replacement;evidence\n");
    for verdict in verdicts {
        let row = row(verdict)
            .iter()
            .map(|cell| csv_field(cell))
            .collect::<Vec<_>>()
            .join(";");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

fn row(verdict: &ClassificationVerdict) -> [String; 5] {
    let evidence = verdict
        .evidence
        .iter()
        .map(|item| item.finding.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    [
        verdict.word.clone(),
        verdict.verdict.to_string(),
        verdict.confidence.to_string(),
        verdict.suggested_replacement.clone().unwrap_or_default(),
        evidence,
    ]
}

fn csv_field(value: &str) -> String {
    if value.contains([';', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anglicism_core::{Confidence, Evidence, SignalSource, Verdict};

    fn verdict(word: &str, kind: Verdict, findings: &[&str]) -> ClassificationVerdict {
        ClassificationVerdict {
            word: word.to_string(),
            normalized: word.to_lowercase(),
            verdict: kind,
            is_anglicism: Some(kind == Verdict::Anglicism),
            confidence: Confidence::High,
            evidence: findings
                .iter()
                .map(|finding| Evidence {
                    signal: SignalSource::Etymology,
                    finding: finding.to_string(),
                })
                .collect(),
            suggested_replacement: None,
        }
    }

    #[test]
    fn words_are_split_and_deduplicated_in_order() {
        let words = read_words("Скилл, дедлайн;скилл\nСки\u{301}лл  дом");
        assert_eq!(dedup_words(words), vec!["Скилл", "дедлайн", "дом"]);
    }

    #[test]
    fn csv_quotes_fields_with_separators() {
        let rows = [verdict(
            "креатив",
            Verdict::Anglicism,
            &["от англ. creative", "absent; twice"],
        )];
        let csv = render(&rows, ReportFormat::Csv).expect("csv renders");

        let line = csv.lines().nth(1).expect("data row");
        assert_eq!(
            line,
            "креатив;anglicism;high;;\"от англ. creative; absent; twice\""
        );
    }

    #[test]
    fn table_escapes_pipes() {
        let rows = [verdict("скилл", Verdict::Unknown, &["{{сэ|en|skill}}"])];
        let table = render(&rows, ReportFormat::Table).expect("table renders");

        assert!(table.starts_with("| word | verdict |"));
        assert!(table.contains("{{сэ\\|en\\|skill}}"));
    }

    #[test]
    fn json_keeps_input_order() {
        let rows = [
            verdict("б", Verdict::Unknown, &[]),
            verdict("а", Verdict::Native, &[]),
        ];
        let json = render(&rows, ReportFormat::Json).expect("json renders");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(parsed[0]["word"], "б");
        assert_eq!(parsed[1]["word"], "а");
    }
}
