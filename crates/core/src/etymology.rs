//! Etymology lookups against the Russian Wiktionary API.
//!
//! The network shim ([`WiktionaryClient`]) only fetches page wikitext. Deciding
//! whether the text marks an English borrowing is done by [`EtymologyHeuristic`],
//! a pure function over already fetched text.
//!
//! English-origin markers, checked in order (first match wins):
//!
//! | marker | confidence |
//! |---|---|
//! | `{{сэ\|en\|<word>` template | high |
//! | `от англ.` / `от английского [слова] <word>` | high |
//! | `{{этимология:…\|en}}` template | medium |
//! | `из английского`, `заимств. из англ` | medium |
//! | bare `\|en\|` language tag | low |
//! | any `английск…` mention | low |
//! | page category `…английского происхождения` | low |
//!
//! Without an English marker, `праслав`, a `{{сэ|…}}` template for another
//! language or `от лат./франц./нем./греч./…` make the finding negative.

use crate::config::EngineConfig;
use crate::error::EtymologyLookupError;
use crate::models::Confidence;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

const SNIPPET_RADIUS: usize = 60;
const SNIPPET_MAX_CHARS: usize = 160;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EtymologySignal {
    Positive,
    Negative,
    Inconclusive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EtymologyFinding {
    pub signal: EtymologySignal,
    pub confidence: Confidence,
    pub marker: Option<String>,
    pub snippet: Option<String>,
    pub source_word: Option<String>,
}

impl EtymologyFinding {
    fn inconclusive(reason: &str) -> Self {
        Self {
            signal: EtymologySignal::Inconclusive,
            confidence: Confidence::None,
            marker: Some(reason.to_string()),
            snippet: None,
            source_word: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtymologyLookup {
    Found(EtymologyFinding),
    NotFound,
}

#[async_trait]
pub trait EtymologyClient: Send + Sync {
    async fn lookup_etymology(&self, word: &str) -> Result<EtymologyLookup, EtymologyLookupError>;
}

struct Marker {
    label: &'static str,
    pattern: Regex,
    confidence: Confidence,
}

impl Marker {
    fn new(label: &'static str, pattern: &str, confidence: Confidence) -> Result<Self, regex::Error> {
        Ok(Self {
            label,
            pattern: Regex::new(pattern)?,
            confidence,
        })
    }
}

pub struct EtymologyHeuristic {
    section_heading: Regex,
    next_heading: Regex,
    english: Vec<Marker>,
    english_category: Marker,
    other_origin: Vec<Marker>,
}

impl EtymologyHeuristic {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            section_heading: Regex::new(r"(?m)^=+\s*Этимология\s*=+\s*$")?,
            next_heading: Regex::new(r"(?m)^=")?,
            english: vec![
                Marker::new("template сэ|en", r"\{\{сэ\|en\|([^}|]+)", Confidence::High)?,
                Marker::new(
                    "от англ.",
                    r#"(?i)от\s+(?:английского|англ\.?)\s+(?:слова\s+)?[«"]?([\w'\-]+)"#,
                    Confidence::High,
                )?,
                Marker::new("template этимология|en", r"\{\{этимология:[^}]*\|en\}\}", Confidence::Medium)?,
                Marker::new(
                    "из английского",
                    r"(?i)(?:из\s+английского|заимств\.?\s+из\s+англ)",
                    Confidence::Medium,
                )?,
                Marker::new("language tag en", r"\|\s*en\s*\|", Confidence::Low)?,
                Marker::new("английск…", r"(?i)английск\w*", Confidence::Low)?,
            ],
            english_category: Marker::new(
                "category английского происхождения",
                r"(?i)английского\s+происхождения",
                Confidence::Low,
            )?,
            other_origin: vec![
                Marker::new("праслав.", r"(?i)праслав", Confidence::Medium)?,
                Marker::new(
                    "template сэ|other",
                    r"\{\{сэ\|(?:la|fr|de|el|grc|it|nl|pl|tr|ar|fa|sv|es|pt)\|",
                    Confidence::Medium,
                )?,
                Marker::new(
                    "от другого языка",
                    r"(?i)от\s+(?:лат|латинского|франц|фр|французского|нем|немецкого|греч|греческого|итал|голл|польск|тюрк)\.?",
                    Confidence::Medium,
                )?,
            ],
        })
    }

    /// The text after a `=== Этимология ===` heading up to the next heading.
    pub fn etymology_section<'a>(&self, wikitext: &'a str) -> Option<&'a str> {
        let heading = self.section_heading.find(wikitext)?;
        let rest = &wikitext[heading.end()..];
        let end = self
            .next_heading
            .find(rest)
            .map(|next| next.start())
            .unwrap_or(rest.len());
        let section = rest[..end].trim();
        if section.is_empty() {
            None
        } else {
            Some(section)
        }
    }

    pub fn assess(&self, wikitext: &str) -> EtymologyFinding {
        let section = self.etymology_section(wikitext);

        match section {
            Some(section) => {
                if let Some(found) = first_match(&self.english, section) {
                    return found.into_finding(EtymologySignal::Positive, section);
                }
                if let Some(found) = first_match(std::slice::from_ref(&self.english_category), wikitext) {
                    return found.into_finding(EtymologySignal::Positive, wikitext);
                }
                if let Some(found) = first_match(&self.other_origin, section) {
                    return found.into_finding(EtymologySignal::Negative, section);
                }
                EtymologyFinding::inconclusive("etymology section has no origin marker")
            }
            None => {
                // Without a section only explicit markers count; loose mentions of
                // English elsewhere on the page (translations, usage notes) do not.
                let explicit = self
                    .english
                    .iter()
                    .filter(|marker| marker.confidence >= Confidence::Medium)
                    .chain(std::iter::once(&self.english_category));
                for marker in explicit {
                    if let Some(found) = match_marker(marker, wikitext) {
                        return found.into_finding(EtymologySignal::Positive, wikitext);
                    }
                }
                EtymologyFinding::inconclusive("no etymology section")
            }
        }
    }
}

struct MarkerMatch<'m> {
    marker: &'m Marker,
    start: usize,
    end: usize,
    source_word: Option<String>,
}

impl MarkerMatch<'_> {
    fn into_finding(self, signal: EtymologySignal, text: &str) -> EtymologyFinding {
        EtymologyFinding {
            signal,
            confidence: self.marker.confidence,
            marker: Some(self.marker.label.to_string()),
            snippet: Some(snippet_around(text, self.start, self.end)),
            source_word: self.source_word,
        }
    }
}

fn first_match<'m>(markers: &'m [Marker], text: &str) -> Option<MarkerMatch<'m>> {
    markers.iter().find_map(|marker| match_marker(marker, text))
}

fn match_marker<'m>(marker: &'m Marker, text: &str) -> Option<MarkerMatch<'m>> {
    let captures = marker.pattern.captures(text)?;
    let whole = captures.get(0)?;
    Some(MarkerMatch {
        marker,
        start: whole.start(),
        end: whole.end(),
        source_word: captures
            .get(1)
            .map(|word| word.as_str().trim().to_string())
            .filter(|word| !word.is_empty()),
    })
}

fn snippet_around(text: &str, start: usize, end: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(SNIPPET_RADIUS.saturating_sub(1))
        .map(|(index, _)| index)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(SNIPPET_RADIUS)
        .map(|(index, _)| end + index)
        .unwrap_or(text.len());

    text[from..to]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_MAX_CHARS)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: BTreeMap<String, ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    missing: Option<serde_json::Value>,
    #[serde(default)]
    invalid: Option<serde_json::Value>,
    #[serde(default)]
    revisions: Vec<ApiRevision>,
}

#[derive(Debug, Deserialize)]
struct ApiRevision {
    #[serde(default)]
    slots: Option<ApiSlots>,
    #[serde(default, rename = "*")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSlots {
    main: ApiSlot,
}

#[derive(Debug, Deserialize)]
struct ApiSlot {
    #[serde(default, rename = "*")]
    content: Option<String>,
}

/// Page wikitext from a MediaWiki `prop=revisions` response; `None` for a missing page.
pub fn parse_api_response(body: &str) -> Result<Option<String>, EtymologyLookupError> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|error| EtymologyLookupError::Parse(error.to_string()))?;
    let query = response
        .query
        .ok_or_else(|| EtymologyLookupError::Parse("response has no query object".to_string()))?;
    let page = query
        .pages
        .into_values()
        .next()
        .ok_or_else(|| EtymologyLookupError::Parse("response lists no pages".to_string()))?;

    if page.missing.is_some() || page.invalid.is_some() {
        return Ok(None);
    }

    page.revisions
        .into_iter()
        .next()
        .and_then(|revision| {
            revision
                .slots
                .and_then(|slots| slots.main.content)
                .or(revision.content)
        })
        .map(Some)
        .ok_or_else(|| EtymologyLookupError::Parse("page has no revision content".to_string()))
}

pub struct WiktionaryClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
    heuristic: EtymologyHeuristic,
}

impl WiktionaryClient {
    pub fn new(config: &EngineConfig) -> Result<Self, EtymologyLookupError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.etymology_timeout)
            .build()?;
        let heuristic = EtymologyHeuristic::new()
            .map_err(|error| EtymologyLookupError::Parse(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: Url::parse(&config.etymology_endpoint)?,
            timeout: config.etymology_timeout,
            heuristic,
        })
    }

    fn query_url(&self, word: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("titles", word)
            .append_pair("prop", "revisions")
            .append_pair("rvprop", "content")
            .append_pair("rvslots", "main")
            .append_pair("format", "json");
        url
    }

    async fn fetch_wikitext(&self, word: &str) -> Result<Option<String>, EtymologyLookupError> {
        let response = self.client.get(self.query_url(word)).send().await?;
        if !response.status().is_success() {
            return Err(EtymologyLookupError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;
        parse_api_response(&body)
    }
}

#[async_trait]
impl EtymologyClient for WiktionaryClient {
    async fn lookup_etymology(&self, word: &str) -> Result<EtymologyLookup, EtymologyLookupError> {
        let fetched = tokio::time::timeout(self.timeout, self.fetch_wikitext(word))
            .await
            .map_err(|_| EtymologyLookupError::Timeout(self.timeout.as_millis()))?;

        match fetched? {
            Some(wikitext) => Ok(EtymologyLookup::Found(self.heuristic.assess(&wikitext))),
            None => Ok(EtymologyLookup::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KREATIV: &str = "= {{-ru-}} =\n\
        === Морфологические и синтаксические свойства ===\n\
        {{сущ ru m ina 1a}}\n\
        === Этимология ===\n\
        От англ. creative «творческий», далее из лат. creare «создавать».\n\
        \n\
        === Фразеологизмы и устойчивые сочетания ===\n\
        * английский язык\n";

    #[test]
    fn section_stops_at_next_heading() -> Result<(), regex::Error> {
        let heuristic = EtymologyHeuristic::new()?;
        let section = heuristic.etymology_section(KREATIV).expect("section present");
        assert!(section.starts_with("От англ. creative"));
        assert!(!section.contains("Фразеологизмы"));
        Ok(())
    }

    #[test]
    fn english_phrase_is_positive_with_source_word() -> Result<(), regex::Error> {
        let finding = EtymologyHeuristic::new()?.assess(KREATIV);

        assert_eq!(finding.signal, EtymologySignal::Positive);
        assert_eq!(finding.confidence, Confidence::High);
        assert_eq!(finding.source_word.as_deref(), Some("creative"));
        assert!(finding
            .snippet
            .as_deref()
            .is_some_and(|snippet| snippet.contains("англ. creative")));
        Ok(())
    }

    #[test]
    fn template_marker_outranks_loose_mentions() -> Result<(), regex::Error> {
        let wikitext = "=== Этимология ===\nПроисходит от {{сэ|en|computer|и=ru}}, английского слова.\n";
        let finding = EtymologyHeuristic::new()?.assess(wikitext);

        assert_eq!(finding.marker.as_deref(), Some("template сэ|en"));
        assert_eq!(finding.source_word.as_deref(), Some("computer"));
        assert_eq!(finding.confidence, Confidence::High);
        Ok(())
    }

    #[test]
    fn native_origin_is_negative() -> Result<(), regex::Error> {
        let wikitext = "=== Этимология ===\nПроисходит от праслав. *dǫbъ, от кот. в том числе:\n";
        let finding = EtymologyHeuristic::new()?.assess(wikitext);

        assert_eq!(finding.signal, EtymologySignal::Negative);
        Ok(())
    }

    #[test]
    fn missing_section_without_explicit_marker_is_inconclusive() -> Result<(), regex::Error> {
        let heuristic = EtymologyHeuristic::new()?;
        let finding = heuristic.assess("=== Перевод ===\n* английский: {{trad|en|fashion}}\n");
        assert_eq!(finding.signal, EtymologySignal::Inconclusive);
        assert_eq!(finding.confidence, Confidence::None);

        let categorized = heuristic.assess("{{помета}}\n[[Категория:Слова английского происхождения/ru]]");
        assert_eq!(categorized.signal, EtymologySignal::Positive);
        assert_eq!(categorized.confidence, Confidence::Low);
        Ok(())
    }

    #[test]
    fn empty_section_is_treated_as_absent() -> Result<(), regex::Error> {
        let heuristic = EtymologyHeuristic::new()?;
        let wikitext = "=== Этимология ===\n\n=== Перевод ===\nиз английского\n";
        assert!(heuristic.etymology_section(wikitext).is_none());
        let finding = heuristic.assess(wikitext);
        assert_eq!(finding.signal, EtymologySignal::Positive);
        assert_eq!(finding.confidence, Confidence::Medium);
        Ok(())
    }

    #[test]
    fn api_response_variants() {
        let found = r#"{"batchcomplete":"","query":{"pages":{"123":{"pageid":123,"ns":0,"title":"креатив","revisions":[{"slots":{"main":{"contentmodel":"wikitext","*":"=== Этимология ===\nОт англ. creative"}}}]}}}}"#;
        assert_eq!(
            parse_api_response(found).ok().flatten().as_deref(),
            Some("=== Этимология ===\nОт англ. creative")
        );

        let missing = r#"{"query":{"pages":{"-1":{"ns":0,"title":"скибиди","missing":""}}}}"#;
        assert!(matches!(parse_api_response(missing), Ok(None)));

        assert!(matches!(
            parse_api_response("<html>rate limited</html>"),
            Err(EtymologyLookupError::Parse(_))
        ));
        assert!(matches!(
            parse_api_response(r#"{"error":{"code":"badvalue"}}"#),
            Err(EtymologyLookupError::Parse(_))
        ));
    }

    fn local_config(addr: std::net::SocketAddr, timeout: Duration) -> EngineConfig {
        EngineConfig {
            etymology_endpoint: format!("http://{addr}/w/api.php"),
            etymology_timeout: timeout,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn silent_backend_times_out_quickly() -> Result<(), Box<dyn std::error::Error>> {
        let addr = crate::testing::serve_silence().await?;
        let client = WiktionaryClient::new(&local_config(addr, Duration::from_millis(300)))?;

        let started = std::time::Instant::now();
        let outcome = client.lookup_etymology("креатив").await;
        assert!(matches!(
            outcome,
            Err(EtymologyLookupError::Timeout(300)) | Err(EtymologyLookupError::Http(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
        Ok(())
    }

    #[tokio::test]
    async fn served_page_is_assessed() -> Result<(), Box<dyn std::error::Error>> {
        let body = serde_json::json!({
            "query": {
                "pages": {
                    "101": {
                        "title": "креатив",
                        "revisions": [{ "slots": { "main": { "*": KREATIV } } }]
                    }
                }
            }
        })
        .to_string();
        let response = crate::testing::http_response("200 OK", "application/json", body.as_bytes());
        let addr = crate::testing::serve_once(response).await?;
        let client = WiktionaryClient::new(&local_config(addr, Duration::from_secs(5)))?;

        match client.lookup_etymology("креатив").await? {
            EtymologyLookup::Found(finding) => {
                assert_eq!(finding.signal, EtymologySignal::Positive);
                assert_eq!(finding.source_word.as_deref(), Some("creative"));
            }
            EtymologyLookup::NotFound => panic!("page should be found"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn backend_error_status_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let response = crate::testing::http_response("503 Service Unavailable", "text/plain", b"busy");
        let addr = crate::testing::serve_once(response).await?;
        let client = WiktionaryClient::new(&local_config(addr, Duration::from_secs(5)))?;

        assert!(matches!(
            client.lookup_etymology("креатив").await,
            Err(EtymologyLookupError::Status(503))
        ));
        Ok(())
    }

    #[test]
    fn query_url_encodes_cyrillic_title() -> Result<(), EtymologyLookupError> {
        let client = WiktionaryClient::new(&EngineConfig::default())?;
        let url = client.query_url("креатив");

        assert_eq!(url.host_str(), Some("ru.wiktionary.org"));
        assert!(url
            .query_pairs()
            .any(|(key, value)| key == "titles" && value == "креатив"));
        assert!(url.query_pairs().any(|(key, value)| key == "rvslots" && value == "main"));
        Ok(())
    }
}
