//! Candidate words from user documents: a PDF on disk or a fetched web page.
//!
//! Web pages are reduced to visible text first. Script, style and noscript
//! blocks, comments and presentational attributes are dropped, then words that
//! look like CSS or DOM leftovers are filtered out.

use crate::error::DocumentError;
use crate::extractor::PdfExtractor;
use crate::normalize::Tokenizer;
use regex::Regex;
use reqwest::Client;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Largest PDF or page body accepted for word extraction.
pub const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;
pub const PAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_USER_AGENT: &str = "Mozilla/5.0";

const CSS_ARTIFACTS: &[&str] = &[
    "absolute", "active", "after", "all", "alt", "alpha", "auto", "before", "block", "bold",
    "both", "bottom", "capitalize", "center", "circle", "column", "columns", "content", "cover",
    "dashed", "dotted", "embed", "end", "even", "fixed", "flex", "focus", "full", "grid",
    "hidden", "hover", "inherit", "initial", "inline", "inset", "italic", "justify", "left",
    "length", "line", "list", "lowercase", "medium", "middle", "none", "normal", "nowrap", "odd",
    "overflow", "pointer", "relative", "repeat", "right", "rotate", "row", "rows", "scale",
    "scroll", "self", "solid", "space", "start", "static", "stretch", "sticky", "thin", "top",
    "transparent", "underline", "unset", "uppercase", "visible", "wrapper", "wrap",
];

const SCRIPT_ARTIFACTS: &[&str] = &[
    "const", "let", "var", "function", "return", "typeof", "undefined", "null", "document",
    "window", "create", "createelement", "appendchild", "queryselector", "getelementbyid",
    "addeventlistener", "dataset", "innerhtml", "outerhtml", "textcontent", "navigator",
    "localstorage", "sessionstorage", "context", "counter", "display",
];

/// Distinct normalized words of a PDF document, sorted.
pub fn pdf_words(
    extractor: &dyn PdfExtractor,
    path: &Path,
    max_bytes: u64,
) -> Result<Vec<String>, DocumentError> {
    let is_pdf = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(DocumentError::NotPdf(path.display().to_string()));
    }

    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(DocumentError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let tokenizer = Tokenizer::new()?;
    let mut words = BTreeSet::new();
    for page in extractor.extract_pages(path)? {
        words.extend(tokenizer.words(&page.text));
    }

    info!(path = %path.display(), words = words.len(), "pdf words extracted");
    Ok(words.into_iter().collect())
}

pub struct HtmlWordExtractor {
    hidden_blocks: [Regex; 3],
    comments: Regex,
    attributes: Regex,
    tags: Regex,
    cyrillic: Regex,
    latin: Regex,
    css_prefix: Regex,
    css_suffix: Regex,
}

impl HtmlWordExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            hidden_blocks: [
                Regex::new(r"(?i)<script[^>]*>[\s\S]*?</script>")?,
                Regex::new(r"(?i)<style[^>]*>[\s\S]*?</style>")?,
                Regex::new(r"(?i)<noscript[^>]*>[\s\S]*?</noscript>")?,
            ],
            comments: Regex::new(r"<!--[\s\S]*?-->")?,
            attributes: Regex::new(
                r#"(?i)\b(?:class|style|id|data-[a-z0-9\-]+|on\w+)\s*=\s*["'][^"']*["']"#,
            )?,
            tags: Regex::new(r"<[^>]+>")?,
            cyrillic: Regex::new(r"(?i)\b[а-яё][а-яё\-]{2,}\b")?,
            latin: Regex::new(r"\b[a-z][a-z\-_]{2,}\b")?,
            css_prefix: Regex::new(
                r"(?i)^(align|flex|grid|justify|place|gap|padding|margin|object|overflow|position|text|font|border|outline|background|color|width|height|min|max|inset|order|grow|shrink|basis|aspect|transition|transform|animation|advance|address|has|is|wrapper)-",
            )?,
            css_suffix: Regex::new(
                r"(?i)-(content|items|self|wrapper|visible|hidden|desktop|mobile|height|width|gap|padding|margin|background|radius|color|size|top|bottom|left|right|row|col)s?$",
            )?,
        })
    }

    /// Visible words of a page, lowercased, sorted and unique.
    pub fn words(&self, html: &str) -> Vec<String> {
        let mut text = html.to_string();
        for block in &self.hidden_blocks {
            text = block.replace_all(&text, " ").into_owned();
        }
        let text = self.comments.replace_all(&text, " ");
        let text = self.attributes.replace_all(&text, " ");
        let text = self.tags.replace_all(&text, " ");

        let mut words = BTreeSet::new();
        let found = self
            .cyrillic
            .find_iter(&text)
            .chain(self.latin.find_iter(&text));
        for candidate in found {
            let word = candidate.as_str().to_lowercase();
            if !self.is_technical_artifact(&word) {
                words.insert(word);
            }
        }
        words.into_iter().collect()
    }

    fn is_technical_artifact(&self, word: &str) -> bool {
        if CSS_ARTIFACTS.contains(&word) || SCRIPT_ARTIFACTS.contains(&word) {
            return true;
        }
        if word.contains('-') && (self.css_prefix.is_match(word) || self.css_suffix.is_match(word)) {
            return true;
        }
        // Short vowel-poor latin tokens are class names and ids.
        if word.len() <= 6 && !word.is_empty() && word.bytes().all(|byte| byte.is_ascii_lowercase()) {
            let vowels = word.chars().filter(|ch| "aeiouy".contains(*ch)).count();
            return vowels == 0 || (word.len() >= 4 && vowels <= 1);
        }
        false
    }
}

/// Fetches web pages and reduces them to candidate words.
pub struct PageFetcher {
    client: Client,
    extractor: HtmlWordExtractor,
    max_bytes: u64,
}

impl PageFetcher {
    pub fn new() -> Result<Self, DocumentError> {
        let client = Client::builder()
            .user_agent(PAGE_USER_AGENT)
            .timeout(PAGE_FETCH_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            extractor: HtmlWordExtractor::new()?,
            max_bytes: MAX_DOCUMENT_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Page body decoded as UTF-8, invalid sequences replaced.
    pub async fn fetch_html(&self, url: &str) -> Result<String, DocumentError> {
        let mut response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DocumentError::Status(response.status().as_u16()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_bytes {
                return Err(DocumentError::TooLarge {
                    size: body.len() as u64,
                    limit: self.max_bytes,
                });
            }
        }

        debug!(%url, bytes = body.len(), "page fetched");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn words(&self, url: &str) -> Result<Vec<String>, DocumentError> {
        let html = self.fetch_html(url).await?;
        let words = self.extractor.words(&html);
        info!(%url, words = words.len(), "page words extracted");
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::extractor::PageText;
    use crate::testing::{http_response, serve_once};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn hidden_markup_is_not_content() -> Result<(), regex::Error> {
        let html = r#"<html><head>
            <style>.hero { color: red; } кнопка</style>
            <script type="text/javascript">const лендинг = "скрипт";</script>
            </head><body>
            <noscript>Включите джаваскрипт</noscript>
            <!-- Промо блок -->
            <div class="promo-banner" data-track-id="хедер" onclick="трекинг()" id="маркетинг">
              Наш Дизайн и креатив для бизнеса
            </div>
            </body></html>"#;

        let words = HtmlWordExtractor::new()?.words(html);
        assert_eq!(words, vec!["бизнеса", "дизайн", "для", "креатив", "наш"]);
        Ok(())
    }

    #[test]
    fn technical_leftovers_are_filtered() -> Result<(), regex::Error> {
        let extractor = HtmlWordExtractor::new()?;
        let words = extractor.words(
            "<p>flex hidden pointer queryselector text-center hero-wrapper btn px frsk \
             mixer marketing online-shop чек-лист</p>",
        );

        assert_eq!(words, vec!["marketing", "mixer", "online-shop", "чек-лист"]);
        Ok(())
    }

    #[test]
    fn capitalized_latin_words_are_skipped() -> Result<(), regex::Error> {
        let words = HtmlWordExtractor::new()?.words("<p>Google делает startup</p>");
        assert_eq!(words, vec!["startup", "делает"]);
        Ok(())
    }

    struct PlainText;

    impl PdfExtractor for PlainText {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError> {
            let text = fs::read_to_string(path)?;
            Ok(text
                .split('\u{000c}')
                .enumerate()
                .map(|(position, text)| PageText {
                    number: position as u32 + 1,
                    text: text.to_string(),
                })
                .collect())
        }
    }

    #[test]
    fn pdf_words_are_normalized_across_pages() -> Result<(), DocumentError> {
        let dir = tempdir()?;
        let path = dir.path().join("brief.PDF");
        fs::write(&path, "Дедла\u{0301}йн и брифинг\u{000c}Брифинг, ёмкость")?;

        let words = pdf_words(&PlainText, &path, MAX_DOCUMENT_BYTES)?;
        assert_eq!(words, vec!["брифинг", "дедлайн", "емкость"]);
        Ok(())
    }

    #[test]
    fn oversized_or_non_pdf_files_are_rejected() -> Result<(), DocumentError> {
        let dir = tempdir()?;
        let path = dir.path().join("big.pdf");
        fs::write(&path, vec![b'x'; 2_048])?;
        assert!(matches!(
            pdf_words(&PlainText, &path, 1_024),
            Err(DocumentError::TooLarge {
                size: 2_048,
                limit: 1_024
            })
        ));

        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "креатив")?;
        assert!(matches!(
            pdf_words(&PlainText, &notes, MAX_DOCUMENT_BYTES),
            Err(DocumentError::NotPdf(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn served_page_yields_words() -> Result<(), Box<dyn std::error::Error>> {
        let page = "<html><body><h1>Тренды</h1><p>Коворкинг и нетворкинг</p></body></html>";
        let response = http_response("200 OK", "text/html; charset=utf-8", page.as_bytes());
        let addr = serve_once(response).await?;

        let words = PageFetcher::new()?.words(&format!("http://{addr}/")).await?;
        assert_eq!(words, vec!["коворкинг", "нетворкинг", "тренды"]);
        Ok(())
    }

    #[tokio::test]
    async fn page_errors_and_oversized_bodies_fail() -> Result<(), Box<dyn std::error::Error>> {
        let failing = http_response("500 Internal Server Error", "text/html", b"oops");
        let addr = serve_once(failing).await?;
        assert!(matches!(
            PageFetcher::new()?.words(&format!("http://{addr}/")).await,
            Err(DocumentError::Status(500))
        ));

        let addr = serve_once(http_response("200 OK", "text/html", &[b'a'; 4_096])).await?;
        let fetcher = PageFetcher::new()?.with_max_bytes(1_024);
        assert!(matches!(
            fetcher.words(&format!("http://{addr}/")).await,
            Err(DocumentError::TooLarge { limit: 1_024, .. })
        ));
        Ok(())
    }
}
