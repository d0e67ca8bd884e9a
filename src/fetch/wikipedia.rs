//! Wikipedia article download and HTML cleanup.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::config::get_config;
use crate::fetch::FetchError;
use crate::retry::{RetryPolicy, with_retry};

/// Pooled, keep-alive fetcher for rendered Wikipedia pages.
///
/// The same client instance is reused across landmarks so connection pooling
/// amortizes TLS setup over a batch run.
pub struct WikipediaFetcher {
    pub(crate) client: Client,
    pub(crate) retry: RetryPolicy,
}

impl WikipediaFetcher {
    /// Construct a fetcher using configuration derived from the environment.
    pub fn new() -> Result<Self, FetchError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("landmark-vectors/0.3 (landmark research pipeline)")
            .connect_timeout(config.wiki_connect_timeout)
            .timeout(config.wiki_read_timeout)
            .pool_max_idle_per_host(20)
            .build()?;
        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Download and clean the article at `url`, returning `(plaintext, revision_id)`.
    ///
    /// Navigation chrome, reference lists, infoboxes, and tables are stripped; the
    /// remaining paragraphs are joined with `\n\n`. The revision ID is read from the
    /// rendered page's `wgRevisionId` metadata; when it cannot be found an empty
    /// string is returned and quality classification is skipped downstream.
    pub async fn fetch(&self, url: &str) -> Result<(String, String), FetchError> {
        let html = with_retry("wikipedia_fetch", self.retry, || async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::UnexpectedStatus {
                    status,
                    url: url.to_string(),
                });
            }
            Ok(response.text().await?)
        })
        .await?;

        let text = extract_article_text(&html);
        let revision_id = extract_revision_id(&html).unwrap_or_else(|| {
            tracing::warn!(url, "Page metadata carries no revision id");
            String::new()
        });
        tracing::debug!(url, chars = text.len(), revision_id = %revision_id, "Fetched article");
        Ok((text, revision_id))
    }
}

/// Reduce rendered article HTML to plain paragraphs.
fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let content_paragraphs = Selector::parse("#mw-content-text p").expect("valid selector");
    let any_paragraphs = Selector::parse("p").expect("valid selector");

    let mut selected: Vec<ElementRef> = document.select(&content_paragraphs).collect();
    if selected.is_empty() {
        selected = document.select(&any_paragraphs).collect();
    }

    let mut paragraphs = Vec::new();
    for paragraph in selected {
        if in_excluded_container(paragraph) {
            continue;
        }
        let text = clean_paragraph(&paragraph.text().collect::<String>());
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    paragraphs.join("\n\n")
}

/// Whether the element sits inside chrome we strip: tables, infoboxes, navboxes,
/// reference lists, or the site navigation.
fn in_excluded_container(element: ElementRef) -> bool {
    for ancestor in element.ancestors() {
        let Some(ancestor) = ElementRef::wrap(ancestor) else {
            continue;
        };
        let name = ancestor.value().name();
        if name == "table" || name == "nav" {
            return true;
        }
        if let Some(class) = ancestor.value().attr("class")
            && (class.contains("infobox")
                || class.contains("navbox")
                || class.contains("reflist")
                || class.contains("mw-references")
                || class.contains("hatnote"))
        {
            return true;
        }
        if let Some(id) = ancestor.value().attr("id")
            && (id == "References" || id == "mw-navigation" || id == "footer")
        {
            return true;
        }
    }
    false
}

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+\]|\[edit\]|\[citation needed\]").expect("valid regex"))
}

fn clean_paragraph(raw: &str) -> String {
    let stripped = citation_regex().replace_all(raw, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn revision_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""wgRevisionId"\s*:\s*(\d+)"#).expect("valid regex"))
}

fn cur_revision_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""wgCurRevisionId"\s*:\s*(\d+)"#).expect("valid regex"))
}

/// Pull the revision ID out of the rendered page's embedded config.
fn extract_revision_id(html: &str) -> Option<String> {
    revision_regex()
        .captures(html)
        .or_else(|| cur_revision_regex().captures(html))
        .map(|caps| caps[1].to_string())
}
