//! Designation-report PDF download and text extraction.

use futures_util::StreamExt;
use reqwest::Client;

use crate::config::get_config;
use crate::fetch::FetchError;
use crate::retry::{RetryPolicy, with_retry};

/// Streaming PDF downloader with a byte cap.
pub struct PdfFetcher {
    pub(crate) client: Client,
    pub(crate) max_bytes: u64,
    pub(crate) retry: RetryPolicy,
}

impl PdfFetcher {
    /// Construct a fetcher using configuration derived from the environment.
    pub fn new() -> Result<Self, FetchError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("landmark-vectors/0.3")
            .timeout(config.pdf_read_timeout)
            .pool_max_idle_per_host(20)
            .build()?;
        Ok(Self {
            client,
            max_bytes: config.pdf_max_bytes,
            retry: RetryPolicy::default(),
        })
    }

    /// Download the PDF at `url`, streaming the body and enforcing the size cap.
    ///
    /// Exceeding the cap is permanent: the document will never fit, so the error is
    /// not retried.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        with_retry("pdf_fetch", self.retry, || async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::UnexpectedStatus {
                    status,
                    url: url.to_string(),
                });
            }

            if let Some(length) = response.content_length()
                && length > self.max_bytes
            {
                return Err(FetchError::Oversize {
                    limit: self.max_bytes,
                    url: url.to_string(),
                });
            }

            let mut body = Vec::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                    return Err(FetchError::Oversize {
                        limit: self.max_bytes,
                        url: url.to_string(),
                    });
                }
                body.extend_from_slice(&chunk);
            }

            tracing::debug!(url, bytes = body.len(), "Downloaded PDF");
            Ok(body)
        })
        .await
    }
}

/// Extract UTF-8 text from PDF bytes.
///
/// Whitespace is collapsed within paragraphs and paragraph boundaries are preserved
/// with `\n\n`. PDFs without a text layer yield an empty string rather than an error;
/// callers treat empty text as "no content".
pub fn extract_text(bytes: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(raw) => collapse_whitespace(&raw),
        Err(error) => {
            tracing::warn!(error = %error, "PDF has no extractable text layer");
            String::new()
        }
    }
}

fn collapse_whitespace(raw: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            for word in line.split_whitespace() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use std::time::Duration;

    fn test_fetcher(server: &MockServer, max_bytes: u64) -> PdfFetcher {
        PdfFetcher {
            client: Client::builder()
                .user_agent("landmark-vectors-test")
                .build()
                .expect("client"),
            max_bytes,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                factor: 1.0,
                max_delay: Duration::from_millis(2),
                jitter: 0.0,
            },
        }
    }

    #[tokio::test]
    async fn fetch_returns_the_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/LP-00009.pdf");
                then.status(200).body(b"%PDF-1.4 payload");
            })
            .await;

        let fetcher = test_fetcher(&server, 1024);
        let bytes = fetcher
            .fetch(&server.url("/LP-00009.pdf"))
            .await
            .expect("body");
        assert!(bytes.starts_with(b"%PDF-1.4"));
    }

    #[tokio::test]
    async fn oversize_bodies_are_rejected_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/huge.pdf");
                then.status(200).body(vec![0u8; 64]);
            })
            .await;

        let fetcher = test_fetcher(&server, 16);
        let error = fetcher
            .fetch(&server.url("/huge.pdf"))
            .await
            .expect_err("cap enforced");
        assert!(matches!(error, FetchError::Oversize { limit: 16, .. }));
        mock.assert_hits(1);
    }

    #[test]
    fn garbage_bytes_extract_to_empty_text() {
        assert_eq!(extract_text(b"definitely not a pdf"), "");
    }

    #[test]
    fn collapse_preserves_paragraph_boundaries() {
        let raw = "First  line\nwraps   here\n\n\nSecond   paragraph\n";
        assert_eq!(
            collapse_whitespace(raw),
            "First line wraps here\n\nSecond paragraph"
        );
    }

    #[test]
    fn collapse_of_whitespace_only_input_is_empty() {
        assert_eq!(collapse_whitespace("  \n \n\t\n"), "");
    }
}
