// Full article text for a link, with an ordered fallback between strategies.

use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{debug, warn};

use crate::entry::is_http_url;
use crate::error::{FetchError, Result};
use crate::http::get_bytes;

const TEXT_WIDTH: usize = 100;

#[async_trait]
pub trait FullTextSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Plain article text behind `url`. Blank output is an error.
    async fn full_text(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl<T: FullTextSource + ?Sized> FullTextSource for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn full_text(&self, url: &str) -> Result<String> {
        (**self).full_text(url).await
    }
}

/// Main-content extraction: Readability picks the article body, rendered as text.
pub struct ReadabilityExtractor {
    client: reqwest::Client,
}

impl ReadabilityExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FullTextSource for ReadabilityExtractor {
    fn name(&self) -> &'static str {
        "readability"
    }

    async fn full_text(&self, url: &str) -> Result<String> {
        let html = get_bytes(&self.client, url).await?;
        non_blank(url, readable_text(&html, Some(url)))
    }
}

/// Generic fetch plus tag stripping of the whole page.
pub struct Html2TextExtractor {
    client: reqwest::Client,
}

impl Html2TextExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FullTextSource for Html2TextExtractor {
    fn name(&self) -> &'static str {
        "html2text"
    }

    async fn full_text(&self, url: &str) -> Result<String> {
        let html = get_bytes(&self.client, url).await?;
        let text = html2text::from_read(&html[..], TEXT_WIDTH).map_err(|e| FetchError::Extract {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        non_blank(url, text)
    }
}

/// Tries each source in order and returns the first success.
pub struct FallbackChain {
    sources: Vec<Box<dyn FullTextSource>>,
}

impl FallbackChain {
    pub fn new(sources: Vec<Box<dyn FullTextSource>>) -> Self {
        Self { sources }
    }

    /// Readability first, then plain stripping, sharing one client.
    pub fn standard(client: reqwest::Client) -> Self {
        Self::new(vec![
            Box::new(ReadabilityExtractor::new(client.clone())),
            Box::new(Html2TextExtractor::new(client)),
        ])
    }
}

#[async_trait]
impl FullTextSource for FallbackChain {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn full_text(&self, url: &str) -> Result<String> {
        if !is_http_url(url) {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }

        let mut last_err = FetchError::EmptyContent(url.to_string());
        for source in &self.sources {
            match source.full_text(url).await {
                Ok(text) => {
                    debug!(url, strategy = source.name(), chars = text.len(), "Full text extracted");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(url, strategy = source.name(), error = %e, "Full text strategy failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

/// Readability extraction of raw HTML to plain text.
pub fn readable_text(html: &[u8], url: Option<&str>) -> String {
    let parsed_url = url.and_then(|u| url::Url::parse(u).ok());
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Text,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html,
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    transform_content_input(input, &config)
}

fn non_blank(url: &str, text: String) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FetchError::EmptyContent(url.to_string()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, Option<&'static str>);

    #[async_trait]
    impl FullTextSource for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn full_text(&self, url: &str) -> Result<String> {
            self.1
                .map(str::to_string)
                .ok_or_else(|| FetchError::EmptyContent(url.to_string()))
        }
    }

    #[tokio::test]
    async fn chain_uses_first_success() {
        let chain = FallbackChain::new(vec![
            Box::new(Fixed("primary", None)),
            Box::new(Fixed("secondary", Some("from secondary"))),
        ]);
        assert_eq!(chain.full_text("https://e.com/a").await.unwrap(), "from secondary");
    }

    #[tokio::test]
    async fn chain_reports_last_error_when_all_fail() {
        let chain = FallbackChain::new(vec![Box::new(Fixed("a", None)), Box::new(Fixed("b", None))]);
        assert!(matches!(
            chain.full_text("https://e.com/a").await,
            Err(FetchError::EmptyContent(_))
        ));
    }

    #[tokio::test]
    async fn chain_skips_non_http_links() {
        let chain = FallbackChain::new(vec![Box::new(Fixed("a", Some("text")))]);
        assert!(matches!(
            chain.full_text("urn:uuid:1").await,
            Err(FetchError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(non_blank("u", "  \n ".into()).is_err());
        assert_eq!(non_blank("u", " body \n".into()).unwrap(), "body");
    }
}
