//! Reads title, artist and image from a photo-hosting page.

use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::ScraperConfig;
use crate::content::domain::{is_public_ip, validate_source_url};

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub image_url: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("page returned HTTP {0}")]
    Status(u16),

    #[error("page has no {0}")]
    MissingMarkup(&'static str),
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, source_url: &str) -> Result<PhotoMetadata, FetchError>;
}

/// Fetches the page over HTTP and reads the photo markup out of it.
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    image_prefix: String,
}

impl HttpMetadataFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        // every hop is re-checked, and names only resolve to public addresses
        let redirects = redirect::Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if validate_source_url(attempt.url().as_str()).is_err() {
                attempt.error("redirect to a non-public address")
            } else {
                attempt.follow()
            }
        });
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(redirects)
            .dns_resolver(Arc::new(PublicOnlyResolver))
            .build()?;
        Ok(Self {
            client,
            image_prefix: config.image_prefix.clone(),
        })
    }
}

/// System DNS with private, loopback and link-local answers removed.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let addrs: Addrs = Box::new(public_addrs(name.as_str()).await?.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

async fn public_addrs(host: &str) -> Result<Vec<SocketAddr>, std::io::Error> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
        .await?
        .filter(|addr| is_public_ip(addr.ip()))
        .collect();
    if addrs.is_empty() {
        tracing::warn!(host, "Refusing to fetch from a host with no public address");
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("{} has no public address", host),
        ));
    }
    Ok(addrs)
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, source_url: &str) -> Result<PhotoMetadata, FetchError> {
        tracing::debug!("Fetching photo page {}", source_url);
        let response = self.client.get(source_url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let html = response.text().await?;
        parse_photo_page(&html, &self.image_prefix)
    }
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract metadata from a photo page. The image is the first `<meta>` whose
/// `content` starts with `image_prefix`; the title comes from `h1.photo-title`
/// and the artist, when present, from `a.owner-name`.
pub fn parse_photo_page(html: &str, image_prefix: &str) -> Result<PhotoMetadata, FetchError> {
    let doc = Html::parse_document(html);

    // prefix comes from config and may contain quotes, so it is matched here rather than in a selector
    let meta = Selector::parse("meta[content]").map_err(|_| FetchError::MissingMarkup("meta"))?;
    let image_url = doc
        .select(&meta)
        .filter_map(|el| el.value().attr("content"))
        .find(|content| content.starts_with(image_prefix))
        .map(str::to_string)
        .ok_or(FetchError::MissingMarkup("photo image"))?;

    let title_sel =
        Selector::parse("h1.photo-title").map_err(|_| FetchError::MissingMarkup("title"))?;
    let title = first_text(&doc, &title_sel).ok_or(FetchError::MissingMarkup("photo title"))?;

    let artist_sel =
        Selector::parse("a.owner-name").map_err(|_| FetchError::MissingMarkup("artist"))?;
    let artist = first_text(&doc, &artist_sel);

    Ok(PhotoMetadata {
        title,
        artist,
        image_url,
    })
}
