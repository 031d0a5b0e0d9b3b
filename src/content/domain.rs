// Domain types - input validation and listing options, no side effects
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

use crate::config::FeedConfig;
use crate::db::models::PostRecord;
use crate::db::RepositoryError;

pub const SOURCE_URL_MAX_LEN: usize = 500;
pub const TITLE_MAX_LEN: usize = 500;
pub const TAG_SLUG_MAX_LEN: usize = 20;

/// Rejected user input, shown back on the originating form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Invalid(pub String);

impl From<Invalid> for RepositoryError {
    fn from(err: Invalid) -> Self {
        RepositoryError::Validation(err.0)
    }
}

/// Post submission before the photo page has been fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub source_url: String,
    pub body: String,
    pub tag_slugs: Vec<String>,
}

/// Fields an author may change after posting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEdit {
    pub body: String,
    pub tag_slugs: Vec<String>,
}

/// Order of a post's comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentSort {
    /// Every comment, newest first.
    #[default]
    Recent,
    /// Only liked comments, most liked first.
    Top,
}

#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<PostRecord>,
    pub page: u32,
    pub has_next: bool,
}

impl PostPage {
    pub fn next_page(&self) -> Option<u32> {
        self.has_next.then_some(self.page + 1)
    }
}

impl NewPost {
    /// Normalise and check the submission. Returns the cleaned post.
    pub fn validated(self, limits: &FeedConfig) -> Result<Self, Invalid> {
        let source_url = validate_source_url(&self.source_url)?.to_string();
        let body = validate_text("Post", &self.body, limits.post_body_max_len)?;
        Ok(Self {
            source_url,
            body,
            tag_slugs: normalize_slugs(self.tag_slugs),
        })
    }
}

impl PostEdit {
    pub fn validated(self, limits: &FeedConfig) -> Result<Self, Invalid> {
        let body = validate_text("Post", &self.body, limits.post_body_max_len)?;
        Ok(Self {
            body,
            tag_slugs: normalize_slugs(self.tag_slugs),
        })
    }
}

pub fn validate_source_url(raw: &str) -> Result<Url, Invalid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Invalid("A photo page URL is required".into()));
    }
    if raw.chars().count() > SOURCE_URL_MAX_LEN {
        return Err(Invalid(format!(
            "URL must be {} characters or less",
            SOURCE_URL_MAX_LEN
        )));
    }
    let url = Url::parse(raw).map_err(|_| Invalid("Enter a valid URL".into()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Invalid("URL must start with http:// or https://".into()));
    }
    match url.host() {
        Some(host) if is_public_host(&host) => Ok(url),
        _ => Err(Invalid("URL must point to a public website".into())),
    }
}

/// False for names and addresses that reach this machine or its private network.
pub fn is_public_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            !(name == "localhost" || name.ends_with(".localhost") || name.ends_with(".local"))
        }
        Host::Ipv4(ip) => is_public_ipv4(ip),
        Host::Ipv6(ip) => is_public_ipv6(ip),
    }
}

pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_public_ipv4(&ip),
        IpAddr::V6(ip) => is_public_ipv6(&ip),
    }
}

fn is_public_ipv4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    // 0.0.0.0/8 and carrier-grade NAT 100.64.0.0/10
    let reserved = a == 0 || (a == 100 && (64..128).contains(&b));
    !(reserved
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation())
}

fn is_public_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_ipv4(&v4);
    }
    let first = ip.segments()[0];
    let unique_local = first & 0xfe00 == 0xfc00;
    let link_local = first & 0xffc0 == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}

/// Trimmed, non-empty text of at most `max_len` characters.
pub fn validate_text(what: &str, raw: &str, max_len: usize) -> Result<String, Invalid> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Invalid(format!("{} cannot be empty", what)));
    }
    if text.chars().count() > max_len {
        return Err(Invalid(format!(
            "{} must be {} characters or less",
            what, max_len
        )));
    }
    Ok(text.to_string())
}

pub fn validate_slug(slug: &str) -> Result<(), Invalid> {
    let ok = !slug.is_empty()
        && slug.len() <= TAG_SLUG_MAX_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Invalid(format!("Invalid tag slug: {:?}", slug)))
    }
}

fn normalize_slugs(slugs: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let slug = slug.trim().to_string();
        if !slug.is_empty() && !out.contains(&slug) {
            out.push(slug);
        }
    }
    out
}
