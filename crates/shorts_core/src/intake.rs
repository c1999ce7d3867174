use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("not a valid url: {0}")]
    Unparsable(String),
    #[error("unsupported scheme {0}")]
    Scheme(String),
    #[error("url has no host")]
    MissingHost,
    #[error("local or private network hosts are not allowed")]
    PrivateHost,
}

/// Split newline-delimited input into trimmed, non-empty lines.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Accept only public http(s) URLs addressed by domain name.
pub fn validate_source_url(raw: &str) -> Result<Url, UrlRejection> {
    let url = Url::parse(raw).map_err(|err| UrlRejection::Unparsable(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::Scheme(other.to_string())),
    }
    match url.host() {
        None => Err(UrlRejection::MissingHost),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => Err(UrlRejection::PrivateHost),
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") || domain.ends_with(".local")
            {
                Err(UrlRejection::PrivateHost)
            } else {
                Ok(url)
            }
        }
    }
}

/// Split candidates into dispatchable URLs and rejected ones with their reason.
pub fn partition_urls(urls: Vec<String>) -> (Vec<String>, Vec<(String, UrlRejection)>) {
    let mut valid = Vec::with_capacity(urls.len());
    let mut rejected = Vec::new();
    for url in urls {
        match validate_source_url(&url) {
            Ok(_) => valid.push(url),
            Err(reason) => rejected.push((url, reason)),
        }
    }
    (valid, rejected)
}
