use url::{Host, Url};

const SERVICE_SUBDOMAINS: &[&str] = &["www", "m", "mobile"];
const SECOND_LEVEL: &[&str] = &["co", "or", "ac", "go", "ne", "com", "org", "net"];

/// Human label for the site a URL belongs to, e.g. `https://www.grace-church.or.kr/x`
/// becomes `Grace church`. Returns `None` for IP hosts or unparsable URLs.
pub fn organization_from_host(source_url: &str) -> Option<String> {
    let url = Url::parse(source_url).ok()?;
    let domain = match url.host()? {
        Host::Domain(domain) => domain.to_ascii_lowercase(),
        Host::Ipv4(_) | Host::Ipv6(_) => return None,
    };

    let mut labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    while labels.len() > 2 && is_service_or_locale(labels[0]) {
        labels.remove(0);
    }
    if labels.len() > 1 {
        labels.pop();
    }
    if labels.len() > 1 && labels.last().is_some_and(|l| SECOND_LEVEL.contains(l)) {
        labels.pop();
    }

    let name = labels.last()?;
    humanize(name)
}

fn is_service_or_locale(label: &str) -> bool {
    SERVICE_SUBDOMAINS.contains(&label)
        || (label.len() == 2 && label.chars().all(|c| c.is_ascii_alphabetic()))
}

fn humanize(label: &str) -> Option<String> {
    let spaced = label.replace(['-', '_'], " ");
    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
