//! Domain name normalization for WHOIS queries and configured domain lists

use std::collections::HashSet;

use crate::error::{Result, WatchError};

/// Normalize and validate a domain name before it is sent to a WHOIS server
///
/// This function:
/// - Removes http:// and https:// prefixes
/// - Removes www. prefix
/// - Removes trailing slashes and paths
/// - Converts to lowercase
/// - Validates format (must contain dots, only alphanumeric/hyphens/dots)
pub fn normalize_domain(domain: &str) -> Result<String> {
    let domain = domain.trim().to_lowercase();

    let domain = domain
        .strip_prefix("http://")
        .or_else(|| domain.strip_prefix("https://"))
        .unwrap_or(&domain);

    let domain = domain.split('/').next().unwrap_or(domain);
    let domain = domain.strip_prefix("www.").unwrap_or(domain);

    if domain.is_empty() || !domain.contains('.') {
        return Err(WatchError::InvalidDomain(domain.to_string()));
    }

    let valid = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return Err(WatchError::InvalidDomain(domain.to_string()));
    }

    if domain.contains("..") || domain.starts_with('.') || domain.ends_with('.') {
        return Err(WatchError::InvalidDomain(domain.to_string()));
    }

    for label in domain.split('.') {
        if label.is_empty() || label.starts_with('-') || label.ends_with('-') {
            return Err(WatchError::InvalidDomain(domain.to_string()));
        }
    }

    Ok(domain.to_string())
}

/// Clean a configured domain list: trim, lowercase, drop blanks and
/// duplicates while keeping first-seen order.
///
/// Names are kept as the operator wrote them otherwise; a syntactically bad
/// entry still gets a record (with its error) rather than vanishing.
pub fn clean_domain_list<I, S>(domains: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    domains
        .into_iter()
        .map(|d| d.as_ref().trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .filter(|d| seen.insert(d.clone()))
        .collect()
}

/// Parse a comma separated list, as used by environment overrides.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("example.com").unwrap(), "example.com");
        assert_eq!(normalize_domain("EXAMPLE.COM").unwrap(), "example.com");
        assert_eq!(
            normalize_domain("https://www.example.com/path").unwrap(),
            "example.com"
        );
        assert_eq!(
            normalize_domain("  WWW.EXAMPLE.COM  ").unwrap(),
            "example.com"
        );

        assert!(normalize_domain("").is_err());
        assert!(normalize_domain("nodots").is_err());
        assert!(normalize_domain("example..com").is_err());
        assert!(normalize_domain(".example.com").is_err());
        assert!(normalize_domain("example.com.").is_err());
        assert!(normalize_domain("-example.com").is_err());
        assert!(normalize_domain("exa mple.com").is_err());
    }

    #[test]
    fn test_clean_domain_list_dedupes_in_order() {
        let cleaned = clean_domain_list([" Example.com", "github.com", "", "example.com", "a.org"]);
        assert_eq!(cleaned, vec!["example.com", "github.com", "a.org"]);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("a.com, b.org ,,c.net"),
            vec!["a.com".to_string(), "b.org".to_string(), "c.net".to_string()]
        );
        assert!(split_list("  ").is_empty());
    }
}
