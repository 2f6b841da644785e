use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Root referral server used when a TLD has no known registry server.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

/// Registry WHOIS servers for the standard query path.
pub static WHOIS_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    // Generic TLDs
    m.insert("com", "whois.verisign-grs.com");
    m.insert("net", "whois.verisign-grs.com");
    m.insert("org", "whois.pir.org");
    m.insert("info", "whois.afilias.net");
    m.insert("biz", "whois.nic.biz");
    m.insert("name", "whois.nic.name");
    m.insert("mobi", "whois.afilias.net");
    m.insert("pro", "whois.registrypro.pro");
    m.insert("asia", "whois.nic.asia");
    m.insert("edu", "whois.educause.edu");
    m.insert("gov", "whois.dotgov.gov");
    m.insert("int", "whois.iana.org");

    // New gTLDs
    m.insert("app", "whois.nic.google");
    m.insert("dev", "whois.nic.google");
    m.insert("page", "whois.nic.google");
    m.insert("xyz", "whois.nic.xyz");
    m.insert("online", "whois.nic.online");
    m.insert("site", "whois.nic.site");
    m.insert("tech", "whois.nic.tech");
    m.insert("store", "whois.nic.store");
    m.insert("shop", "whois.nic.shop");
    m.insert("cloud", "whois.nic.cloud");
    m.insert("blog", "whois.nic.blog");

    // Country codes
    m.insert("io", "whois.nic.io");
    m.insert("co", "whois.nic.co");
    m.insert("me", "whois.nic.me");
    m.insert("tv", "tvwhois.verisign-grs.com");
    m.insert("cc", "ccwhois.verisign-grs.com");
    m.insert("ai", "whois.nic.ai");
    m.insert("us", "whois.nic.us");
    m.insert("uk", "whois.nic.uk");
    m.insert("de", "whois.denic.de");
    m.insert("fr", "whois.nic.fr");
    m.insert("nl", "whois.domain-registry.nl");
    m.insert("eu", "whois.eu");
    m.insert("be", "whois.dns.be");
    m.insert("ch", "whois.nic.ch");
    m.insert("at", "whois.nic.at");
    m.insert("it", "whois.nic.it");
    m.insert("es", "whois.nic.es");
    m.insert("pl", "whois.dns.pl");
    m.insert("se", "whois.iis.se");
    m.insert("ru", "whois.tcinet.ru");
    m.insert("jp", "whois.jprs.jp");
    m.insert("cn", "whois.cnnic.cn");
    m.insert("hk", "whois.hkirc.hk");
    m.insert("tw", "whois.twnic.net.tw");
    m.insert("kr", "whois.kr");
    m.insert("in", "whois.registry.in");
    m.insert("au", "whois.auda.org.au");
    m.insert("ca", "whois.cira.ca");
    m.insert("br", "whois.registro.br");

    m
});

/// Preferred servers for the backup path, tried before the generic backup
/// list. These are queried directly, without referral following.
pub static BACKUP_SERVERS: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();

        m.insert("com", &["whois.verisign-grs.com"]);
        m.insert("net", &["whois.verisign-grs.com"]);
        m.insert("org", &["whois.publicinterestregistry.net", "whois.pir.org"]);
        m.insert("info", &["whois.afilias.net"]);
        m.insert("biz", &["whois.neulevel.biz"]);
        m.insert("us", &["whois.nic.us"]);
        m.insert("uk", &["whois.nominet.uk", "whois.nic.uk"]);
        m.insert("de", &["whois.denic.de"]);
        m.insert("fr", &["whois.afnic.fr"]);
        m.insert("jp", &["whois.jprs.jp"]);
        m.insert("cn", &["whois.cnnic.cn"]);

        m
    });

pub fn get_whois_server(tld: &str) -> Option<&'static str> {
    WHOIS_SERVERS.get(tld.to_lowercase().as_str()).copied()
}

/// Preferred backup servers for a TLD; empty when the TLD has no entry.
pub fn get_backup_servers(tld: &str) -> &'static [&'static str] {
    BACKUP_SERVERS
        .get(tld.to_lowercase().as_str())
        .copied()
        .unwrap_or(&[])
}

pub fn get_tld(domain: &str) -> Option<&str> {
    domain.rsplit('.').next().filter(|tld| !tld.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_tld() {
        assert_eq!(get_tld("example.com"), Some("com"));
        assert_eq!(get_tld("example.co.uk"), Some("uk"));
        assert_eq!(get_tld("example."), None);
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        assert_eq!(get_whois_server("COM"), Some("whois.verisign-grs.com"));
        assert_eq!(get_whois_server("xx"), None);
    }

    #[test]
    fn test_backup_servers() {
        assert_eq!(get_backup_servers("net"), &["whois.verisign-grs.com"]);
        assert_eq!(get_backup_servers("org").len(), 2);
        assert!(get_backup_servers("xx").is_empty());
    }
}
