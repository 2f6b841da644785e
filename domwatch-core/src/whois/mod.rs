mod client;
mod parser;
pub mod servers;

pub use client::{TcpTransport, WhoisClient, WhoisExchange, WhoisTransport, WHOIS_PORT};
pub use parser::WhoisRecord;
pub use servers::{get_backup_servers, get_tld, get_whois_server};
