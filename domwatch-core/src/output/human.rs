use chrono::Utc;
use colored::Colorize;

use super::OutputFormatter;
use crate::colors::CatppuccinExt;
use crate::config::{ExecutionMode, LiveConfig};
use crate::record::DomainRecord;

/// Days left below which an expiry is shown as urgent.
const URGENT_DAYS: i64 = 30;
const WARNING_DAYS: i64 = 90;

pub struct HumanFormatter {
    use_colors: bool,
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    fn label(&self, text: &str) -> String {
        if self.use_colors {
            text.sky().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn value(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_white().to_string()
        } else {
            text.to_string()
        }
    }

    fn muted(&self, text: &str) -> String {
        if self.use_colors {
            text.overlay0().to_string()
        } else {
            text.to_string()
        }
    }

    fn success(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_green().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn warning(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_yellow().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn urgent(&self, text: &str) -> String {
        if self.use_colors {
            text.peach().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn error(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn header(&self, text: &str) -> String {
        if self.use_colors {
            format!("\n{}\n{}", text.lavender().bold(), "─".repeat(text.len()).subtext0())
        } else {
            format!("\n{}\n{}", text, "-".repeat(text.len()))
        }
    }

    fn field(&self, label: &str, value: &str) -> String {
        format!("  {}: {}", self.label(label), self.value(value))
    }

    fn expiry_line(&self, record: &DomainRecord) -> String {
        let Some(expiry) = record.expiry_time else {
            return self.error("unknown");
        };
        let date = expiry.format("%Y-%m-%d").to_string();
        let days = record.days_remaining;

        if days < 0 {
            self.error(&format!("{} (expired {} days ago)", date, -days))
        } else if days < URGENT_DAYS {
            self.urgent(&format!("{} (expires in {} days!)", date, days))
        } else if days < WARNING_DAYS {
            self.warning(&format!("{} ({} days)", date, days))
        } else {
            self.value(&format!("{} ({} days)", date, days))
        }
    }

    fn format_record(&self, record: &DomainRecord) -> Vec<String> {
        let mut output = Vec::new();

        let marker = if record.valid {
            self.success("✓")
        } else {
            self.error("✗")
        };
        output.push(format!("{} {}", marker, self.value(&record.name)));

        output.push(format!("  {}: {}", self.label("Expires"), self.expiry_line(record)));

        if let Some(ref registrar) = record.registrar {
            output.push(self.field("Registrar", registrar));
        }
        if let Some(ref method) = record.resolution_method {
            output.push(self.field("Method", &method.to_string()));
        }
        if let Some(ref error) = record.last_error {
            output.push(format!("  {}: {}", self.label("Error"), self.error(error)));
        }

        let age = (Utc::now() - record.last_checked_at).num_seconds().max(0);
        output.push(format!(
            "  {}: {}",
            self.label("Checked"),
            self.muted(&format!(
                "{} ({}s ago)",
                record.last_checked_at.format("%Y-%m-%d %H:%M:%S UTC"),
                age
            ))
        ));

        output
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_records(&self, records: &[DomainRecord]) -> String {
        let mut output = Vec::new();
        output.push(self.header("Domain Expiry"));

        if records.is_empty() {
            output.push(self.muted("  No domains configured"));
            return output.join("\n");
        }

        for record in records {
            output.extend(self.format_record(record));
        }

        let valid = records.iter().filter(|r| r.valid).count();
        let summary = format!("{} checked, {} valid, {} failed", records.len(), valid, records.len() - valid);
        output.push(String::new());
        output.push(if valid == records.len() {
            self.success(&summary)
        } else {
            self.warning(&summary)
        });

        output.join("\n")
    }

    fn format_config(&self, config: &LiveConfig) -> String {
        let mut output = Vec::new();
        output.push(self.header("Configuration"));

        output.push(self.field("Domains", &config.domains.len().to_string()));
        for domain in &config.domains {
            output.push(format!("    {}", self.value(domain)));
        }
        output.push(self.field(
            "Check interval",
            &format!("{}s", config.check_interval.as_secs()),
        ));
        output.push(self.field("Timeout", &format!("{}s", config.timeout.as_secs())));

        let execution = match config.execution {
            ExecutionMode::Concurrent { limit } => format!("concurrent, {} at a time", limit),
            ExecutionMode::Serial { pause } => format!("serial, {}ms between domains", pause.as_millis()),
        };
        output.push(self.field("Execution", &execution));
        output.push(self.field("Retry attempts", &config.retry_attempts.to_string()));

        if !config.backup_whois_servers.is_empty() {
            output.push(self.field("Backup servers", &config.backup_whois_servers.join(", ")));
        }
        output.push(self.field("Log level", &config.log_level));

        match config.source.url.as_deref() {
            Some(url) if config.source.is_enabled() => {
                output.push(self.field(
                    "Source",
                    &format!("{} ({}/{})", url, config.source.group, config.source.data_id),
                ));
            }
            _ => output.push(format!("  {}: {}", self.label("Source"), self.muted("none"))),
        }

        output.join("\n")
    }
}
