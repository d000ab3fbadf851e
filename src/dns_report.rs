//! DNS Report Module
//!
//! This module runs every configured probe, collects one row per domain and
//! renders the results as an HTML status table along with a summary subject
//! line.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::time::Duration;

use crate::config::DnsCheckConfig;
use crate::dns_probe::probe;
use crate::error::Result;
use crate::models::{DomainCheck, ProbeStatus};

const PASS_COLOR: &str = "#ccffcc";
const FAIL_COLOR: &str = "#ffcccc";

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub company: String,
    pub nameservers: Vec<String>,
    pub checks: Vec<DomainCheck>,
    pub finished_at: DateTime<Utc>,
}

impl CheckReport {
    pub fn failed(&self) -> bool {
        self.checks.iter().any(|c| !c.overall.is_pass())
    }

    pub fn subject(&self) -> String {
        if self.failed() {
            format!(
                "[FAIL] - {} - DNS Server Check Failed for one or more tests",
                self.company
            )
        } else {
            format!("[SUCCESS] - {} - DNS Server Check Pass", self.company)
        }
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from(
            "<html><body><table border=\"1\" cellpadding=\"5\" cellspacing=\"0\" \
             style=\"border-collapse:collapse;\"><tr><th>FQDN</th><th>Overall</th>",
        );
        for ns in &self.nameservers {
            html.push_str(&format!("<th>{}</th>", escape(ns)));
        }
        html.push_str("</tr>");

        for check in &self.checks {
            html.push_str(&format!(
                "<tr><td>{}</td><td style='background-color:{}'>{}</td>",
                escape(&check.name),
                color(check.overall),
                check.overall
            ));
            for ns in &self.nameservers {
                match check.status_for(ns) {
                    Some(status) => html.push_str(&format!(
                        "<td style='background-color:{}'>{}</td>",
                        color(status),
                        status
                    )),
                    None => html.push_str("<td></td>"),
                }
            }
            html.push_str("</tr>");
        }
        html.push_str("</table></body></html>");
        html
    }
}

fn color(status: ProbeStatus) -> &'static str {
    if status.is_pass() {
        PASS_COLOR
    } else {
        FAIL_COLOR
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Probes every nameserver for every domain, in configuration order.
pub async fn run_checks(config: &DnsCheckConfig) -> Result<CheckReport> {
    let addrs = config.nameserver_addrs()?;
    let timeout = Duration::from_secs(config.timeout.max(1));
    let mut checks = Vec::with_capacity(config.domains.len());

    for fqdn in &config.domains {
        let mut check = DomainCheck::new(fqdn.as_str());
        for (label, addr) in config.nameservers.iter().zip(&addrs) {
            check.push(label.as_str(), probe(*addr, fqdn, timeout).await);
        }
        info!("{}: {}", fqdn, check.overall);
        checks.push(check);
    }

    Ok(CheckReport {
        company: config.company.clone(),
        nameservers: config.nameservers.clone(),
        checks,
        finished_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(statuses: Vec<(&str, Vec<ProbeStatus>)>) -> CheckReport {
        let nameservers = vec!["1.1.1.1".to_string(), "9.9.9.9".to_string()];
        let checks = statuses
            .into_iter()
            .map(|(name, results)| {
                let mut check = DomainCheck::new(name);
                for (ns, status) in nameservers.iter().zip(results) {
                    check.push(ns.as_str(), status);
                }
                check
            })
            .collect();
        CheckReport {
            company: "Acme".into(),
            nameservers,
            checks,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_subject_lines() {
        use ProbeStatus::*;
        let ok = report(vec![("example.com", vec![Pass, Pass])]);
        assert!(!ok.failed());
        assert_eq!(ok.subject(), "[SUCCESS] - Acme - DNS Server Check Pass");

        let bad = report(vec![("example.com", vec![Pass, Pass]), ("example.org", vec![Pass, Fail])]);
        assert!(bad.failed());
        assert_eq!(
            bad.subject(),
            "[FAIL] - Acme - DNS Server Check Failed for one or more tests"
        );
    }

    #[test]
    fn test_html_table() {
        use ProbeStatus::*;
        let html = report(vec![("example.org", vec![Pass, Fail])]).to_html();
        assert!(html.starts_with("<html><body><table border=\"1\""));
        assert!(html.contains("<th>FQDN</th><th>Overall</th><th>1.1.1.1</th><th>9.9.9.9</th></tr>"));
        assert!(html.contains(
            "<tr><td>example.org</td><td style='background-color:#ffcccc'>FAIL</td>\
             <td style='background-color:#ccffcc'>PASS</td>\
             <td style='background-color:#ffcccc'>FAIL</td></tr>"
        ));
        assert!(html.ends_with("</table></body></html>"));
    }

    #[test]
    fn test_html_escapes_names() {
        let html = report(vec![("<b>x</b>", vec![ProbeStatus::Pass, ProbeStatus::Pass])]).to_html();
        assert!(html.contains("<td>&lt;b&gt;x&lt;/b&gt;</td>"));
        assert!(!html.contains("<b>x</b>"));
    }
}
