/// Tests for the DNS health checker.
///
/// A tiny UDP responder on the loopback interface stands in for a nameserver:
/// - A server that answers makes the probe pass,
/// - A server that answers NXDOMAIN makes it fail,
/// - A server that never answers fails after the timeout,
/// - A full run renders a report and logs every probe.
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

#[cfg(test)]
mod tests {
    use super::*;
    use geocache::check_log::CheckLog;
    use geocache::dns_probe::probe;
    use geocache::dns_report::run_checks;
    use geocache::models::ProbeStatus;
    use geocache::DnsCheckConfig;

    /// Answers every query with `code`, echoing the question and adding one
    /// A record when the code is NOERROR.
    async fn responder(code: ResponseCode) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((size, peer)) = socket.recv_from(&mut buf).await {
                let Ok(query) = Message::from_bytes(&buf[..size]) else {
                    continue;
                };
                let mut response = Message::new();
                response.set_id(query.id());
                response.set_message_type(MessageType::Response);
                response.set_response_code(code);
                if let Some(q) = query.queries().first() {
                    response.add_query(q.clone());
                    if code == ResponseCode::NoError {
                        let mut record = Record::new();
                        record.set_name(q.name().clone());
                        record.set_ttl(300);
                        record.set_record_type(RecordType::A);
                        record.set_data(Some(RData::A(A(Ipv4Addr::new(192, 0, 2, 10)))));
                        response.add_answer(record);
                    }
                }
                if let Ok(bytes) = response.to_bytes() {
                    let _ = socket.send_to(&bytes, peer).await;
                }
            }
        });
        addr
    }

    /// Receives queries and never replies.
    async fn black_hole() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while socket.recv_from(&mut buf).await.is_ok() {}
        });
        addr
    }

    #[tokio::test]
    async fn test_probe_passes_on_answer() {
        let addr = responder(ResponseCode::NoError).await;
        let status = probe(addr, "example.com", Duration::from_secs(2)).await;
        assert_eq!(status, ProbeStatus::Pass);
    }

    #[tokio::test]
    async fn test_probe_fails_on_nxdomain() {
        let addr = responder(ResponseCode::NXDomain).await;
        let status = probe(addr, "missing.example.com", Duration::from_secs(2)).await;
        assert_eq!(status, ProbeStatus::Fail);
    }

    #[tokio::test]
    async fn test_probe_fails_on_timeout() {
        let addr = black_hole().await;
        let status = probe(addr, "example.com", Duration::from_millis(200)).await;
        assert_eq!(status, ProbeStatus::Fail);
    }

    #[tokio::test]
    async fn test_full_run() {
        let good = responder(ResponseCode::NoError).await;
        let silent = black_hole().await;
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("dns.db");

        let config = DnsCheckConfig::from_json(
            &serde_json::json!({
                "company": "Acme",
                "nameservers": [good.to_string(), silent.to_string()],
                "domains": ["example.com", "example.org"],
                "database": db,
                "timeout": 1
            })
            .to_string(),
        )
        .unwrap();

        let report = run_checks(&config).await.unwrap();
        assert!(report.failed());
        assert_eq!(report.checks.len(), 2);
        for check in &report.checks {
            assert_eq!(check.status_for(&good.to_string()), Some(ProbeStatus::Pass));
            assert_eq!(check.status_for(&silent.to_string()), Some(ProbeStatus::Fail));
            assert_eq!(check.overall, ProbeStatus::Fail);
        }
        assert!(report.subject().starts_with("[FAIL] - Acme"));
        assert!(report.to_html().contains(&format!("<th>{}</th>", good)));

        let mut log = CheckLog::open(&db).unwrap();
        assert_eq!(log.record(&report).unwrap(), 4);
        assert_eq!(log.recent(10).unwrap().len(), 4);
    }
}
