//! DNS Probe Module
//!
//! This module asks one nameserver for the address of one domain over UDP and
//! reduces the outcome to PASS or FAIL. IPv4 nameservers are asked for an A
//! record, IPv6 nameservers for AAAA. Messages are built and decoded with
//! `hickory-proto`.
use crate::error::{GeoError, Result};
use crate::models::ProbeStatus;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use log::{debug, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

const MAX_PACKET_SIZE: usize = 4096;

/// Builds a recursive query for `fqdn` with a single question.
pub fn build_query(id: u16, fqdn: &str, qtype: RecordType) -> Result<Vec<u8>> {
    let invalid = || GeoError::Config(format!("Invalid domain name: {:?}", fqdn));

    let trimmed = fqdn.trim_end_matches('.');
    if trimmed.is_empty() || trimmed.split('.').any(|l| l.is_empty() || l.len() > 63) {
        return Err(invalid());
    }
    let mut name = Name::from_ascii(trimmed).map_err(|_| invalid())?;
    name.set_fqdn(true);

    let mut message = Message::new();
    message.set_id(id);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(Query::query(name, qtype));

    message
        .to_bytes()
        .map_err(|e| GeoError::Network(format!("cannot encode query: {}", e)))
}

/// Why a reply did not count as a successful answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    Malformed,
    Truncated,
    WrongId,
    NotAResponse,
    Rcode(ResponseCode),
    NoAnswer,
}

/// Checks that `reply` answers query `id` with NOERROR and at least one record.
pub fn check_reply(id: u16, reply: &[u8]) -> std::result::Result<(), ReplyError> {
    let message = Message::from_vec(reply).map_err(|_| ReplyError::Malformed)?;
    let header = message.header();

    if header.id() != id {
        return Err(ReplyError::WrongId);
    }
    if header.message_type() != MessageType::Response {
        return Err(ReplyError::NotAResponse);
    }
    if header.truncated() {
        return Err(ReplyError::Truncated);
    }
    if header.response_code() != ResponseCode::NoError {
        return Err(ReplyError::Rcode(header.response_code()));
    }
    if message.answers().is_empty() {
        return Err(ReplyError::NoAnswer);
    }
    Ok(())
}

async fn exchange(nameserver: SocketAddr, fqdn: &str) -> Result<()> {
    let (bind, qtype) = if nameserver.is_ipv6() {
        ("[::]:0", RecordType::AAAA)
    } else {
        ("0.0.0.0:0", RecordType::A)
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(nameserver).await?;

    let id: u16 = rand::random();
    let query = build_query(id, fqdn, qtype)?;
    socket.send(&query).await?;

    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    loop {
        let size = socket.recv(&mut buf).await?;
        match check_reply(id, &buf[..size]) {
            Ok(()) => return Ok(()),
            // Stray datagram from an earlier query; keep waiting.
            Err(ReplyError::WrongId) => continue,
            Err(e) => return Err(GeoError::Network(format!("{:?}", e))),
        }
    }
}

/// Probes `nameserver` for `fqdn`, giving up after `timeout`.
pub async fn probe(nameserver: SocketAddr, fqdn: &str, timeout: Duration) -> ProbeStatus {
    match tokio::time::timeout(timeout, exchange(nameserver, fqdn)).await {
        Ok(Ok(())) => {
            debug!("{} answered for {}", nameserver, fqdn);
            ProbeStatus::Pass
        }
        Ok(Err(e)) => {
            warn!("{} failed for {}: {}", nameserver, fqdn, e);
            ProbeStatus::Fail
        }
        Err(_) => {
            warn!("{} timed out for {} after {:?}", nameserver, fqdn, timeout);
            ProbeStatus::Fail
        }
    }
}
