//! Uma troca Echo Request -> Echo Reply com um destino.

use std::io;
use std::time::{Duration, Instant};

use crate::config::{ChecksumPolicy, PingConfig};
use crate::error::PingError;
use crate::icmp::{EchoMessage, EchoType};
use crate::ipv4;
use crate::transport::{self, IcmpSocket, SocketKind, Transport};

/// Buffer de recepção: comporta qualquer datagrama IPv4.
pub const RECV_BUFFER_SIZE: usize = 65536;

/// Fatia de espera quando `timeout` não cabe num `Instant`.
const UNBOUNDED_WAIT: Duration = Duration::from_secs(3600);

/// Executa exatamente uma tentativa por chamada, sem retransmissão.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoSession {
    socket: SocketKind,
    fallback_to_dgram: bool,
    checksum_policy: ChecksumPolicy,
}

impl EchoSession {
    pub fn new(config: &PingConfig) -> Self {
        Self {
            socket: config.socket,
            fallback_to_dgram: config.fallback_to_dgram,
            checksum_policy: config.checksum_policy,
        }
    }

    /// Resolve o destino, abre um socket só para esta troca e aguarda a
    /// resposta por até `timeout`. O socket é fechado em qualquer saída.
    pub fn exchange(
        &self,
        destination: &str,
        request: &EchoMessage,
        timeout: Duration,
    ) -> Result<EchoMessage, PingError> {
        let dst = transport::resolve(destination)?;
        let mut socket = IcmpSocket::open_with_fallback(self.socket, self.fallback_to_dgram)?;
        socket.connect(dst)?;
        tracing::debug!(%dst, "destino conectado");
        self.exchange_over(&mut socket, request, timeout)
    }

    /// Troca sobre um transporte já conectado.
    pub fn exchange_over<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        request: &EchoMessage,
        timeout: Duration,
    ) -> Result<EchoMessage, PingError> {
        if request.kind() != EchoType::Request {
            tracing::warn!(kind = ?request.kind(), "enviando mensagem que não é Echo Request");
        }
        let pkt = request.to_bytes();
        let kind = transport.kind();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        // Janela de tempo: só envio e recepção
        let start = Instant::now();
        send_all(transport, &pkt)?;
        // Timeout gigante (ex.: Duration::MAX) transborda o Instant: espera sem prazo
        let deadline = start.checked_add(timeout);

        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => UNBOUNDED_WAIT,
            };
            if remaining.is_zero() {
                return Err(PingError::Timeout(timeout));
            }

            let n = match transport.recv(&mut buf, remaining) {
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(PingError::from_io(e)),
            };
            let end = Instant::now();

            let start_of_icmp = if kind.includes_ip_header() {
                ipv4::header_len(&buf[..n])?
            } else {
                0
            };
            let reply = EchoMessage::from_bytes(&buf[start_of_icmp..n])?;

            if !answers(&reply, request, kind) {
                tracing::trace!(
                    kind = ?reply.kind(),
                    id = reply.identifier(),
                    seq = reply.sequence(),
                    "pacote ICMP de outra origem descartado"
                );
                continue;
            }

            if !reply.checksum_is_valid() {
                let stored = reply.checksum();
                let computed = reply.compute_checksum();
                match self.checksum_policy {
                    ChecksumPolicy::Accept => {}
                    ChecksumPolicy::Warn => tracing::warn!(
                        "checksum da resposta inválido: {stored:#06x} != {computed:#06x}"
                    ),
                    ChecksumPolicy::Reject => {
                        return Err(PingError::ChecksumMismatch { stored, computed });
                    }
                }
            }

            let elapsed = end - start;
            tracing::debug!(bytes = n - start_of_icmp, ?elapsed, "Echo Reply recebido");
            return Ok(reply.with_elapsed(elapsed));
        }
    }
}

/// Envia o pacote inteiro, repetindo o restante se o envio for parcial.
fn send_all<T: Transport + ?Sized>(transport: &mut T, mut pkt: &[u8]) -> Result<(), PingError> {
    while !pkt.is_empty() {
        match transport.send(pkt) {
            Ok(0) => return Err(PingError::Transport(io::ErrorKind::WriteZero.into())),
            Ok(n) => pkt = &pkt[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(PingError::from_io(e)),
        }
    }
    Ok(())
}

/// Em sockets DGRAM o kernel troca o identifier, então só a sequência conta.
fn answers(reply: &EchoMessage, request: &EchoMessage, kind: SocketKind) -> bool {
    reply.kind() == EchoType::Reply
        && reply.sequence() == request.sequence()
        && (kind == SocketKind::Dgram || reply.identifier() == request.identifier())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MalformedPacket;
    use crate::icmp::DEFAULT_PAYLOAD;
    use crate::transport::MockTransport;

    use std::sync::{Arc, Mutex};

    fn request() -> EchoMessage {
        EchoMessage::request(0x4242, 1, DEFAULT_PAYLOAD)
    }

    fn reply_bytes(id: u16, seq: u16) -> Vec<u8> {
        EchoMessage::new(EchoType::Reply, 0, id, seq, DEFAULT_PAYLOAD).to_bytes()
    }

    fn with_ip_header(icmp: &[u8], ihl_words: u8) -> Vec<u8> {
        let mut pkt = vec![0u8; ihl_words as usize * 4];
        pkt[0] = 0x40 | ihl_words;
        pkt[9] = 1;
        pkt.extend_from_slice(icmp);
        pkt
    }

    /// Mock que entrega os pacotes na ordem dada e depois fica em silêncio.
    fn mock_delivering(kind: SocketKind, packets: Vec<Vec<u8>>) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_kind().return_const(kind);
        mock.expect_send().times(1).returning(|buf| Ok(buf.len()));
        let queue = Arc::new(Mutex::new(packets));
        mock.expect_recv().returning(move |buf, timeout| {
            let mut queue = queue.lock().unwrap();
            if queue.is_empty() {
                std::thread::sleep(timeout);
                return Err(io::ErrorKind::TimedOut.into());
            }
            let pkt = queue.remove(0);
            buf[..pkt.len()].copy_from_slice(&pkt);
            Ok(pkt.len())
        });
        mock
    }

    #[test]
    fn test_raw_reply_strips_ip_header() {
        let mut mock = mock_delivering(
            SocketKind::Raw,
            vec![with_ip_header(&reply_bytes(0x4242, 1), 5)],
        );
        let reply = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply.kind(), EchoType::Reply);
        assert_eq!(reply.identifier(), 0x4242);
        assert_eq!(reply.payload(), DEFAULT_PAYLOAD);
        assert!(reply.elapsed().is_some());
    }

    #[test]
    fn test_raw_reply_with_ip_options() {
        let mut mock = mock_delivering(
            SocketKind::Raw,
            vec![with_ip_header(&reply_bytes(0x4242, 1), 7)],
        );
        let reply = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply.payload(), DEFAULT_PAYLOAD);
        assert!(reply.checksum_is_valid());
    }

    #[test]
    fn test_dgram_reply_has_no_ip_header() {
        // Kernel reescreveu o identifier
        let mut mock = mock_delivering(SocketKind::Dgram, vec![reply_bytes(0x0007, 1)]);
        let reply = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply.sequence(), 1);
        assert_eq!(reply.identifier(), 0x0007);
    }

    #[test]
    fn test_skips_unrelated_packets() {
        let own_request = with_ip_header(&request().to_bytes(), 5);
        let other_session = with_ip_header(&reply_bytes(0x9999, 1), 5);
        let ours = with_ip_header(&reply_bytes(0x4242, 1), 5);
        let mut mock = mock_delivering(SocketKind::Raw, vec![own_request, other_session, ours]);
        let reply = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply.identifier(), 0x4242);
    }

    #[test]
    fn test_timeout_when_nothing_arrives() {
        let mut mock = mock_delivering(SocketKind::Raw, Vec::new());
        let timeout = Duration::from_millis(200);
        let started = Instant::now();
        let err = EchoSession::default()
            .exchange_over(&mut mock, &request(), timeout)
            .unwrap_err();
        let waited = started.elapsed();
        assert!(matches!(err, PingError::Timeout(t) if t == timeout));
        assert!(err.is_no_result());
        assert!(waited >= timeout, "returned too early: {waited:?}");
        assert!(waited < timeout + Duration::from_secs(2), "hung: {waited:?}");
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let mut mock = mock_delivering(
            SocketKind::Raw,
            vec![with_ip_header(&reply_bytes(0x4242, 1), 5)],
        );
        let reply = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::MAX)
            .unwrap();
        assert_eq!(reply.sequence(), 1);
    }

    #[test]
    fn test_partial_send_is_completed() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let mut mock = MockTransport::new();
        mock.expect_kind().return_const(SocketKind::Dgram);
        mock.expect_send().times(3).returning(move |buf| {
            let n = buf.len().min(16);
            sink.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        });
        let reply = reply_bytes(0x4242, 1);
        mock.expect_recv().returning(move |buf, _| {
            buf[..reply.len()].copy_from_slice(&reply);
            Ok(reply.len())
        });

        EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap();
        assert_eq!(*sent.lock().unwrap(), request().to_bytes());
    }

    #[test]
    fn test_transport_error_is_not_timeout() {
        let mut mock = MockTransport::new();
        mock.expect_kind().return_const(SocketKind::Raw);
        mock.expect_send()
            .returning(|_| Err(io::ErrorKind::PermissionDenied.into()));
        mock.expect_recv().never();
        let err = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, PingError::Permission(_)));
        assert!(!err.is_no_result());
    }

    #[test]
    fn test_garbled_reply_is_reported() {
        let mut mock = mock_delivering(SocketKind::Raw, vec![with_ip_header(&[0, 0, 0], 5)]);
        let err = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(
            err,
            PingError::MalformedReply(MalformedPacket::TooShort(3))
        ));
    }

    fn corrupted_reply() -> Vec<u8> {
        let mut icmp = reply_bytes(0x4242, 1);
        icmp[20] ^= 0x01;
        with_ip_header(&icmp, 5)
    }

    #[test]
    fn test_bad_checksum_accepted_by_default() {
        let mut mock = mock_delivering(SocketKind::Raw, vec![corrupted_reply()]);
        let reply = EchoSession::default()
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap();
        assert!(!reply.checksum_is_valid());
    }

    #[test]
    fn test_bad_checksum_rejected_when_strict() {
        let config = PingConfig {
            checksum_policy: ChecksumPolicy::Reject,
            ..PingConfig::default()
        };
        let mut mock = mock_delivering(SocketKind::Raw, vec![corrupted_reply()]);
        let err = EchoSession::new(&config)
            .exchange_over(&mut mock, &request(), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, PingError::ChecksumMismatch { .. }));
    }
}
