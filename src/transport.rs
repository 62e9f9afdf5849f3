// Criação e configuração de sockets de baixo nível
use socket2::{Domain, Protocol, Socket, Type};

use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::PingError;

/// Contrato do socket ICMP em uso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketKind {
    /// SOCK_RAW: exige privilégio; o recv inclui o cabeçalho IPv4.
    #[default]
    Raw,
    /// SOCK_DGRAM + IPPROTO_ICMP (Linux/macOS sem root): o recv entrega só o
    /// ICMP e o kernel reescreve o identifier.
    Dgram,
}

impl SocketKind {
    pub fn includes_ip_header(self) -> bool {
        matches!(self, SocketKind::Raw)
    }

    fn socket_type(self) -> Type {
        match self {
            // SOCK_RAW é 3 em todas as plataformas suportadas.
            SocketKind::Raw => Type::from(3),
            SocketKind::Dgram => Type::DGRAM,
        }
    }
}

/// Capacidade de rede usada por uma sessão Echo: um socket já conectado
/// ao destino.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn kind(&self) -> SocketKind;

    /// Envia o buffer; pode aceitar só parte dele.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Bloqueia até chegar um pacote ou até `timeout`, quando retorna
    /// `WouldBlock` ou `TimedOut`.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// Socket ICMPv4. Fechado automaticamente no drop.
#[derive(Debug)]
pub struct IcmpSocket {
    socket: Socket,
    kind: SocketKind,
}

impl IcmpSocket {
    pub fn open(kind: SocketKind) -> Result<Self, PingError> {
        let socket = Socket::new(Domain::IPV4, kind.socket_type(), Some(Protocol::ICMPV4))
            .map_err(PingError::from_io)?;
        socket.set_nonblocking(false).map_err(PingError::from_io)?;
        tracing::debug!(?kind, "socket ICMP aberto");
        Ok(Self { socket, kind })
    }

    /// Tenta `kind`; se um socket RAW for negado por falta de privilégio e
    /// `fallback` estiver ligado, tenta um socket ICMP não privilegiado.
    pub fn open_with_fallback(kind: SocketKind, fallback: bool) -> Result<Self, PingError> {
        match Self::open(kind) {
            Err(PingError::Permission(denied)) if fallback && kind == SocketKind::Raw => {
                tracing::warn!("socket RAW negado ({denied}); usando socket ICMP não privilegiado");
                Self::open(SocketKind::Dgram).map_err(|_| PingError::Permission(denied))
            }
            other => other,
        }
    }

    /// Fixa o par remoto (porta 0 é ignorada para ICMP).
    pub fn connect(&self, dst: Ipv4Addr) -> Result<(), PingError> {
        let addr = SocketAddr::new(IpAddr::V4(dst), 0);
        self.socket.connect(&addr.into()).map_err(PingError::from_io)
    }
}

impl Transport for IcmpSocket {
    fn kind(&self) -> SocketKind {
        self.kind
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        // set_read_timeout rejeita duração zero
        if timeout.is_zero() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        self.socket.set_read_timeout(Some(read_timeout(timeout)))?;
        self.socket.read(buf)
    }
}

/// SO_RCVTIMEO tem resolução de microssegundos e `{0, 0}` significa
/// "sem timeout": valores abaixo de 1µs viram 1µs.
fn read_timeout(timeout: Duration) -> Duration {
    timeout.max(Duration::from_micros(1))
}

impl Drop for IcmpSocket {
    fn drop(&mut self) {
        tracing::trace!(kind = ?self.kind, "fechando socket ICMP");
    }
}

/// Resolve um IPv4 literal ou nome de host para o primeiro endereço IPv4.
pub fn resolve(target: &str) -> Result<Ipv4Addr, PingError> {
    if let Ok(ip) = target.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    (target, 0)
        .to_socket_addrs()
        .ok()
        .into_iter()
        .flatten()
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| PingError::Resolution(target.to_string()))
}
