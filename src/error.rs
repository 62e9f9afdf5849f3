use std::io;
use std::time::Duration;

use thiserror::Error;

/// Falhas de decodificação de um pacote recebido.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedPacket {
    #[error("pacote ICMP curto demais: {0} bytes (mínimo 8)")]
    TooShort(usize),
    #[error("tipo ICMP não suportado: {0}")]
    UnknownType(u8),
    #[error("cabeçalho IPv4 inválido no pacote recebido")]
    BadIpHeader,
}

/// Resultado de uma troca Echo que não produziu tempo de resposta.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("não foi possível resolver {0}")]
    Resolution(String),
    #[error("esgotado o tempo limite ({0:?}) sem resposta")]
    Timeout(Duration),
    #[error("sem permissão para abrir socket ICMP (rode como root ou com CAP_NET_RAW)")]
    Permission(#[source] io::Error),
    #[error("destino inalcançável")]
    Unreachable(#[source] io::Error),
    #[error("erro de transporte: {0}")]
    Transport(#[from] io::Error),
    #[error("resposta malformada: {0}")]
    MalformedReply(#[from] MalformedPacket),
    #[error("checksum da resposta inválido (recebido {stored:#06x}, esperado {computed:#06x})")]
    ChecksumMismatch { stored: u16, computed: u16 },
}

impl PingError {
    /// Falhas "normais" de ping: host não resolvido ou sem resposta.
    pub fn is_no_result(&self) -> bool {
        matches!(self, PingError::Resolution(_) | PingError::Timeout(_))
    }

    /// Classifica um erro de I/O vindo do socket.
    pub(crate) fn from_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            return PingError::Permission(err);
        }
        if is_unreachable(&err) {
            return PingError::Unreachable(err);
        }
        PingError::Transport(err)
    }
}

#[cfg(unix)]
fn is_unreachable(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EHOSTUNREACH) | Some(libc::ENETUNREACH) | Some(libc::ECONNREFUSED)
    )
}

#[cfg(not(unix))]
fn is_unreachable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable
    )
}
