use std::time::Duration;

use crate::args::PingArgs;
use crate::icmp::DEFAULT_PAYLOAD;
use crate::transport::SocketKind;

/// O que fazer com uma resposta cujo checksum não confere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Aceita sem avisar.
    Accept,
    /// Aceita e registra um aviso.
    #[default]
    Warn,
    /// Descarta a troca com `PingError::ChecksumMismatch`.
    Reject,
}

/// Configuração de um ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingConfig {
    /// Tempo máximo de espera pela resposta
    pub timeout: Duration,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
    pub socket: SocketKind,
    /// Cai para socket DGRAM se o RAW for negado
    pub fallback_to_dgram: bool,
    pub checksum_policy: ChecksumPolicy,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
            // Identificador: usa o PID do processo (comum em pings)
            identifier: std::process::id() as u16,
            sequence: 1,
            payload: DEFAULT_PAYLOAD.to_vec(),
            socket: SocketKind::Raw,
            fallback_to_dgram: cfg!(target_os = "linux"),
            checksum_policy: ChecksumPolicy::Warn,
        }
    }
}

impl From<&PingArgs> for PingConfig {
    fn from(args: &PingArgs) -> Self {
        let defaults = Self::default();
        Self {
            timeout: args.timeout.unwrap_or(defaults.timeout),
            payload: args
                .payload_size
                .map(pattern_payload)
                .unwrap_or(defaults.payload),
            socket: if args.dgram {
                SocketKind::Dgram
            } else {
                SocketKind::Raw
            },
            checksum_policy: if args.strict_checksum {
                ChecksumPolicy::Reject
            } else {
                ChecksumPolicy::Warn
            },
            ..defaults
        }
    }
}

/// Payload de `size` bytes repetindo o padrão `abc...wabc...`.
pub fn pattern_payload(size: usize) -> Vec<u8> {
    DEFAULT_PAYLOAD.iter().copied().cycle().take(size).collect()
}
