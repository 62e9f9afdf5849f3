//! Ping de um único Echo Request ICMPv4 sobre socket RAW.
//!
//! ```no_run
//! match pingone::ping("1.1.1.1") {
//!     Some(rtt) => println!("{:.2}ms", rtt.as_secs_f64() * 1000.0),
//!     None => println!("sem resposta"),
//! }
//! ```

use std::time::Duration;

pub mod args;
pub mod config;
pub mod error;
pub mod icmp;
pub mod ipv4;
pub mod session;
pub mod transport;

pub use config::{ChecksumPolicy, PingConfig};
pub use error::{MalformedPacket, PingError};
pub use icmp::{EchoMessage, EchoType};
pub use session::EchoSession;
pub use transport::{SocketKind, Transport};

/// Envia um Echo Request com a configuração padrão e devolve o RTT,
/// ou `None` se o ping falhou por qualquer motivo.
pub fn ping(target: &str) -> Option<Duration> {
    match ping_with(target, &PingConfig::default()) {
        Ok(rtt) => Some(rtt),
        Err(e) => {
            tracing::debug!(host = target, error = %e, "ping sem resultado");
            None
        }
    }
}

/// Como `ping`, mas informa o motivo da falha.
pub fn ping_with(target: &str, config: &PingConfig) -> Result<Duration, PingError> {
    let request = EchoMessage::request(config.identifier, config.sequence, config.payload.clone());
    let reply = EchoSession::new(config).exchange(target, &request, config.timeout)?;
    Ok(reply.elapsed().unwrap_or_default())
}
