// Tratamento de erros ergonômico
use anyhow::{Context, Result};

use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pingone::{PingConfig, args, ping_with};

/// Envia um Echo Request e aguarda o Echo Reply.
/// Socket RAW requer root/CAP_NET_RAW; no Linux cai para ICMP DGRAM.
fn main() -> Result<ExitCode> {
    // Logs em stderr, nível via RUST_LOG (padrão: warn)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = args::parse()?;
    let config = PingConfig::from(&args);

    println!(
        "Disparando {} com {} bytes de dados:",
        args.target,
        config.payload.len()
    );

    match ping_with(&args.target, &config) {
        Ok(rtt) => {
            println!("{}", reply_line(&args.target, rtt));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_no_result() => {
            println!("{}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).with_context(|| format!("Falha ao pingar {}", args.target)),
    }
}

/// Linha exibida quando chega o Echo Reply.
fn reply_line(target: &str, rtt: Duration) -> String {
    format!("Resposta de {}: tempo={:.2}ms", target, rtt.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_line() {
        assert_eq!(
            reply_line("1.1.1.1", Duration::from_micros(12_340)),
            "Resposta de 1.1.1.1: tempo=12.34ms"
        );
    }
}
