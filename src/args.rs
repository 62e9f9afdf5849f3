use anyhow::{Context, Result};
use std::time::Duration;

const USAGE: &str = "Uso: pingone [host] [-t <segundos>] [-s <bytes>] [--dgram] [--strict-checksum]";

/// Alvo usado quando nenhum host é informado.
pub const DEFAULT_TARGET: &str = "1.1.1.1";

pub struct PingArgs {
    pub target: String,
    pub timeout: Option<Duration>,
    pub payload_size: Option<usize>,
    pub dgram: bool,
    pub strict_checksum: bool,
}

pub fn parse() -> Result<PingArgs> {
    parse_from(std::env::args().skip(1))
}

pub fn parse_from<I>(args: I) -> Result<PingArgs>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let mut target = None;
    let mut timeout = None;
    let mut payload_size = None;
    let mut dgram = false;
    let mut strict_checksum = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-t" => {
                let v = args.get(i + 1).context("Faltou o valor para -t")?;
                let secs: f64 = v.parse().context("Valor inválido para -t")?;
                if !secs.is_finite() || secs <= 0.0 {
                    anyhow::bail!("Timeout deve ser positivo");
                }
                timeout = Some(Duration::try_from_secs_f64(secs).context("Timeout grande demais")?);
                i += 1;
            }
            "-s" => {
                let v = args.get(i + 1).context("Faltou o valor para -s")?;
                payload_size = Some(v.parse().context("Valor inválido para -s")?);
                i += 1;
            }
            "--dgram" => dgram = true,
            "--strict-checksum" => strict_checksum = true,
            flag if flag.starts_with('-') => {
                anyhow::bail!("Opção desconhecida {}\n{}", flag, USAGE);
            }
            val => {
                if target.is_none() {
                    target = Some(val.to_string());
                }
            }
        }
        i += 1;
    }

    let target = target.unwrap_or_else(|| DEFAULT_TARGET.to_string());

    Ok(PingArgs {
        target,
        timeout,
        payload_size,
        dgram,
        strict_checksum,
    })
}
