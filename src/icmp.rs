//! Mensagem ICMP Echo (RFC 792) e checksum (RFC 1071).
//!
//! ```text
//!  0       1       2               4               6               8
//! +-------+-------+---------------+---------------+---------------+-----
//! | Type  | Code  |   Checksum    |  Identifier   |   Sequence    | Data
//! +-------+-------+---------------+---------------+---------------+-----
//! ```

use std::fmt;
use std::time::Duration;

use crate::error::MalformedPacket;

/// Tamanho fixo do cabeçalho ICMP Echo.
pub const ICMP_HEADER_SIZE: usize = 8;

/// Payload padrão (32 bytes, o mesmo do ping do Windows).
pub const DEFAULT_PAYLOAD: &[u8] = b"abcdefghijklmnopqrstuvwabcdefghi";

/// Tipos ICMP suportados. Qualquer outro é rejeitado na decodificação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EchoType {
    Request = 8,
    Reply = 0,
}

impl TryFrom<u8> for EchoType {
    type Error = MalformedPacket;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(EchoType::Request),
            0 => Ok(EchoType::Reply),
            other => Err(MalformedPacket::UnknownType(other)),
        }
    }
}

/// Calcula o checksum ICMP (RFC 1071).
///
/// Byte final ímpar é somado como se houvesse um zero de preenchimento,
/// que nunca é escrito no buffer.
pub fn checksum(mut data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    while data.len() >= 2 {
        sum = sum.wrapping_add(u16::from_be_bytes([data[0], data[1]]) as u32);
        data = &data[2..];
    }
    if !data.is_empty() {
        sum = sum.wrapping_add((data[0] as u32) << 8);
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Uma mensagem ICMP Echo Request ou Echo Reply.
///
/// `identifier` e `sequence` são `u16`: valores maiores precisam ser
/// convertidos pelo chamador (ex.: `u16::try_from`), que decide entre
/// rejeitar ou truncar. Esta camada nunca trunca em silêncio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoMessage {
    kind: EchoType,
    code: u8,
    checksum: u16,
    identifier: u16,
    sequence: u16,
    payload: Vec<u8>,
    elapsed: Option<Duration>,
}

impl EchoMessage {
    /// Cria a mensagem já com o checksum calculado.
    pub fn new(
        kind: EchoType,
        code: u8,
        identifier: u16,
        sequence: u16,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        let mut msg = Self {
            kind,
            code,
            checksum: 0,
            identifier,
            sequence,
            payload: payload.into(),
            elapsed: None,
        };
        msg.checksum = msg.compute_checksum();
        msg
    }

    /// Echo Request com code 0.
    pub fn request(identifier: u16, sequence: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(EchoType::Request, 0, identifier, sequence, payload)
    }

    pub fn kind(&self) -> EchoType {
        self.kind
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// Checksum armazenado. Em mensagens decodificadas é o valor recebido.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Tempo de ida e volta; só existe em respostas de uma troca concluída.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub(crate) fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Substitui o checksum armazenado (útil para testar respostas corrompidas).
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = checksum;
        self
    }

    /// Cópia com o checksum recalculado a partir dos campos atuais.
    pub fn refreshed(&self) -> Self {
        let mut copy = self.clone();
        copy.checksum = self.compute_checksum();
        copy
    }

    /// Tamanho serializado: cabeçalho + payload.
    pub fn wire_len(&self) -> usize {
        ICMP_HEADER_SIZE + self.payload.len()
    }

    /// Checksum dos campos atuais, ignorando o valor armazenado.
    pub fn compute_checksum(&self) -> u16 {
        checksum(&self.encode_with(0))
    }

    pub fn checksum_is_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    /// Serializa para o formato de rede.
    ///
    /// O checksum escrito é sempre recalculado; `self` não é alterado, então
    /// um checksum sobrescrito via `with_checksum` nunca vai para a rede.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pkt = self.encode_with(0);
        let csum = checksum(&pkt);
        pkt[2..4].copy_from_slice(&csum.to_be_bytes());
        pkt
    }

    /// Decodifica bytes recebidos. O checksum é mantido como veio;
    /// use `checksum_is_valid` para conferir.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, MalformedPacket> {
        if buf.len() < ICMP_HEADER_SIZE {
            return Err(MalformedPacket::TooShort(buf.len()));
        }
        let kind = EchoType::try_from(buf[0])?;

        Ok(Self {
            kind,
            code: buf[1],
            checksum: u16::from_be_bytes([buf[2], buf[3]]),
            identifier: u16::from_be_bytes([buf[4], buf[5]]),
            sequence: u16::from_be_bytes([buf[6], buf[7]]),
            payload: buf[ICMP_HEADER_SIZE..].to_vec(),
            elapsed: None,
        })
    }

    fn encode_with(&self, csum: u16) -> Vec<u8> {
        let mut pkt = Vec::with_capacity(self.wire_len());
        pkt.push(self.kind as u8);
        pkt.push(self.code);
        pkt.extend_from_slice(&csum.to_be_bytes());
        pkt.extend_from_slice(&self.identifier.to_be_bytes());
        pkt.extend_from_slice(&self.sequence.to_be_bytes());
        pkt.extend_from_slice(&self.payload);
        pkt
    }
}

impl Default for EchoMessage {
    fn default() -> Self {
        Self::request(1, 1, DEFAULT_PAYLOAD)
    }
}

impl fmt::Display for EchoMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} code={} checksum={:#06x} ({}) id={} seq={} data=",
            self.kind,
            self.code,
            self.checksum,
            if self.checksum_is_valid() { "ok" } else { "inválido" },
            self.identifier,
            self.sequence,
        )?;
        for (i, b) in self.payload.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
