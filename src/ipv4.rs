use crate::error::MalformedPacket;

/// Menor cabeçalho IPv4 possível (IHL = 5, sem opções).
pub const MIN_HEADER_LEN: usize = 20;

/// Tamanho do cabeçalho IPv4 no início de `buf`, lido do campo IHL.
///
/// Sockets RAW entregam o datagrama completo; com opções IP o cabeçalho
/// passa de 20 bytes, por isso o valor nunca é fixo.
pub fn header_len(buf: &[u8]) -> Result<usize, MalformedPacket> {
    let first = *buf.first().ok_or(MalformedPacket::BadIpHeader)?;
    if first >> 4 != 4 {
        return Err(MalformedPacket::BadIpHeader);
    }
    let ihl = (first & 0x0F) as usize * 4;
    if ihl < MIN_HEADER_LEN || buf.len() < ihl {
        return Err(MalformedPacket::BadIpHeader);
    }
    Ok(ihl)
}
