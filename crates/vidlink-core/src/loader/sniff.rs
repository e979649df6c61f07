use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    Mp4,
    /// MKV/WebM
    Matroska,
    TransportStream,
}

/// Detect the container from the first bytes of a resource.
pub fn sniff_container(header: &[u8]) -> Option<ContainerFormat> {
    // ISO BMFF: box type at bytes 4..8
    if header.len() >= 8 && matches!(&header[4..8], b"ftyp" | b"moov" | b"free" | b"mdat") {
        return Some(ContainerFormat::Mp4);
    }

    if header.len() >= 4 && header[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return Some(ContainerFormat::Matroska);
    }

    if header.len() > 188 && header[0] == 0x47 && header[188] == 0x47 {
        return Some(ContainerFormat::TransportStream);
    }

    None
}
