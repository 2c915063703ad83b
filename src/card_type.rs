use std::fmt;

/// Card families told apart by their ATQA and SAK
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardType {
    MifareUltralight,
    MifareMini,
    MifareClassic1K,
    MifareClassic4K,
    MifareDesfire,
    MifarePlus,
    MifareUltralightC,
    MifareUltralightEv1,
    NfcForumType2,
    Unknown,
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardType::MifareUltralight => "MIFARE Ultralight",
            CardType::MifareMini => "MIFARE Mini",
            CardType::MifareClassic1K => "MIFARE Classic 1K",
            CardType::MifareClassic4K => "MIFARE Classic 4K",
            CardType::MifareDesfire => "MIFARE DESFire",
            CardType::MifarePlus => "MIFARE Plus",
            CardType::MifareUltralightC => "MIFARE Ultralight C",
            CardType::MifareUltralightEv1 => "MIFARE Ultralight EV1",
            CardType::NfcForumType2 => "NFC Forum Tag Type 2",
            CardType::Unknown => "Unknown card type",
        };

        f.write_str(name)
    }
}

/// Look up the card type from the ATQA bytes as received and the SAK.
///
/// The ATQA is read big-endian, first received byte high. Callers that pack it little-endian,
/// as `atqa[1] << 8 | atqa[0]`, must pass the bytes in received order instead.
pub fn identify(atqa: [u8; 2], sak: u8) -> CardType {
    // Keyed on the ATQA bytes in the order the card sends them
    let atqa = u16::from_be_bytes(atqa);

    match (atqa, sak) {
        (0x4400, 0x04) => CardType::MifareUltralight,
        (0x0400, 0x09) => CardType::MifareMini,
        (0x0400, 0x08) => CardType::MifareClassic1K,
        (0x0200, 0x18) => CardType::MifareClassic4K,
        (0x4403, 0x28) => CardType::MifareDesfire,
        (0x0800, 0x00) | (0x0400, 0x00) => CardType::MifarePlus,
        (0x0400, 0x24) => CardType::MifareUltralightC,
        (0x0400, 0x34) => CardType::MifareUltralightEv1,
        (0x4400, 0x00) => CardType::NfcForumType2,
        _ => CardType::Unknown,
    }
}
