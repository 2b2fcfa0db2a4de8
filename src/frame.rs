use crate::crc::sensirion_crc8;
use crate::{FRAME_LEN, SCD40Error, SCD40Reading, SubField};

/// Word layout of the measurement frame: (field, payload offset, checksum offset).
/// Checked in this order, stopping at the first mismatch.
const SUB_FIELDS: [(SubField, usize, usize); 3] = [
    (SubField::Co2, 0, 2),
    (SubField::Temperature, 3, 5),
    (SubField::Humidity, 6, 8),
];

/// Returns the big-endian word at `payload` if its CRC matches the byte at
/// `checksum`.
pub(crate) fn checked_word(buf: &[u8], payload: usize, checksum: usize) -> Option<u16> {
    let word = [buf[payload], buf[payload + 1]];
    if sensirion_crc8(&word) != buf[checksum] {
        return None;
    }
    Some(u16::from_be_bytes(word))
}

/// Validates the three words of a raw measurement frame and converts them.
pub fn parse_frame(frame: &[u8; FRAME_LEN]) -> Result<SCD40Reading, SCD40Error> {
    let mut words = [0u16; 3];
    for (word, &(field, payload, checksum)) in words.iter_mut().zip(SUB_FIELDS.iter()) {
        *word = match checked_word(frame, payload, checksum) {
            Some(value) => value,
            None => {
                warn!("CRC mismatch in {:?} word", field);
                return Err(SCD40Error::Checksum(field));
            }
        };
    }
    let [raw_co2, raw_temp, raw_humi] = words;

    Ok(SCD40Reading {
        co2_ppm: raw_co2,
        temperature_c: temperature_from_raw(raw_temp),
        humidity_percent: humidity_from_raw(raw_humi),
    })
}

/// T [°C] = -45 + 175 * raw / 2^16
pub fn temperature_from_raw(raw: u16) -> f32 {
    -45.0 + 175.0 * raw as f32 / 65536.0
}

/// RH [%] = 100 * raw / 2^16
pub fn humidity_from_raw(raw: u16) -> f32 {
    100.0 * raw as f32 / 65536.0
}
