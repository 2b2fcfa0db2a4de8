const CRC8_POLYNOMIAL: u8 = 0x31;
const CRC8_INIT: u8 = 0xFF;

/// Sensirion CRC-8: polynomial `0x31`, init `0xFF`, MSB first, no final XOR.
#[inline]
pub fn sensirion_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = CRC8_INIT;

    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            crc = if (crc & 0x80) != 0 {
                (crc << 1) ^ CRC8_POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }

    crc
}
