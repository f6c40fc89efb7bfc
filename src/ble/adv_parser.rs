//! Advertising data parsing for the hub scan.

use heapless::String;

/// AD types carrying incomplete / complete lists of 16-bit service UUIDs.
const AD_UUID16_INCOMPLETE: u8 = 0x02;
const AD_UUID16_COMPLETE: u8 = 0x03;

/// Check if raw advertisement data lists the 16-bit service `uuid`.
pub fn contains_service_uuid(data: &[u8], uuid: u16) -> bool {
    let uuid_le = uuid.to_le_bytes();

    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if ad_type == AD_UUID16_INCOMPLETE || ad_type == AD_UUID16_COMPLETE {
            let uuid_data = &data[i + 2..i + 1 + len];
            if uuid_data.chunks_exact(2).any(|chunk| chunk == uuid_le) {
                return true;
            }
        }
        i += len + 1;
    }
    false
}

/// Extract complete/shortened local name from advertisement data.
///
/// Only used for logging which hub answered.
pub fn extract_device_name(data: &[u8]) -> Option<String<32>> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        let ad_type = data[i + 1];
        if ad_type == 0x08 || ad_type == 0x09 {
            let mut name = String::new();
            for &b in &data[i + 2..i + 1 + len] {
                if name.push(b as char).is_err() {
                    break;
                }
            }
            return Some(name);
        }
        i += len + 1;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
