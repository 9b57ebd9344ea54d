use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;

use crate::error::DecodeError;

/// Decodes a base64 image payload.
///
/// Accepts a bare base64 string or a `data:<mime>;base64,` URL. ASCII
/// whitespace is ignored so line-wrapped payloads decode too.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = strip_data_url(payload.trim());
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    Ok(image::load_from_memory(bytes)?)
}

fn strip_data_url(payload: &str) -> &str {
    match payload.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((header, data)) if is_base64_header(header) => data,
            _ => payload,
        },
        None => payload,
    }
}

/// `<mime>;...;base64`, with the marker matched case-insensitively.
fn is_base64_header(header: &str) -> bool {
    header
        .rsplit_once(';')
        .is_some_and(|(_, marker)| marker.eq_ignore_ascii_case("base64"))
}
