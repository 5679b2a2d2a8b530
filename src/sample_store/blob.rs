// BLOB kind prefix helpers. [kind: u8][wincode payload].

pub(super) const BLOB_KIND_SAMPLE: u8 = 1;
pub(super) const BLOB_KIND_WINDOW: u8 = 2;

pub(super) fn with_kind_prefix(kind: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(kind);
    out.extend_from_slice(&payload);
    out
}

/// Payload after the kind byte, or None when the blob holds something else.
pub(super) fn blob_payload(bytes: &[u8], expected_kind: u8) -> Option<&[u8]> {
    match bytes.split_first() {
        Some((kind, payload)) if *kind == expected_kind => Some(payload),
        _ => None,
    }
}

pub(super) fn blob_kind(bytes: &[u8]) -> u8 {
    bytes.first().copied().unwrap_or(0)
}
