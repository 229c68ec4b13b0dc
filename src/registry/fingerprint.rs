//! Content fingerprinting for change detection.

/// MD5 of `text` as 32 lowercase hex characters.
///
/// The registry compares the same digest on its side, so this is used for
/// change detection only and carries no security meaning.
pub fn fingerprint(text: &str) -> String {
    let digest = format!("{:x}", md5::compute(text.as_bytes()));
    tracing::trace!(fingerprint = %digest, len = text.len(), "Computed content fingerprint");
    digest
}
