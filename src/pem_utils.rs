/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Convert a PEM‑encoded string to DER‑encoded bytes.
pub fn pem_to_der(pem_str: &str) -> Result<Vec<u8>, pem::PemError> {
    let pem = pem::parse(pem_str)?;
    Ok(pem.contents().to_vec())
}

/// Parse every PEM block carrying `label` out of a concatenated file, in order.
pub fn pem_blocks(pem_str: &str, label: &str) -> Result<Vec<Vec<u8>>, pem::PemError> {
    Ok(pem::parse_many(pem_str)?
        .into_iter()
        .filter(|block| block.tag() == label)
        .map(|block| block.contents().to_vec())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenated_blocks_keep_order() {
        let chain = format!(
            "{}{}",
            der_to_pem(&[1, 2, 3], "CERTIFICATE"),
            der_to_pem(&[4, 5], "CERTIFICATE")
        );
        assert!(!chain.contains('\r'));
        let blocks = pem_blocks(&chain, "CERTIFICATE").unwrap();
        assert_eq!(blocks, vec![vec![1, 2, 3], vec![4, 5]]);
        assert_eq!(pem_to_der(&chain).unwrap(), vec![1, 2, 3]);
    }
}
