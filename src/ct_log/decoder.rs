// src/ct_log/decoder.rs
//! RFC 6962 `MerkleTreeLeaf` framing and X.509 field extraction.
//!
//! Pure and synchronous: no I/O, no shared state. A decode failure at any
//! point yields `None` rather than propagating, so a single malformed
//! entry can never take down a poller.

use base64::Engine;
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_parser::certificate::TbsCertificate;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

use crate::record::{ChainEntry, LeafCert, LogDescriptor, Record};

const X509_ENTRY: u16 = 0;
const PRECERT_ENTRY: u16 = 1;

/// A single raw `get-entries` row, still base64-encoded.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub leaf_input: String,
    pub extra_data: String,
}

/// Stateless decoder from raw CT log bytes to a [`Record`].
pub struct LeafDecoder;

impl LeafDecoder {
    /// Decodes one log entry. Returns `None` on any malformed input;
    /// the caller logs nothing further, since failures are already
    /// logged here at debug severity.
    pub fn decode(raw: &RawEntry, src: &LogDescriptor, idx: u64, seen_at: f64) -> Option<Record> {
        let leaf_bytes = base64::engine::general_purpose::STANDARD
            .decode(&raw.leaf_input)
            .map_err(|e| debug!("leaf_input base64 decode failed: {}", e))
            .ok()?;
        let extra_bytes = base64::engine::general_purpose::STANDARD
            .decode(&raw.extra_data)
            .map_err(|e| debug!("extra_data base64 decode failed: {}", e))
            .ok()?;

        let (leaf_der, is_precert) = Self::extract_leaf_der(&leaf_bytes)?;

        let leaf = if is_precert {
            Self::decode_precert_leaf(leaf_der, idx)
        } else {
            Self::decode_x509_leaf(leaf_der, idx)?
        };

        let chain = if is_precert {
            Vec::new()
        } else {
            Self::decode_chain(&extra_bytes)
        };

        Some(Record { source: src.clone(), cert_index: idx, seen_at, leaf, chain, is_precert })
    }

    /// Decodes a full X509Entry leaf (a signed `Certificate` SEQUENCE). A
    /// parse failure here means the entry itself is malformed.
    fn decode_x509_leaf(leaf_der: &[u8], idx: u64) -> Option<LeafCert> {
        match X509Certificate::from_der(leaf_der) {
            Ok((_, cert)) => Some(Self::leaf_cert_from(&cert, leaf_der)),
            Err(e) => {
                debug!("failed to parse leaf DER at index {}: {:?}", idx, e);
                None
            }
        }
    }

    /// Decodes a PrecertEntry leaf, which carries a bare `TBSCertificate`
    /// rather than a full signed `Certificate` — `X509Certificate::from_der`
    /// cannot parse it, `TbsCertificate::from_der` can. If even that fails
    /// (extensions or fields x509-parser can't model), the record is still
    /// emitted with the raw TBS bytes and empty derived fields rather than
    /// dropped: a precertificate is a large fraction of the CT stream, and
    /// silently discarding it is worse than an incomplete record.
    fn decode_precert_leaf(leaf_der: &[u8], idx: u64) -> LeafCert {
        match TbsCertificate::from_der(leaf_der) {
            Ok((_, tbs)) => Self::leaf_cert_from(&tbs, leaf_der),
            Err(e) => {
                debug!("failed to parse precert TBS at index {}: {:?}", idx, e);
                let mut hasher = Sha256::new();
                hasher.update(leaf_der);
                LeafCert {
                    subject: IndexMap::new(),
                    extensions: IndexMap::new(),
                    not_before: 0.0,
                    not_after: 0.0,
                    serial_number: String::new(),
                    fingerprint: hex::encode(hasher.finalize()),
                    all_domains: Vec::new(),
                    as_der: Some(base64::engine::general_purpose::STANDARD.encode(leaf_der)),
                }
            }
        }
    }

    /// Shared field extraction. `X509Certificate` derefs to `TbsCertificate`,
    /// so this accepts either a fully parsed certificate or a bare TBS.
    fn leaf_cert_from(cert: &TbsCertificate, leaf_der: &[u8]) -> LeafCert {
        let fingerprint = {
            let mut hasher = Sha256::new();
            hasher.update(leaf_der);
            hex::encode(hasher.finalize())
        };

        let subject = Self::dn_to_map(cert.subject());
        let extensions = Self::extract_extensions(cert);
        let all_domains = Self::extract_all_domains(cert, &subject);
        let serial_number = cert.raw_serial_as_string().replace(':', "");
        let serial_number = num_bigint::BigUint::parse_bytes(serial_number.as_bytes(), 16)
            .map(|n| n.to_string())
            .unwrap_or(serial_number);
        let not_before = cert.validity().not_before.timestamp() as f64;
        let not_after = cert.validity().not_after.timestamp() as f64;

        LeafCert {
            subject,
            extensions,
            not_before,
            not_after,
            serial_number,
            fingerprint,
            all_domains,
            as_der: Some(base64::engine::general_purpose::STANDARD.encode(leaf_der)),
        }
    }

    /// Splits a MerkleTreeLeaf into `(cert_der, is_precert)`.
    fn extract_leaf_der(leaf_bytes: &[u8]) -> Option<(&[u8], bool)> {
        if leaf_bytes.len() < 12 {
            return None;
        }
        let entry_type = u16::from_be_bytes([leaf_bytes[10], leaf_bytes[11]]);

        match entry_type {
            t if t == X509_ENTRY => {
                let (len, start) = read_u24_len(leaf_bytes, 12)?;
                let end = start.checked_add(len)?;
                if end > leaf_bytes.len() {
                    return None;
                }
                Some((&leaf_bytes[start..end], false))
            }
            t if t == PRECERT_ENTRY => {
                // 32-byte issuer_key_hash at offset 12, TBS length+bytes at offset 44.
                if leaf_bytes.len() < 44 {
                    return None;
                }
                let (len, start) = read_u24_len(leaf_bytes, 44)?;
                let end = start.checked_add(len)?;
                if end > leaf_bytes.len() {
                    return None;
                }
                Some((&leaf_bytes[start..end], true))
            }
            other => {
                debug!("unknown MerkleTreeLeaf entry_type {}", other);
                None
            }
        }
    }

    /// Walks the `ASN.1-CertificateChain` structure in `extra_data`:
    /// a 24-bit total length followed by (24-bit length, DER) tuples.
    fn decode_chain(extra_bytes: &[u8]) -> Vec<ChainEntry> {
        let mut chain = Vec::new();

        let Some((total_len, mut offset)) = read_u24_len(extra_bytes, 0) else {
            return chain;
        };
        let declared_end = (offset + total_len).min(extra_bytes.len());

        while offset < declared_end {
            let Some((cert_len, cert_start)) = read_u24_len(extra_bytes, offset) else {
                break;
            };
            let cert_end = match cert_start.checked_add(cert_len) {
                Some(e) if e <= extra_bytes.len() => e,
                _ => break,
            };

            let der = &extra_bytes[cert_start..cert_end];
            match X509Certificate::from_der(der) {
                Ok((_, cert)) => {
                    chain.push(ChainEntry {
                        subject: Self::dn_to_map(cert.subject()),
                        as_der: Some(base64::engine::general_purpose::STANDARD.encode(der)),
                    });
                }
                Err(e) => {
                    debug!("skipping undecodable chain certificate: {:?}", e);
                }
            }

            offset = cert_end;
        }

        chain
    }

    /// Left-to-right RDN walk; duplicate attribute names keep the last value.
    fn dn_to_map(name: &x509_parser::x509::X509Name) -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        for rdn in name.iter() {
            for attr in rdn.iter() {
                let key = attribute_short_name(attr.attr_type());
                if let Ok(value) = attr.attr_value().as_str() {
                    map.insert(key, value.to_string());
                }
            }
        }
        map
    }

    fn extract_all_domains(
        cert: &TbsCertificate,
        subject: &IndexMap<String, String>,
    ) -> Vec<String> {
        let mut domains = Vec::new();
        if let Some(cn) = subject.get("CN") {
            domains.push(cn.clone());
        }

        for ext in cert.extensions() {
            if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
                for name in &san.general_names {
                    if let GeneralName::DNSName(dns) = name {
                        domains.push(dns.to_string());
                    }
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        domains.retain(|d| seen.insert(d.clone()));
        domains
    }

    fn extract_extensions(cert: &TbsCertificate) -> IndexMap<String, String> {
        let mut extensions = IndexMap::new();

        for ext in cert.extensions() {
            match ext.parsed_extension() {
                ParsedExtension::SubjectAlternativeName(san) => {
                    let names: Vec<String> = san
                        .general_names
                        .iter()
                        .filter_map(|n| match n {
                            GeneralName::DNSName(d) => Some(format!("DNS:{d}")),
                            _ => None,
                        })
                        .collect();
                    if !names.is_empty() {
                        extensions.insert("subjectAltName".to_string(), names.join(","));
                    }
                }
                ParsedExtension::KeyUsage(ku) => {
                    extensions.insert("keyUsage".to_string(), format!("{ku:?}"));
                }
                ParsedExtension::ExtendedKeyUsage(eku) => {
                    extensions.insert("extendedKeyUsage".to_string(), format!("{eku:?}"));
                }
                ParsedExtension::BasicConstraints(bc) => {
                    let value = if bc.ca { "CA:true" } else { "CA:false" };
                    extensions.insert("basicConstraints".to_string(), value.to_string());
                }
                _ => {}
            }
        }

        extensions
    }
}

/// Reads a 24-bit big-endian length at `offset`, returning `(length, offset_after_length)`.
fn read_u24_len(bytes: &[u8], offset: usize) -> Option<(usize, usize)> {
    if offset + 3 > bytes.len() {
        return None;
    }
    let len = ((bytes[offset] as usize) << 16)
        | ((bytes[offset + 1] as usize) << 8)
        | (bytes[offset + 2] as usize);
    Some((len, offset + 3))
}

fn attribute_short_name(oid: &x509_parser::der_parser::oid::Oid) -> String {
    if *oid == oid_registry::OID_X509_COMMON_NAME {
        "CN".to_string()
    } else if *oid == oid_registry::OID_X509_ORGANIZATION_NAME {
        "O".to_string()
    } else if *oid == oid_registry::OID_X509_ORGANIZATIONAL_UNIT {
        "OU".to_string()
    } else if *oid == oid_registry::OID_X509_COUNTRY_NAME {
        "C".to_string()
    } else if *oid == oid_registry::OID_X509_LOCALITY_NAME {
        "L".to_string()
    } else if *oid == oid_registry::OID_X509_STATE_OR_PROVINCE_NAME {
        "ST".to_string()
    } else {
        oid.to_id_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_x509_entry_leaf(cert_der: &[u8]) -> Vec<u8> {
        let mut leaf = vec![0u8; 12];
        leaf[10..12].copy_from_slice(&X509_ENTRY.to_be_bytes());
        let len = cert_der.len();
        leaf.push((len >> 16) as u8);
        leaf.push((len >> 8) as u8);
        leaf.push(len as u8);
        leaf.extend_from_slice(cert_der);
        leaf
    }

    fn build_precert_entry_leaf(tbs_der: &[u8]) -> Vec<u8> {
        let mut leaf = vec![0u8; 12];
        leaf[10..12].copy_from_slice(&PRECERT_ENTRY.to_be_bytes());
        leaf.extend_from_slice(&[0u8; 32]); // issuer_key_hash
        let len = tbs_der.len();
        leaf.push((len >> 16) as u8);
        leaf.push((len >> 8) as u8);
        leaf.push(len as u8);
        leaf.extend_from_slice(tbs_der);
        leaf
    }

    #[test]
    fn extract_leaf_der_rejects_short_input() {
        assert!(LeafDecoder::extract_leaf_der(&[0u8; 5]).is_none());
    }

    #[test]
    fn extract_leaf_der_rejects_length_overrun() {
        let mut leaf = vec![0u8; 12];
        leaf[10..12].copy_from_slice(&X509_ENTRY.to_be_bytes());
        leaf.extend_from_slice(&[0xFF, 0xFF, 0xFF]); // huge declared length
        assert!(LeafDecoder::extract_leaf_der(&leaf).is_none());
    }

    #[test]
    fn extract_leaf_der_splits_x509_entry() {
        let cert_der = b"fake-der-bytes";
        let leaf = build_x509_entry_leaf(cert_der);
        let (der, is_precert) = LeafDecoder::extract_leaf_der(&leaf).unwrap();
        assert_eq!(der, cert_der);
        assert!(!is_precert);
    }

    #[test]
    fn extract_leaf_der_splits_precert_entry() {
        let tbs_der = b"fake-tbs-bytes";
        let leaf = build_precert_entry_leaf(tbs_der);
        let (der, is_precert) = LeafDecoder::extract_leaf_der(&leaf).unwrap();
        assert_eq!(der, tbs_der);
        assert!(is_precert);
    }

    #[test]
    fn unknown_entry_type_yields_none() {
        let mut leaf = vec![0u8; 15];
        leaf[10..12].copy_from_slice(&99u16.to_be_bytes());
        assert!(LeafDecoder::extract_leaf_der(&leaf).is_none());
    }

    #[test]
    fn decode_chain_skips_undecodable_entries_but_keeps_others() {
        // total length prefix, then one bad "cert" and no good ones: result is empty but doesn't panic.
        let mut extra = Vec::new();
        let bad_cert = b"not-a-cert";
        let inner_len = bad_cert.len();
        let mut inner = vec![
            (inner_len >> 16) as u8,
            (inner_len >> 8) as u8,
            inner_len as u8,
        ];
        inner.extend_from_slice(bad_cert);
        let total_len = inner.len();
        extra.push((total_len >> 16) as u8);
        extra.push((total_len >> 8) as u8);
        extra.push(total_len as u8);
        extra.extend_from_slice(&inner);

        let chain = LeafDecoder::decode_chain(&extra);
        assert!(chain.is_empty());
    }

    #[test]
    fn read_u24_len_rejects_out_of_range() {
        assert!(read_u24_len(&[0, 0], 0).is_none());
        assert_eq!(read_u24_len(&[0, 0, 5, 1, 2], 0), Some((5, 3)));
    }
}
