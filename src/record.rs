// src/record.rs
//! The universal currency of the pipeline: a normalized, immutable
//! certificate record and the three fan-out views derived from it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A CT log, identified by its base URL.
///
/// The URL is normalized with no trailing slash so that it can be used
/// directly as a map key and as the prefix for `/ct/v1/...` requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogDescriptor {
    pub url: String,
    pub name: String,
}

impl LogDescriptor {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        Self { url, name: name.into() }
    }
}

/// An X.509 certificate chain entry, nearest intermediate to root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub subject: IndexMap<String, String>,
    /// DER bytes, base64-encoded. Cleared (set to `None`) in the LITE view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_der: Option<String>,
}

/// The decoded leaf certificate fields, shared by FULL and LITE views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafCert {
    pub subject: IndexMap<String, String>,
    pub extensions: IndexMap<String, String>,
    pub not_before: f64,
    pub not_after: f64,
    pub serial_number: String,
    pub fingerprint: String,
    pub all_domains: Vec<String>,
    /// DER bytes, base64-encoded. Cleared (set to `None`) in the LITE view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_der: Option<String>,
}

/// A fully decoded, immutable certificate record.
///
/// Produced once by [`crate::ct_log::decoder::LeafDecoder`] and shared
/// read-only from then on: the broker and every subscriber's serialized
/// payload reference the same `Record` rather than cloning DER bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub source: LogDescriptor,
    pub cert_index: u64,
    pub seen_at: f64,
    pub leaf: LeafCert,
    pub chain: Vec<ChainEntry>,
    pub is_precert: bool,
}

impl Record {
    /// LITE view: identical to the canonical record but with every DER
    /// field cleared. Used for the LITE WebSocket stream.
    pub fn to_lite(&self) -> Record {
        let mut lite = self.clone();
        lite.leaf.as_der = None;
        for entry in &mut lite.chain {
            entry.as_der = None;
        }
        lite
    }

    /// DOMAINS_ONLY view: just the domains, the capture time, and the source.
    pub fn to_domains_only(&self) -> DomainsOnlyRecord {
        DomainsOnlyRecord {
            domains: self.leaf.all_domains.clone(),
            seen: self.seen_at,
            source: self.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainsOnlyRecord {
    pub domains: Vec<String>,
    pub seen: f64,
    pub source: LogDescriptor,
}

/// The wire envelope used by all three WebSocket streams.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateUpdate<T: Serialize> {
    pub message_type: &'static str,
    pub data: T,
}

/// Payload shape for the FULL and LITE streams.
#[derive(Debug, Clone, Serialize)]
pub struct FullOrLiteData<'a> {
    pub update_type: &'static str,
    pub leaf_cert: &'a LeafCert,
    pub chain: &'a [ChainEntry],
    pub cert_index: u64,
    pub seen: f64,
    pub source: &'a LogDescriptor,
}

impl Record {
    /// Builds the FULL-view wire envelope.
    pub fn full_envelope(&self) -> CertificateUpdate<FullOrLiteData<'_>> {
        CertificateUpdate {
            message_type: "certificate_update",
            data: FullOrLiteData {
                update_type: "X509LogEntry",
                leaf_cert: &self.leaf,
                chain: &self.chain,
                cert_index: self.cert_index,
                seen: self.seen_at,
                source: &self.source,
            },
        }
    }

    /// Builds the LITE-view wire envelope (DER fields already stripped).
    pub fn lite_envelope(lite: &Record) -> CertificateUpdate<FullOrLiteData<'_>> {
        CertificateUpdate {
            message_type: "certificate_update",
            data: FullOrLiteData {
                update_type: "X509LogEntry",
                leaf_cert: &lite.leaf,
                chain: &lite.chain,
                cert_index: lite.cert_index,
                seen: lite.seen_at,
                source: &lite.source,
            },
        }
    }

    /// Builds the DOMAINS_ONLY wire envelope.
    pub fn domains_only_envelope(&self) -> CertificateUpdate<DomainsOnlyRecord> {
        CertificateUpdate {
            message_type: "certificate_update",
            data: self.to_domains_only(),
        }
    }
}

/// Snapshot of [`crate::buffer::CertBuffer`] statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BufferStats {
    pub buffer_size: usize,
    pub buffer_capacity: usize,
    pub total_processed: u64,
    pub uptime_s: f64,
    pub rate_per_s: f64,
    pub started_at: f64,
}
