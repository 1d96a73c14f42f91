use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa,
    KeyUsagePurpose, SanType,
};

#[derive(Debug, thiserror::Error)]
pub enum CaError {
    #[error("failed to generate certificate: {0}")]
    Rcgen(#[from] rcgen::RcgenError),
    #[error("failed to build tls config: {0}")]
    Tls(#[from] rustls::Error),
}

/// Issues short-lived leaf certificates for whatever host a client's
/// `CONNECT` targets, signed by a single in-memory root so the client
/// only ever has to trust one certificate.
///
/// There's no Go equivalent to ground this one on — the original relies
/// on `goproxy.AlwaysMitm`, which generates its leaf certs with Go's
/// `crypto/tls`/`crypto/x509` internally and never exposes the mechanics
/// as a pluggable interface. `rcgen` is the crate the wider example pack
/// reaches for to do the same job in Rust (see e.g.
/// `examples/other_examples/manifests/*/Cargo.toml`).
pub trait Ca: Send + Sync {
    fn server_config_for(&self, host: &str) -> Result<Arc<rustls::ServerConfig>, CaError>;
}

pub struct RcgenCa {
    root: Certificate,
    root_der: Vec<u8>,
    cache: Mutex<HashMap<String, Arc<rustls::ServerConfig>>>,
}

impl RcgenCa {
    pub fn generate() -> Result<Self, CaError> {
        let mut params = CertificateParams::default();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, "proksi MITM root");
        params.distinguished_name = name;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let root = Certificate::from_params(params)?;
        let root_der = root.serialize_der()?;
        Ok(Self {
            root,
            root_der,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// The root certificate, DER-encoded, for distribution to clients that
    /// need to trust this instance.
    pub fn root_der(&self) -> &[u8] {
        &self.root_der
    }

    fn issue_leaf(&self, host: &str) -> Result<Arc<rustls::ServerConfig>, CaError> {
        let mut params = CertificateParams::new(vec![host.to_string()]);
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, host);
        params.distinguished_name = name;
        params.subject_alt_names = vec![SanType::DnsName(host.to_string())];
        let leaf = Certificate::from_params(params)?;

        let leaf_der = leaf.serialize_der_with_signer(&self.root)?;
        let key_der = leaf.serialize_private_key_der();

        let cert_chain = vec![rustls::Certificate(leaf_der)];
        let key = rustls::PrivateKey(key_der);

        let config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(cert_chain, key)?;
        Ok(Arc::new(config))
    }
}

impl Ca for RcgenCa {
    fn server_config_for(&self, host: &str) -> Result<Arc<rustls::ServerConfig>, CaError> {
        if let Some(config) = self.cache.lock().unwrap().get(host) {
            return Ok(Arc::clone(config));
        }
        let config = self.issue_leaf(host)?;
        self.cache
            .lock()
            .unwrap()
            .insert(host.to_string(), Arc::clone(&config));
        Ok(config)
    }
}
