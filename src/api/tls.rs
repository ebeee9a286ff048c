//! TLS configuration for the API client
//!
//! Standard webpki chain validation, followed by an issuer check on the leaf
//! certificate. A certificate that chains to a trusted root but was not issued
//! by the pinned authority is rejected.

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use tracing::warn;

use crate::api::error::ApiError;

/// Certificate verifier that requires the issuer to contain a given fragment
#[derive(Debug)]
pub struct IssuerPinnedVerifier {
    inner: Arc<WebPkiServerVerifier>,
    issuer_fragment: String,
}

impl IssuerPinnedVerifier {
    pub fn new(
        provider: Arc<CryptoProvider>,
        issuer_fragment: &str,
    ) -> Result<Self, ApiError> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(root_store), provider)
            .build()
            .map_err(|e| ApiError::Tls(e.to_string()))?;

        Ok(Self {
            inner,
            issuer_fragment: issuer_fragment.to_lowercase(),
        })
    }
}

/// Check whether the issuer of a DER certificate contains `fragment` (case-insensitive)
pub fn issuer_matches(der: &[u8], fragment: &str) -> Result<bool, String> {
    let (_rem, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| format!("Unparseable server certificate: {}", e))?;
    let issuer = cert.issuer().to_string().to_lowercase();
    Ok(issuer.contains(&fragment.to_lowercase()))
}

impl ServerCertVerifier for IssuerPinnedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verified = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        )?;

        match issuer_matches(end_entity.as_ref(), &self.issuer_fragment) {
            Ok(true) => Ok(verified),
            Ok(false) => {
                warn!("Server certificate issuer does not match the pinned authority");
                Err(rustls::Error::General(
                    "API authenticity could not be verified".to_string(),
                ))
            }
            Err(e) => Err(rustls::Error::General(e)),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Build the rustls client config used for every API request
pub fn pinned_client_config(issuer_fragment: &str) -> Result<rustls::ClientConfig, ApiError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = IssuerPinnedVerifier::new(provider.clone(), issuer_fragment)?;

    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ApiError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(config)
}
