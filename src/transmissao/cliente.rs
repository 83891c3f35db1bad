//! Certificate-authenticated HTTPS delivery with the DNS-failure
//! simulation fallback.
//!
//! A fresh HTTP client is built per submission so the client certificate
//! is scoped to exactly the call that supplied it — certificates can
//! differ per call, and cross-call leakage would be a correctness bug.
//!
//! The fallback rule: when the destination host does not resolve, a
//! deterministic simulated authorization reply is returned instead of an
//! error — the national endpoints may be legitimately unpublished while
//! the system must stay demo-capable. Resolution is checked explicitly
//! up front (`tokio::net::lookup_host`), never inferred from exception
//! message text. Every other failure — timeout, TLS, refusal, HTTP error
//! status — surfaces as a genuine transport error.

use std::time::Duration;

use crate::chave::DigitSource;
use crate::core::{Environment, NotaError};
use crate::dsig::Certificado;

use super::envelope::TransportEnvelope;

/// Identification fields the simulation derives its reply from.
#[derive(Debug, Clone)]
pub struct SimulationSeed {
    /// Target environment, echoed as tpAmb.
    pub environment: Environment,
    /// Access key or DPS identifier, echoed back.
    pub document_key: String,
    /// Issuing state code, folded into the synthetic protocol number.
    pub uf_code: u8,
    /// Document sequence number, folded into the synthetic protocol
    /// number.
    pub number: u64,
    /// Emission timestamp, echoed as the reception instant.
    pub issue_timestamp: String,
}

/// A reply as it came off the wire (or out of the simulator).
#[derive(Debug, Clone)]
pub struct RawReply {
    /// Response body.
    pub body: String,
    /// True when the body was synthesized locally.
    pub simulated: bool,
}

/// Deliver one envelope to one endpoint.
///
/// # Errors
/// [`NotaError::Transport`] for timeouts, TLS failures, connection
/// refusals, and non-success HTTP statuses. An unresolvable host is NOT
/// an error: it yields the simulated reply.
pub async fn submit(
    envelope: &TransportEnvelope,
    url: &str,
    certificate: &Certificado,
    environment: Environment,
    timeout: Duration,
    seed: &SimulationSeed,
    source: &mut dyn DigitSource,
) -> Result<RawReply, NotaError> {
    if !host_resolves(url).await? {
        tracing::warn!(
            target: "notafiscal::transmissao::simulacao",
            url,
            document_key = %seed.document_key,
            "endpoint host does not resolve, returning simulated authorization"
        );
        return Ok(RawReply {
            body: simulated_reply(seed, source),
            simulated: true,
        });
    }

    let identity = reqwest::Identity::from_pem(certificate.identity_pem().as_bytes())
        .map_err(|e| NotaError::Transport(format!("client identity rejected: {e}")))?;
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .identity(identity)
        .timeout(timeout);
    // the homologation services run with lab certificates; production
    // always verifies the chain
    if environment == Environment::Homologacao {
        builder = builder.danger_accept_invalid_certs(true);
    }
    let client = builder
        .build()
        .map_err(|e| NotaError::Transport(format!("HTTP client build error: {e}")))?;

    let response = client
        .post(url)
        .header("Content-Type", envelope.content_type)
        .body(envelope.body.clone())
        .send()
        .await
        .map_err(classify_transport_error)?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| NotaError::Transport(format!("reply read error: {e}")))?;

    if !status.is_success() {
        return Err(NotaError::Transport(format!(
            "endpoint returned HTTP {status}: {body}"
        )));
    }

    Ok(RawReply {
        body,
        simulated: false,
    })
}

/// Explicit DNS pre-resolution of the endpoint host.
///
/// Returns `Ok(false)` only for a resolution failure; malformed URLs are
/// a transport error because no simulated reply can legitimately stand
/// in for a misconfigured endpoint table.
async fn host_resolves(url: &str) -> Result<bool, NotaError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| NotaError::Transport(format!("invalid endpoint URL {url}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| NotaError::Transport(format!("endpoint URL {url} has no host")))?
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(443);
    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => Ok(addrs.next().is_some()),
        Err(_) => Ok(false),
    }
}

fn classify_transport_error(error: reqwest::Error) -> NotaError {
    if error.is_timeout() {
        NotaError::Transport(format!("timeout: {error}"))
    } else if error.is_connect() {
        NotaError::Transport(format!("connection failed: {error}"))
    } else {
        NotaError::Transport(error.to_string())
    }
}

/// Synthesize an internally consistent authorization reply from the
/// request's own identification. The protocol number is derived from the
/// state code and sequence number; the verification code is fresh.
fn simulated_reply(seed: &SimulationSeed, source: &mut dyn DigitSource) -> String {
    let protocol = format!("9{:02}{:012}", seed.uf_code, seed.number);
    let verification = source.digits(8);
    format!(
        "<retEnviNFe versao=\"4.00\"><tpAmb>{tp_amb}</tpAmb>\
<verAplic>notafiscal-simulacao</verAplic>\
<cStat>104</cStat><xMotivo>Lote processado</xMotivo>\
<protNFe versao=\"4.00\"><infProt>\
<tpAmb>{tp_amb}</tpAmb>\
<chNFe>{key}</chNFe>\
<dhRecbto>{ts}</dhRecbto>\
<nProt>{protocol}</nProt>\
<cStat>100</cStat><xMotivo>Autorizado o uso da NF-e (simulacao local)</xMotivo>\
</infProt></protNFe>\
<codigoVerificacao>{verification}</codigoVerificacao>\
</retEnviNFe>",
        tp_amb = seed.environment.code(),
        key = seed.document_key,
        ts = seed.issue_timestamp,
    )
}
