//! Envelope construction, endpoint resolution, delivery, and reply
//! interpretation — the wire half of the emission pipeline.
//!
//! [`transmitir`] runs the whole flow for a [`Document`]: access key,
//! document XML, signature, (optional) schema validation, envelope,
//! certificate-authenticated POST, reply interpretation. Each submission
//! is one synchronous pipeline invocation; the network call is the only
//! suspension point, and nothing is shared between concurrent
//! submissions — each call owns its certificate handle, HTTP client, and
//! buffers.

mod cliente;
mod endpoints;
mod envelope;
mod retorno;

pub use cliente::{RawReply, SimulationSeed, submit};
pub use endpoints::{EndpointOverrides, authorization_url, event_url, nfse_url};
pub use envelope::{TransportEnvelope, rest_payload, soap_authorization, soap_event};
pub use retorno::{PROCESSING_CODES, Retorno, SUCCESS_CODES, interpret, status_label};

use std::time::Duration;

use crate::chave::{AccessKeyGenerator, DigitSource, OsDigitSource};
use crate::core::{Document, NotaError, Uf, format_timestamp};
use crate::dsig::{Certificado, SignaturePolicy, Signer};
use crate::{nfe, nfse};

/// Per-call transmission options.
#[derive(Debug, Clone)]
pub struct TransmitOptions {
    /// Bound on the network step; exceeding it is a transport error,
    /// never a silent retry.
    pub timeout: Duration,
    /// Endpoint overrides (configuration table, tests).
    pub endpoints: EndpointOverrides,
    /// Directory holding the XSD pack; when set, the signed document is
    /// validated before transmission and violations are attached to the
    /// result as information — they never block submission.
    #[cfg(feature = "schema")]
    pub schema_dir: Option<std::path::PathBuf>,
}

impl Default for TransmitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            endpoints: EndpointOverrides::default(),
            #[cfg(feature = "schema")]
            schema_dir: None,
        }
    }
}

/// Run the full document-to-wire pipeline and interpret the reply.
///
/// # Errors
/// Typed pipeline failures (key assembly, certificate, signature,
/// transport) propagate as [`NotaError`]; an accepted, rejected,
/// processing, or simulated outcome is an `Ok` [`Retorno`]. Use
/// [`Retorno::from_error`] to fold errors into the uniform shape.
pub async fn transmitir(
    document: &Document,
    certificate: &Certificado,
    options: &TransmitOptions,
) -> Result<Retorno, NotaError> {
    let mut source = OsDigitSource;
    transmitir_with_source(document, certificate, options, &mut source).await
}

/// [`transmitir`] with an injected digit source, so tests can pin the
/// access-key nonce and simulated verification codes.
pub async fn transmitir_with_source(
    document: &Document,
    certificate: &Certificado,
    options: &TransmitOptions,
    source: &mut dyn DigitSource,
) -> Result<Retorno, NotaError> {
    match document {
        Document::Nfe(nota) => {
            let chave = AccessKeyGenerator::for_nfe(nota, source)?;
            let unsigned = nfe::to_xml(nota, &chave)?;
            let signer = Signer::new(certificate, SignaturePolicy::for_layout(nfe::LAYOUT_VERSION))?;
            let signed = signer.sign(&unsigned)?;
            let uf = nota.identification.uf;
            let environment = nota.identification.environment;
            let envelope = soap_authorization(&signed, uf)?;
            let url = options
                .endpoints
                .authorization
                .clone()
                .unwrap_or_else(|| authorization_url(uf, environment).to_string());
            let seed = SimulationSeed {
                environment,
                document_key: chave.as_str().to_string(),
                uf_code: uf.code(),
                number: nota.identification.number,
                issue_timestamp: format_timestamp(&nota.identification.issue_datetime),
            };
            let reply = submit(
                &envelope,
                &url,
                certificate,
                environment,
                options.timeout,
                &seed,
                source,
            )
            .await?;
            let mut result = interpret(&reply.body, Some(envelope.body.clone()), reply.simulated);
            attach_schema_notes(options, &signed, SchemaSelector::Nfe, &mut result);
            Ok(result)
        }
        Document::Dps(dps) => {
            let (unsigned, dps_id) = nfse::to_xml(dps)?;
            let signer =
                Signer::new(certificate, SignaturePolicy::for_layout(nfse::LAYOUT_VERSION))?;
            let signed = signer.sign(&unsigned)?;
            let environment = dps.identification.environment;
            let envelope = rest_payload(&signed);
            let url = options
                .endpoints
                .nfse
                .clone()
                .unwrap_or_else(|| nfse_url(environment).to_string());
            let seed = SimulationSeed {
                environment,
                document_key: dps_id.clone(),
                uf_code: dps.identification.uf.code(),
                number: dps.identification.number,
                issue_timestamp: format_timestamp(&dps.identification.issue_datetime),
            };
            let reply = submit(
                &envelope,
                &url,
                certificate,
                environment,
                options.timeout,
                &seed,
                source,
            )
            .await?;
            let mut result = interpret(&reply.body, Some(envelope.body.clone()), reply.simulated);
            if result.document_key.is_none() {
                result.document_key = Some(dps_id);
            }
            attach_schema_notes(options, &signed, SchemaSelector::Dps, &mut result);
            Ok(result)
        }
        Document::Cancelamento(event) => {
            let unsigned = nfe::cancel_event_xml(event)?;
            let signer =
                Signer::new(certificate, SignaturePolicy::for_layout(nfe::EVENT_VERSION))?;
            let signed = signer.sign(&unsigned)?;
            let uf_code: u8 = event.access_key[..2].parse().map_err(|_| {
                NotaError::DocumentAssembly {
                    field: "access_key".into(),
                    reason: "key does not start with a state code".into(),
                }
            })?;
            let uf = Uf::from_code(uf_code).ok_or(NotaError::DocumentAssembly {
                field: "access_key".into(),
                reason: format!("unknown state code {uf_code}"),
            })?;
            let environment = event.environment;
            let envelope = soap_event(&signed, uf)?;
            let url = options
                .endpoints
                .event
                .clone()
                .unwrap_or_else(|| event_url(uf, environment).to_string());
            let seed = SimulationSeed {
                environment,
                document_key: event.access_key.clone(),
                uf_code,
                number: u64::from(event.sequence),
                issue_timestamp: format_timestamp(&event.issue_datetime),
            };
            let reply = submit(
                &envelope,
                &url,
                certificate,
                environment,
                options.timeout,
                &seed,
                source,
            )
            .await?;
            let mut result = interpret(&reply.body, Some(envelope.body.clone()), reply.simulated);
            attach_schema_notes(options, &signed, SchemaSelector::CancelEvent, &mut result);
            Ok(result)
        }
    }
}

enum SchemaSelector {
    Nfe,
    Dps,
    CancelEvent,
}

#[cfg(feature = "schema")]
fn attach_schema_notes(
    options: &TransmitOptions,
    signed_xml: &str,
    selector: SchemaSelector,
    result: &mut Retorno,
) {
    use crate::schema::{SchemaKind, SchemaValidator};
    let Some(dir) = &options.schema_dir else {
        return;
    };
    let kind = match selector {
        SchemaSelector::Nfe => SchemaKind::Nfe,
        SchemaSelector::Dps => SchemaKind::Dps,
        SchemaSelector::CancelEvent => SchemaKind::CancelEvent,
    };
    match SchemaValidator::new(dir).validate(signed_xml, kind) {
        Ok(outcome) if !outcome.valid => {
            result.structured_errors.insert(
                "schema".to_string(),
                outcome.errors.iter().map(|e| e.to_string()).collect(),
            );
        }
        Ok(_) => {}
        Err(error) => {
            result
                .structured_errors
                .insert("schema".to_string(), vec![error.to_string()]);
        }
    }
}

#[cfg(not(feature = "schema"))]
fn attach_schema_notes(
    _options: &TransmitOptions,
    _signed_xml: &str,
    _selector: SchemaSelector,
    _result: &mut Retorno,
) {
}
