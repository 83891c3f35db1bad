//! Authority reply interpretation.
//!
//! Replies may arrive SOAP-wrapped; the interpreter peels the envelope
//! body before reading the business payload. Classification is by
//! status code (cStat): a small enumerated set means authorized, a
//! second sentinel set means "processing, query again later", and every
//! other code is a rejection — the transport call succeeded, the
//! document was refused. Rejections preserve the authority's reason
//! verbatim.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;

/// cStat values that mean the document was authorized (100) or
/// authorized after the deadline (150), plus the event-registered codes
/// (135/136) for cancellation replies.
pub const SUCCESS_CODES: &[&str] = &["100", "150", "135", "136"];

/// cStat values that mean "still processing, query again later" — not a
/// rejection; the caller may poll. This library does not itself poll.
pub const PROCESSING_CODES: &[&str] = &["103", "105"];

/// Normalized submission result, created once per call and immutable
/// after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Retorno {
    /// True only when the authority accepted the document.
    pub success: bool,
    /// Human-readable outcome summary.
    pub message: String,
    /// The exact payload sent on the wire.
    pub sent_payload: Option<String>,
    /// The raw reply body as received.
    pub raw_reply: Option<String>,
    /// P07: nProt — authorization protocol, on success.
    pub protocol_number: Option<String>,
    /// Access key (NF-e) or DPS identifier echoed by the authority.
    pub document_key: Option<String>,
    /// Verification code, for service invoices and simulated replies.
    pub verification_code: Option<String>,
    /// cStat as received.
    pub status_code: Option<String>,
    /// xMotivo as received, verbatim.
    pub reason: Option<String>,
    /// True for the "processing" sentinel — neither success nor
    /// rejection yet.
    pub processing: bool,
    /// True when the reply was synthesized locally because the endpoint
    /// host did not resolve.
    pub simulated: bool,
    /// Field-keyed diagnostic details (rejection codes, schema
    /// violations).
    pub structured_errors: BTreeMap<String, Vec<String>>,
}

impl Retorno {
    /// Build a failure result from a pipeline error, for callers that
    /// want the uniform shape instead of a typed error.
    pub fn from_error(error: &crate::core::NotaError, sent_payload: Option<String>) -> Self {
        let mut structured_errors = BTreeMap::new();
        structured_errors.insert("error".to_string(), vec![error.to_string()]);
        Self {
            success: false,
            message: error.to_string(),
            sent_payload,
            raw_reply: None,
            protocol_number: None,
            document_key: None,
            verification_code: None,
            status_code: None,
            reason: None,
            processing: false,
            simulated: false,
            structured_errors,
        }
    }
}

/// Short label for the cStat values seen most often in practice. The
/// authority's own xMotivo always takes precedence; this only fills the
/// gap when a reply (or log line) carries a bare code.
pub fn status_label(code: &str) -> Option<&'static str> {
    match code {
        "100" => Some("Autorizado o uso da NF-e"),
        "103" => Some("Lote recebido com sucesso"),
        "104" => Some("Lote processado"),
        "105" => Some("Lote em processamento"),
        "110" => Some("Uso denegado"),
        "135" => Some("Evento registrado e vinculado a NF-e"),
        "150" => Some("Autorizado o uso da NF-e, autorizacao fora de prazo"),
        "204" => Some("Rejeicao: Duplicidade de NF-e"),
        "217" => Some("Rejeicao: NF-e nao consta na base de dados da SEFAZ"),
        "225" => Some("Rejeicao: Falha no Schema XML da NFe"),
        "280" => Some("Rejeicao: Certificado transmissor invalido"),
        "539" => Some("Rejeicao: Duplicidade de NF-e com diferenca na chave de acesso"),
        _ => None,
    }
}

/// Fields extracted from a reply payload.
#[derive(Debug, Default)]
struct ReplyFields {
    status: Option<String>,
    reason: Option<String>,
    protocol: Option<String>,
    key: Option<String>,
    verification: Option<String>,
}

/// Interpret a raw authority reply into a [`Retorno`].
///
/// `simulated` marks locally synthesized replies so downstream logging
/// can tell them apart from genuine authorizations.
pub fn interpret(raw_reply: &str, sent_payload: Option<String>, simulated: bool) -> Retorno {
    let fields = extract_fields(raw_reply);

    let status = fields.status.clone();
    let reason = fields.reason.clone();
    let success = status
        .as_deref()
        .is_some_and(|code| SUCCESS_CODES.contains(&code));
    let processing = status
        .as_deref()
        .is_some_and(|code| PROCESSING_CODES.contains(&code));

    let message = match (&status, &reason) {
        (Some(code), Some(text)) => format!("[{code}] {text}"),
        (Some(code), None) => match status_label(code) {
            Some(label) => format!("[{code}] {label}"),
            None => format!("[{code}]"),
        },
        _ => "reply carried no status code".to_string(),
    };

    let mut structured_errors = BTreeMap::new();
    if !success && !processing {
        if let Some(code) = &status {
            structured_errors.insert("cStat".to_string(), vec![code.clone()]);
        }
        if let Some(text) = &reason {
            structured_errors.insert("xMotivo".to_string(), vec![text.clone()]);
        }
    }

    Retorno {
        success,
        message,
        sent_payload,
        raw_reply: Some(raw_reply.to_string()),
        protocol_number: fields.protocol,
        document_key: fields.key,
        verification_code: fields.verification,
        status_code: status,
        reason,
        processing,
        simulated,
        structured_errors,
    }
}

/// Stream through the reply, skipping any SOAP envelope, and pick up the
/// business fields. When a protocol block (`infProt`/`infEvento`) is
/// present its status supersedes the outer batch status.
fn extract_fields(raw_reply: &str) -> ReplyFields {
    let mut fields = ReplyFields::default();
    let mut reader = Reader::from_str(raw_reply);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut in_protocol_block = false;
    let mut protocol_status_seen = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                let name = local_name(start.name().as_ref());
                if matches!(name.as_str(), "infProt" | "infEvento") {
                    in_protocol_block = true;
                }
                path.push(name);
            }
            Ok(Event::End(end)) => {
                let name = local_name(end.name().as_ref());
                if matches!(name.as_str(), "infProt" | "infEvento") {
                    in_protocol_block = false;
                }
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let value = match text.unescape() {
                    Ok(v) => v.into_owned(),
                    Err(_) => continue,
                };
                if value.is_empty() {
                    continue;
                }
                match path.last().map(String::as_str) {
                    Some("cStat") => {
                        // the protocol block's verdict wins over the batch's
                        if in_protocol_block {
                            fields.status = Some(value);
                            protocol_status_seen = true;
                        } else if !protocol_status_seen {
                            fields.status = Some(value);
                        }
                    }
                    Some("xMotivo") => {
                        if in_protocol_block || fields.reason.is_none() {
                            fields.reason = Some(value);
                        }
                    }
                    Some("nProt") => fields.protocol = Some(value),
                    Some("chNFe" | "chDPS" | "chave") => fields.key = Some(value),
                    Some("codigoVerificacao" | "codVerificacao") => {
                        fields.verification = Some(value)
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fields
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    name.rsplit(':').next().unwrap_or(&name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorized_reply() {
        let reply = "<retEnviNFe versao=\"4.00\"><cStat>104</cStat>\
<xMotivo>Lote processado</xMotivo>\
<protNFe versao=\"4.00\"><infProt>\
<chNFe>35260112345678000195550010000000011123456782</chNFe>\
<nProt>135260000000001</nProt>\
<cStat>100</cStat><xMotivo>Autorizado o uso da NF-e</xMotivo>\
</infProt></protNFe></retEnviNFe>";
        let retorno = interpret(reply, None, false);
        assert!(retorno.success);
        assert!(!retorno.processing);
        assert_eq!(retorno.status_code.as_deref(), Some("100"));
        assert_eq!(retorno.reason.as_deref(), Some("Autorizado o uso da NF-e"));
        assert_eq!(retorno.protocol_number.as_deref(), Some("135260000000001"));
        assert_eq!(
            retorno.document_key.as_deref(),
            Some("35260112345678000195550010000000011123456782")
        );
        assert!(retorno.structured_errors.is_empty());
    }

    #[test]
    fn rejection_preserves_reason_verbatim() {
        let reply = "<retEnviNFe><cStat>539</cStat>\
<xMotivo>Rejeicao: Duplicidade de NF-e com diferenca na Chave de Acesso</xMotivo>\
</retEnviNFe>";
        let retorno = interpret(reply, None, false);
        assert!(!retorno.success);
        assert!(!retorno.processing);
        assert_eq!(retorno.status_code.as_deref(), Some("539"));
        assert_eq!(
            retorno.reason.as_deref(),
            Some("Rejeicao: Duplicidade de NF-e com diferenca na Chave de Acesso")
        );
        assert_eq!(
            retorno.structured_errors.get("cStat"),
            Some(&vec!["539".to_string()])
        );
    }

    #[test]
    fn any_non_success_numeric_code_is_rejection() {
        for code in ["110", "301", "999", "217"] {
            let reply = format!("<retEnviNFe><cStat>{code}</cStat><xMotivo>motivo</xMotivo></retEnviNFe>");
            let retorno = interpret(&reply, None, false);
            assert!(!retorno.success, "cStat {code} must not be success");
        }
    }

    #[test]
    fn processing_sentinel_is_not_rejection() {
        let reply = "<retEnviNFe><cStat>105</cStat><xMotivo>Lote em processamento</xMotivo></retEnviNFe>";
        let retorno = interpret(reply, None, false);
        assert!(!retorno.success);
        assert!(retorno.processing);
        assert!(retorno.structured_errors.is_empty());
    }

    #[test]
    fn soap_envelope_is_stripped() {
        let reply = "<soap:Envelope xmlns:soap=\"http://www.w3.org/2003/05/soap-envelope\">\
<soap:Body><nfeResultMsg>\
<retEnviNFe><protNFe><infProt><cStat>100</cStat><xMotivo>Autorizado</xMotivo>\
<nProt>123</nProt></infProt></protNFe></retEnviNFe>\
</nfeResultMsg></soap:Body></soap:Envelope>";
        let retorno = interpret(reply, None, false);
        assert!(retorno.success);
        assert_eq!(retorno.protocol_number.as_deref(), Some("123"));
    }

    #[test]
    fn event_registered_is_success() {
        let reply = "<retEvento versao=\"1.00\"><infEvento>\
<cStat>135</cStat><xMotivo>Evento registrado e vinculado a NF-e</xMotivo>\
</infEvento></retEvento>";
        let retorno = interpret(reply, None, false);
        assert!(retorno.success);
    }

    #[test]
    fn verification_code_is_extracted() {
        let reply = "<retDPS><cStat>100</cStat><xMotivo>Autorizado</xMotivo>\
<codigoVerificacao>87654321</codigoVerificacao></retDPS>";
        let retorno = interpret(reply, None, false);
        assert!(retorno.success);
        assert_eq!(retorno.verification_code.as_deref(), Some("87654321"));
    }

    #[test]
    fn bare_status_code_falls_back_to_label() {
        let retorno = interpret("<retEnviNFe><cStat>104</cStat></retEnviNFe>", None, false);
        assert_eq!(retorno.message, "[104] Lote processado");
        let retorno = interpret("<retEnviNFe><cStat>998</cStat></retEnviNFe>", None, false);
        assert_eq!(retorno.message, "[998]");
    }

    #[test]
    fn garbage_reply_is_not_success() {
        let retorno = interpret("not xml at all", None, false);
        assert!(!retorno.success);
        assert!(retorno.status_code.is_none());
        assert_eq!(retorno.message, "reply carried no status code");
    }

    #[test]
    fn from_error_produces_uniform_shape() {
        let err = crate::core::NotaError::Transport("timeout".into());
        let retorno = Retorno::from_error(&err, Some("<env/>".into()));
        assert!(!retorno.success);
        assert_eq!(retorno.sent_payload.as_deref(), Some("<env/>"));
        assert!(retorno.structured_errors.contains_key("error"));
    }
}
