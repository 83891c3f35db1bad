//! Transport envelope construction.
//!
//! SEFAZ targets speak SOAP 1.2 with a routing header (`nfeCabecMsg`)
//! and the business payload as the sole body child, batch-of-one
//! (`idLote=1`, synchronous). The national NFS-e target is REST: the
//! signed document is the entire request body. The receiving services
//! reject extraneous inter-tag whitespace, so everything is stripped
//! before transmission.

use crate::core::{NotaError, uf::Uf};
use crate::nfe::{LAYOUT_VERSION, NFE_NS};
use crate::xml_utils::XmlWriter;

const SOAP_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
const AUTORIZACAO_WSDL: &str = "http://www.portalfiscal.inf.br/nfe/wsdl/NFeAutorizacao4";
const EVENTO_WSDL: &str = "http://www.portalfiscal.inf.br/nfe/wsdl/NFeRecepcaoEvento4";

/// An immutable wire-ready request: media type plus serialized body.
#[derive(Debug, Clone)]
pub struct TransportEnvelope {
    /// Content-Type header value.
    pub content_type: &'static str,
    /// Serialized request body, whitespace-stripped.
    pub body: String,
}

/// SOAP envelope for NF-e authorization: header routing metadata plus a
/// batch-of-one `enviNFe` carrying the signed document.
pub fn soap_authorization(signed_xml: &str, uf: Uf) -> Result<TransportEnvelope, NotaError> {
    let mut payload = XmlWriter::fragment();
    payload.start_element_with_attrs("enviNFe", &[("xmlns", NFE_NS), ("versao", LAYOUT_VERSION)])?;
    payload.text_element("idLote", "1")?;
    // indSinc 1: synchronous processing of the single-document batch
    payload.text_element("indSinc", "1")?;
    payload.raw(&strip_document(signed_xml))?;
    payload.end_element("enviNFe")?;
    soap_envelope(AUTORIZACAO_WSDL, uf, &payload.into_string()?)
}

/// SOAP envelope for event reception, wrapping the signed event in an
/// `envEvento` batch of one.
pub fn soap_event(signed_event_xml: &str, uf: Uf) -> Result<TransportEnvelope, NotaError> {
    let mut payload = XmlWriter::fragment();
    payload.start_element_with_attrs("envEvento", &[("xmlns", NFE_NS), ("versao", "1.00")])?;
    payload.text_element("idLote", "1")?;
    payload.raw(&strip_document(signed_event_xml))?;
    payload.end_element("envEvento")?;
    soap_envelope(EVENTO_WSDL, uf, &payload.into_string()?)
}

/// REST payload for the national NFS-e target: the signed DPS is the
/// whole body.
pub fn rest_payload(signed_dps_xml: &str) -> TransportEnvelope {
    TransportEnvelope {
        content_type: "application/xml; charset=utf-8",
        body: strip_document(signed_dps_xml),
    }
}

fn soap_envelope(wsdl_ns: &str, uf: Uf, payload: &str) -> Result<TransportEnvelope, NotaError> {
    let mut w = XmlWriter::fragment();
    w.start_element_with_attrs("soap12:Envelope", &[("xmlns:soap12", SOAP_NS)])?;
    w.start_element("soap12:Header")?;
    w.start_element_with_attrs("nfeCabecMsg", &[("xmlns", wsdl_ns)])?;
    w.text_element("cUF", &uf.code().to_string())?;
    w.text_element("versaoDados", LAYOUT_VERSION)?;
    w.end_element("nfeCabecMsg")?;
    w.end_element("soap12:Header")?;
    w.start_element("soap12:Body")?;
    w.start_element_with_attrs("nfeDadosMsg", &[("xmlns", wsdl_ns)])?;
    w.raw(payload)?;
    w.end_element("nfeDadosMsg")?;
    w.end_element("soap12:Body")?;
    w.end_element("soap12:Envelope")?;
    Ok(TransportEnvelope {
        content_type: "application/soap+xml; charset=utf-8",
        body: w.into_string()?,
    })
}

/// Drop the XML declaration and strip whitespace runs between tags.
fn strip_document(xml: &str) -> String {
    let without_decl = match xml.find("?>") {
        Some(pos) if xml.trim_start().starts_with("<?xml") => &xml[pos + 2..],
        _ => xml,
    };
    strip_inter_tag_whitespace(without_decl.trim())
}

fn strip_inter_tag_whitespace(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut chars = xml.chars().peekable();
    let mut pending = String::new();
    while let Some(ch) = chars.next() {
        if ch == '>' {
            out.push(ch);
            pending.clear();
            while let Some(&next) = chars.peek() {
                if next.is_whitespace() {
                    pending.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            // whitespace is significant only inside mixed content
            if chars.peek() != Some(&'<') {
                out.push_str(&pending);
            }
        } else {
            out.push(ch);
        }
    }
    out
}
