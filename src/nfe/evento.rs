use super::{CANCEL_EVENT_TYPE, EVENT_VERSION, NFE_NS};
use crate::core::{CancelEvent, NotaError, format_timestamp, normalize_text};
use crate::xml_utils::{XmlResult, XmlWriter};

/// Generate the cancellation event XML (evento 110111).
///
/// The `infEvento/@Id` is `"ID" + tpEvento + chNFe + nSeqEvento(2)`, the
/// reference target the signature points at.
pub fn cancel_event_xml(event: &CancelEvent) -> XmlResult {
    if event.access_key.len() != 44 || !event.access_key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NotaError::DocumentAssembly {
            field: "access_key".into(),
            reason: "access key must be 44 digits".into(),
        });
    }
    if event.protocol_number.trim().is_empty() {
        return Err(NotaError::missing_field("protocol_number"));
    }
    let just = normalize_text(&event.justification);
    if just.chars().count() < 15 {
        return Err(NotaError::DocumentAssembly {
            field: "justification".into(),
            reason: "justification must be at least 15 characters".into(),
        });
    }
    // cOrgao is the key's own UF code
    let organ = &event.access_key[..2];
    let id = format!(
        "ID{CANCEL_EVENT_TYPE}{}{:02}",
        event.access_key, event.sequence
    );

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs("evento", &[("xmlns", NFE_NS), ("versao", EVENT_VERSION)])?;
    w.start_element_with_attrs("infEvento", &[("Id", &id)])?;
    w.text_element("cOrgao", organ)?;
    w.text_element("tpAmb", &event.environment.code().to_string())?;
    w.text_element("CNPJ", &event.author_cnpj)?;
    w.text_element("chNFe", &event.access_key)?;
    w.text_element("dhEvento", &format_timestamp(&event.issue_datetime))?;
    w.text_element("tpEvento", CANCEL_EVENT_TYPE)?;
    w.text_element("nSeqEvento", &event.sequence.to_string())?;
    w.text_element("verEvento", EVENT_VERSION)?;
    w.start_element_with_attrs("detEvento", &[("versao", EVENT_VERSION)])?;
    w.text_element("descEvento", "Cancelamento")?;
    w.text_element("nProt", &event.protocol_number)?;
    w.text_element("xJust", &just)?;
    w.end_element("detEvento")?;
    w.end_element("infEvento")?;
    w.end_element("evento")?;
    w.into_string()
}
