use super::{ID_PREFIX, LAYOUT_VERSION, NFSE_NS};
use crate::chave::AccessKeyGenerator;
use crate::core::*;
use crate::xml_utils::{XmlResult, XmlWriter};

/// Generate the unsigned DPS document XML for a service invoice model.
///
/// Returns the XML together with the DPS identifier digits embedded in
/// the `infDPS/@Id` attribute.
pub fn to_xml(dps: &Dps) -> Result<(String, String), NotaError> {
    let totals = dps.totals.as_ref().ok_or(NotaError::DocumentAssembly {
        field: "totals".into(),
        reason: "totals must be calculated before XML generation".into(),
    })?;
    let dps_id = AccessKeyGenerator::for_dps(
        &dps.issuer.address.municipality_code,
        &dps.issuer.cnpj,
        dps.identification.series,
        dps.identification.number,
    )?;

    let xml = build(dps, totals, &dps_id)?;
    Ok((xml, dps_id))
}

fn build(dps: &Dps, totals: &Totals, dps_id: &str) -> XmlResult {
    let ide = &dps.identification;
    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs("DPS", &[("xmlns", NFSE_NS), ("versao", LAYOUT_VERSION)])?;
    w.start_element_with_attrs("infDPS", &[("Id", &format!("{ID_PREFIX}{dps_id}"))])?;

    w.text_element("tpAmb", &ide.environment.code().to_string())?;
    w.text_element("dhEmi", &format_timestamp(&ide.issue_datetime))?;
    w.text_element(
        "verAplic",
        concat!("notafiscal ", env!("CARGO_PKG_VERSION")),
    )?;
    w.text_element("serie", &ide.series.to_string())?;
    w.text_element("nDPS", &ide.number.to_string())?;
    w.text_element(
        "dCompet",
        &ide.issue_datetime.format("%Y-%m-%d").to_string(),
    )?;
    // tpEmit 1 = the service provider emits its own declaration
    w.text_element("tpEmit", "1")?;
    w.text_element("cLocEmi", &ide.municipality_code)?;

    write_prest(&mut w, &dps.issuer)?;
    write_toma(&mut w, &dps.recipient)?;
    for (idx, item) in dps.items.iter().enumerate() {
        write_serv(&mut w, item, idx)?;
    }
    write_valores(&mut w, totals)?;
    if let Some(info) = &dps.additional_info {
        w.text_element("infCompl", &normalize_text(info))?;
    }

    w.end_element("infDPS")?;
    w.end_element("DPS")?;
    w.into_string()
}

/// prest: service provider.
fn write_prest(w: &mut XmlWriter, issuer: &Issuer) -> Result<(), NotaError> {
    if issuer.cnpj.trim().is_empty() {
        return Err(NotaError::missing_field("issuer.cnpj"));
    }
    w.start_element("prest")?;
    w.text_element("CNPJ", &issuer.cnpj)?;
    w.text_element("xNome", &normalize_text(&issuer.corporate_name))?;
    w.start_element("end")?;
    w.opt_text_element(
        "xLgr",
        issuer.address.street.as_deref().map(normalize_text).as_deref(),
    )?;
    w.text_element("cMun", &issuer.address.municipality_code)?;
    w.text_element("xMun", &normalize_text(&issuer.address.city))?;
    w.text_element("UF", issuer.address.uf.sigla())?;
    w.opt_text_element("CEP", issuer.address.postal_code.as_deref())?;
    w.end_element("end")?;
    // opSimpNac 1 = opting into Simples Nacional
    let simples = if issuer.tax_regime.uses_csosn() { "1" } else { "2" };
    w.start_element("regTrib")?;
    w.text_element("opSimpNac", simples)?;
    w.end_element("regTrib")?;
    w.end_element("prest")?;
    Ok(())
}

/// toma: service taker.
fn write_toma(w: &mut XmlWriter, recipient: &Recipient) -> Result<(), NotaError> {
    if recipient.name.trim().is_empty() {
        return Err(NotaError::missing_field("recipient.name"));
    }
    w.start_element("toma")?;
    match &recipient.id {
        PartyId::Cnpj(v) => w.text_element("CNPJ", v)?,
        PartyId::Cpf(v) => w.text_element("CPF", v)?,
        PartyId::Foreign(v) => w.text_element("NIF", v)?,
    };
    w.text_element("xNome", &normalize_text(&recipient.name))?;
    w.opt_text_element("email", recipient.email.as_deref())?;
    w.end_element("toma")?;
    Ok(())
}

/// serv: one entry per service item, in input order.
fn write_serv(w: &mut XmlWriter, item: &LineItem, idx: usize) -> Result<(), NotaError> {
    if item.classification_code.trim().is_empty() {
        return Err(NotaError::DocumentAssembly {
            field: format!("items[{idx}].classification_code"),
            reason: "service items require the LC 116 listing code".into(),
        });
    }
    let line_total = item.line_total.ok_or(NotaError::DocumentAssembly {
        field: format!("items[{idx}].line_total"),
        reason: "line total must be calculated before XML generation".into(),
    })?;
    w.start_element("serv")?;
    w.text_element("cTribNac", &item.classification_code)?;
    w.text_element("xDescServ", &normalize_text(&item.description))?;
    w.quantity_element("qServ", item.quantity)?;
    w.amount_element("vServ", line_total)?;
    w.text_element("pAliq", &format_percentage(item.tax.rate))?;
    w.end_element("serv")?;
    Ok(())
}

/// valores: aggregated service and ISS totals.
fn write_valores(w: &mut XmlWriter, totals: &Totals) -> Result<(), NotaError> {
    w.start_element("valores")?;
    w.amount_element("vServPrest", totals.products_total)?;
    w.amount_element("vBC", totals.icms_base)?;
    w.amount_element("vISSQN", totals.icms_total)?;
    w.amount_element("vLiq", totals.invoice_total)?;
    w.end_element("valores")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample() -> Dps {
        let brt = chrono::FixedOffset::west_opt(3 * 3600).unwrap();
        DpsBuilder::new(1, 1, brt.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap())
            .issuer(
                IssuerBuilder::new(
                    "12345678000195",
                    "Acme Servicos Ltda",
                    AddressBuilder::new("Sao Paulo", "3550308", Uf::Sp).build(),
                )
                .state_registration("123456789012")
                .build(),
            )
            .recipient(
                RecipientBuilder::new(
                    PartyId::Cnpj("98765432000192".into()),
                    "Cliente SA",
                    AddressBuilder::new("Campinas", "3509502", Uf::Sp).build(),
                )
                .build(),
            )
            .add_item(
                LineItemBuilder::new("001", "Consultoria em TI", dec!(10), "HOR", dec!(150))
                    .service_code("0107")
                    .tax(LineTax {
                        rate: dec!(2),
                        ..LineTax::default()
                    })
                    .build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn id_embeds_dps_identifier() {
        let (xml, id) = to_xml(&sample()).unwrap();
        assert_eq!(id, "3550308212345678000195000010000000000000012");
        assert!(xml.contains(&format!("Id=\"DPS{id}\"")));
    }

    #[test]
    fn identifier_check_digit_recomputes() {
        let (_, id) = to_xml(&sample()).unwrap();
        let (prefix, dv) = id.split_at(id.len() - 1);
        assert_eq!(
            crate::chave::check_digit(prefix),
            dv.parse::<u8>().unwrap()
        );
    }

    #[test]
    fn ordered_blocks() {
        let (xml, _) = to_xml(&sample()).unwrap();
        let order = ["<tpAmb>", "<prest>", "<toma>", "<serv>", "<valores>"];
        let mut last = 0;
        for tag in order {
            let pos = xml.find(tag).unwrap_or_else(|| panic!("missing {tag}"));
            assert!(pos > last, "{tag} out of order");
            last = pos;
        }
    }

    #[test]
    fn iss_totals_formatted() {
        let (xml, _) = to_xml(&sample()).unwrap();
        assert!(xml.contains("<vServPrest>1500.00</vServPrest>"));
        assert!(xml.contains("<vISSQN>30.00</vISSQN>"));
        assert!(xml.contains("<pAliq>2.0000</pAliq>"));
    }

    #[test]
    fn missing_service_code_is_named() {
        let mut dps = sample();
        dps.items[0].classification_code = String::new();
        match to_xml(&dps) {
            Err(NotaError::DocumentAssembly { field, .. }) => {
                assert_eq!(field, "items[0].classification_code");
            }
            other => panic!("expected DocumentAssembly, got {other:?}"),
        }
    }
}
