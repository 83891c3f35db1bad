use rust_decimal::Decimal;

use super::{HOMOLOG_RECIPIENT_NAME, ID_PREFIX, LAYOUT_VERSION, NFE_NS};
use crate::chave::AccessKey;
use crate::core::*;
use crate::xml_utils::{XmlResult, XmlWriter};

/// Generate the unsigned NF-e document XML for an invoice model.
///
/// The access key must already be generated for this model; its cNF and
/// check digit are echoed into the `ide` block and its full value forms
/// the `infNFe/@Id` reference target for the signature.
pub fn to_xml(nfe: &Nfe, key: &AccessKey) -> XmlResult {
    let totals = nfe.totals.as_ref().ok_or(NotaError::DocumentAssembly {
        field: "totals".into(),
        reason: "totals must be calculated before XML generation".into(),
    })?;
    require(&nfe.identification.operation_nature, "identification.operation_nature")?;
    require(&nfe.issuer.cnpj, "issuer.cnpj")?;
    require(&nfe.issuer.corporate_name, "issuer.corporate_name")?;
    require(&nfe.issuer.state_registration, "issuer.state_registration")?;
    require(&nfe.recipient.name, "recipient.name")?;

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs("NFe", &[("xmlns", NFE_NS)])?;
    w.start_element_with_attrs(
        "infNFe",
        &[
            ("Id", &format!("{ID_PREFIX}{key}")),
            ("versao", LAYOUT_VERSION),
        ],
    )?;

    write_ide(&mut w, nfe, key)?;
    write_emit(&mut w, &nfe.issuer)?;
    write_dest(&mut w, nfe)?;
    for (idx, item) in nfe.items.iter().enumerate() {
        write_det(&mut w, item, idx, nfe.issuer.tax_regime)?;
    }
    write_total(&mut w, totals)?;
    write_transp(&mut w, nfe.transport.as_ref())?;
    if let Some(billing) = &nfe.billing {
        write_cobr(&mut w, billing)?;
    }
    write_pag(&mut w, &nfe.payments)?;
    if let Some(info) = &nfe.additional_info {
        w.start_element("infAdic")?;
        w.text_element("infCpl", &normalize_text(info))?;
        w.end_element("infAdic")?;
    }

    w.end_element("infNFe")?;
    w.end_element("NFe")?;
    w.into_string()
}

/// B: ide block. Field order is schema-mandated.
fn write_ide(w: &mut XmlWriter, nfe: &Nfe, key: &AccessKey) -> Result<(), NotaError> {
    let ide = &nfe.identification;
    w.start_element("ide")?;
    w.text_element("cUF", &ide.uf.code().to_string())?;
    w.text_element("cNF", key.nonce())?;
    w.text_element("natOp", &normalize_text(&ide.operation_nature))?;
    w.text_element("mod", "55")?;
    w.text_element("serie", &ide.series.to_string())?;
    w.text_element("nNF", &ide.number.to_string())?;
    w.text_element("dhEmi", &format_timestamp(&ide.issue_datetime))?;
    // tpNF: 0 = entrada for goods returns, 1 = saída otherwise
    let tp_nf = if ide.purpose == Purpose::Return { "0" } else { "1" };
    w.text_element("tpNF", tp_nf)?;
    w.text_element("idDest", dest_indicator(nfe))?;
    w.text_element("cMunFG", &ide.municipality_code)?;
    w.text_element("tpImp", "1")?;
    w.text_element("tpEmis", &ide.emission_mode.code().to_string())?;
    w.text_element("cDV", &key.verifier().to_string())?;
    w.text_element("tpAmb", &ide.environment.code().to_string())?;
    w.text_element("finNFe", &ide.purpose.code().to_string())?;
    w.text_element("indFinal", "1")?;
    w.text_element("indPres", "9")?;
    w.text_element("procEmi", "0")?;
    w.text_element("verProc", concat!("notafiscal ", env!("CARGO_PKG_VERSION")))?;
    w.end_element("ide")?;
    Ok(())
}

fn dest_indicator(nfe: &Nfe) -> &'static str {
    match &nfe.recipient.id {
        PartyId::Foreign(_) => "3",
        _ if nfe.recipient.address.uf == nfe.identification.uf => "1",
        _ => "2",
    }
}

/// C: emit block.
fn write_emit(w: &mut XmlWriter, issuer: &Issuer) -> Result<(), NotaError> {
    w.start_element("emit")?;
    w.text_element("CNPJ", &issuer.cnpj)?;
    w.text_element("xNome", &normalize_text(&issuer.corporate_name))?;
    w.opt_text_element("xFant", issuer.trade_name.as_deref())?;
    write_address(w, "enderEmit", &issuer.address)?;
    w.text_element("IE", &issuer.state_registration)?;
    w.text_element("CRT", &issuer.tax_regime.code().to_string())?;
    w.end_element("emit")?;
    Ok(())
}

/// E: dest block. In homologation the authority mandates a fixed
/// recipient name; the real name is never sent there.
fn write_dest(w: &mut XmlWriter, nfe: &Nfe) -> Result<(), NotaError> {
    let dest = &nfe.recipient;
    w.start_element("dest")?;
    match &dest.id {
        PartyId::Cnpj(v) => w.text_element("CNPJ", v)?,
        PartyId::Cpf(v) => w.text_element("CPF", v)?,
        PartyId::Foreign(v) => w.text_element("idEstrangeiro", v)?,
    };
    let name = if nfe.identification.environment == Environment::Homologacao {
        HOMOLOG_RECIPIENT_NAME
    } else {
        &dest.name
    };
    w.text_element("xNome", &normalize_text(name))?;
    write_address(w, "enderDest", &dest.address)?;
    w.text_element("indIEDest", &dest.ie_indicator.code().to_string())?;
    if dest.ie_indicator == IeIndicator::Taxpayer {
        let ie = dest
            .state_registration
            .as_deref()
            .ok_or(NotaError::DocumentAssembly {
                field: "recipient.state_registration".into(),
                reason: "taxpayer recipient requires a state registration".into(),
            })?;
        w.text_element("IE", ie)?;
    }
    w.opt_text_element("email", dest.email.as_deref())?;
    w.end_element("dest")?;
    Ok(())
}

/// C05/E05: address blocks share one ordered layout.
fn write_address(w: &mut XmlWriter, tag: &str, address: &Address) -> Result<(), NotaError> {
    w.start_element(tag)?;
    w.text_element(
        "xLgr",
        &normalize_text(address.street.as_deref().unwrap_or("SEM LOGRADOURO")),
    )?;
    w.text_element("nro", address.number.as_deref().unwrap_or("S/N"))?;
    w.opt_text_element("xBairro", address.district.as_deref().map(normalize_text).as_deref())?;
    w.text_element("cMun", &address.municipality_code)?;
    w.text_element("xMun", &normalize_text(&address.city))?;
    w.text_element("UF", address.uf.sigla())?;
    w.opt_text_element("CEP", address.postal_code.as_deref())?;
    w.text_element("cPais", "1058")?;
    w.text_element("xPais", "BRASIL")?;
    w.opt_text_element("fone", address.phone.as_deref())?;
    w.end_element(tag)?;
    Ok(())
}

/// H/I/M/N: one det entry per line item, in input order.
fn write_det(
    w: &mut XmlWriter,
    item: &LineItem,
    idx: usize,
    regime: TaxRegime,
) -> Result<(), NotaError> {
    require(&item.description, &format!("items[{idx}].description"))?;
    let line_total = item.line_total.ok_or(NotaError::DocumentAssembly {
        field: format!("items[{idx}].line_total"),
        reason: "line total must be calculated before XML generation".into(),
    })?;

    w.start_element_with_attrs("det", &[("nItem", &(idx + 1).to_string())])?;

    w.start_element("prod")?;
    w.text_element("cProd", &item.code)?;
    w.text_element("cEAN", item.ean.as_deref().unwrap_or("SEM GTIN"))?;
    w.text_element("xProd", &normalize_text(&item.description))?;
    w.text_element("NCM", &item.classification_code)?;
    w.text_element(
        "CFOP",
        item.cfop.as_deref().ok_or(NotaError::DocumentAssembly {
            field: format!("items[{idx}].cfop"),
            reason: "goods items require a CFOP".into(),
        })?,
    )?;
    w.text_element("uCom", &item.unit)?;
    w.quantity_element("qCom", item.quantity)?;
    w.text_element("vUnCom", &format_unit_price(item.unit_price))?;
    w.amount_element("vProd", line_total)?;
    w.text_element("cEANTrib", item.ean.as_deref().unwrap_or("SEM GTIN"))?;
    w.text_element("uTrib", &item.unit)?;
    w.quantity_element("qTrib", item.quantity)?;
    w.text_element("vUnTrib", &format_unit_price(item.unit_price))?;
    w.text_element("indTot", "1")?;
    w.end_element("prod")?;

    w.start_element("imposto")?;
    write_icms(w, item, line_total, regime)?;
    if let Some(pis) = &item.tax.pis {
        write_pis_cofins(w, "PIS", "PISAliq", "pPIS", "vPIS", pis, line_total)?;
    }
    if let Some(cofins) = &item.tax.cofins {
        write_pis_cofins(w, "COFINS", "COFINSAliq", "pCOFINS", "vCOFINS", cofins, line_total)?;
    }
    w.end_element("imposto")?;

    w.end_element("det")?;
    Ok(())
}

/// N: ICMS group. The emitted variant branches on the issuer's tax
/// regime: Simples Nacional issuers emit the CSOSN group, everyone else
/// the CST group that matches the item's situation code.
fn write_icms(
    w: &mut XmlWriter,
    item: &LineItem,
    line_total: Decimal,
    regime: TaxRegime,
) -> Result<(), NotaError> {
    w.start_element("ICMS")?;
    if regime.uses_csosn() {
        let group = format!("ICMSSN{}", item.tax.csosn);
        w.start_element(&group)?;
        w.text_element("orig", &item.tax.origin.to_string())?;
        w.text_element("CSOSN", &item.tax.csosn)?;
        w.end_element(&group)?;
    } else {
        match item.tax.cst.as_str() {
            "00" => {
                w.start_element("ICMS00")?;
                w.text_element("orig", &item.tax.origin.to_string())?;
                w.text_element("CST", "00")?;
                w.text_element("modBC", "3")?;
                w.amount_element("vBC", line_total)?;
                w.text_element("pICMS", &format_percentage(item.tax.rate))?;
                w.amount_element("vICMS", line_total * item.tax.rate / Decimal::from(100))?;
                w.end_element("ICMS00")?;
            }
            // 40 exempt, 41 not taxed, 50 suspended share one group
            cst @ ("40" | "41" | "50") => {
                w.start_element("ICMS40")?;
                w.text_element("orig", &item.tax.origin.to_string())?;
                w.text_element("CST", cst)?;
                w.end_element("ICMS40")?;
            }
            other => {
                return Err(NotaError::DocumentAssembly {
                    field: "tax.cst".into(),
                    reason: format!("unsupported CST {other}"),
                });
            }
        }
    }
    w.end_element("ICMS")?;
    Ok(())
}

/// Q/S: PIS and COFINS share the CST+rate shape.
fn write_pis_cofins(
    w: &mut XmlWriter,
    group: &str,
    variant: &str,
    rate_tag: &str,
    value_tag: &str,
    detail: &TaxDetail,
    line_total: Decimal,
) -> Result<(), NotaError> {
    w.start_element(group)?;
    w.start_element(variant)?;
    w.text_element("CST", &detail.cst)?;
    w.amount_element("vBC", line_total)?;
    w.text_element(rate_tag, &format_percentage(detail.rate))?;
    w.amount_element(value_tag, line_total * detail.rate / Decimal::from(100))?;
    w.end_element(variant)?;
    w.end_element(group)?;
    Ok(())
}

/// W: total/ICMSTot. Every element of the group is mandatory in the
/// schema, zeros included, in this exact order.
fn write_total(w: &mut XmlWriter, totals: &Totals) -> Result<(), NotaError> {
    let zero = Decimal::ZERO;
    w.start_element("total")?;
    w.start_element("ICMSTot")?;
    w.amount_element("vBC", totals.icms_base)?;
    w.amount_element("vICMS", totals.icms_total)?;
    w.amount_element("vICMSDeson", zero)?;
    w.amount_element("vFCP", zero)?;
    w.amount_element("vBCST", zero)?;
    w.amount_element("vST", zero)?;
    w.amount_element("vFCPST", zero)?;
    w.amount_element("vFCPSTRet", zero)?;
    w.amount_element("vProd", totals.products_total)?;
    w.amount_element("vFrete", zero)?;
    w.amount_element("vSeg", zero)?;
    w.amount_element("vDesc", zero)?;
    w.amount_element("vII", zero)?;
    w.amount_element("vIPI", zero)?;
    w.amount_element("vIPIDevol", zero)?;
    w.amount_element("vPIS", zero)?;
    w.amount_element("vCOFINS", zero)?;
    w.amount_element("vOutro", zero)?;
    w.amount_element("vNF", totals.invoice_total)?;
    w.end_element("ICMSTot")?;
    w.end_element("total")?;
    Ok(())
}

/// X: transp. modFrete is mandatory even when nothing ships.
fn write_transp(w: &mut XmlWriter, transport: Option<&Transport>) -> Result<(), NotaError> {
    w.start_element("transp")?;
    match transport {
        None => {
            w.text_element("modFrete", &FreightMode::NoTransport.code().to_string())?;
        }
        Some(t) => {
            w.text_element("modFrete", &t.freight_mode.code().to_string())?;
            if t.carrier_cnpj.is_some() || t.carrier_name.is_some() {
                w.start_element("transporta")?;
                w.opt_text_element("CNPJ", t.carrier_cnpj.as_deref())?;
                w.opt_text_element("xNome", t.carrier_name.as_deref().map(normalize_text).as_deref())?;
                w.end_element("transporta")?;
            }
            if let Some(plate) = &t.vehicle_plate {
                w.start_element("veicTransp")?;
                w.text_element("placa", plate)?;
                w.end_element("veicTransp")?;
            }
        }
    }
    w.end_element("transp")?;
    Ok(())
}

/// Y: cobr with fat + dup entries.
fn write_cobr(w: &mut XmlWriter, billing: &Billing) -> Result<(), NotaError> {
    w.start_element("cobr")?;
    if let Some(number) = &billing.invoice_number {
        let total: Decimal = billing.installments.iter().map(|i| i.amount).sum();
        w.start_element("fat")?;
        w.text_element("nFat", number)?;
        w.amount_element("vOrig", total)?;
        w.amount_element("vDesc", Decimal::ZERO)?;
        w.amount_element("vLiq", total)?;
        w.end_element("fat")?;
    }
    for installment in &billing.installments {
        w.start_element("dup")?;
        w.text_element("nDup", &installment.number)?;
        w.text_element("dVenc", &installment.due_date.format("%Y-%m-%d").to_string())?;
        w.amount_element("vDup", installment.amount)?;
        w.end_element("dup")?;
    }
    w.end_element("cobr")?;
    Ok(())
}

/// YA: pag. The group is mandatory; documents without payment details
/// emit the "no payment" code with a zero amount.
fn write_pag(w: &mut XmlWriter, payments: &[Payment]) -> Result<(), NotaError> {
    w.start_element("pag")?;
    if payments.is_empty() {
        w.start_element("detPag")?;
        w.text_element("tPag", PaymentMeans::None.code())?;
        w.amount_element("vPag", Decimal::ZERO)?;
        w.end_element("detPag")?;
    }
    for payment in payments {
        w.start_element("detPag")?;
        w.text_element("tPag", payment.means.code())?;
        w.amount_element("vPag", payment.amount)?;
        w.end_element("detPag")?;
    }
    w.end_element("pag")?;
    Ok(())
}

fn require(value: &str, field: &str) -> Result<(), NotaError> {
    if value.trim().is_empty() {
        return Err(NotaError::missing_field(field));
    }
    Ok(())
}
