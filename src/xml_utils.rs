use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::{NotaError, format_amount, format_quantity};

pub type XmlResult = Result<String, NotaError>;

fn xml_io(e: std::io::Error) -> NotaError {
    NotaError::Xml(format!("XML write error: {e}"))
}

/// Thin wrapper over the quick-xml writer.
///
/// Emits compact XML — the receiving webservices reject inter-tag
/// whitespace, so there is deliberately no indentation mode.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// Writer with the UTF-8 declaration the wire format requires.
    pub fn new() -> Result<Self, NotaError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    /// Writer without the declaration, for fragments embedded elsewhere.
    pub fn fragment() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    pub fn into_string(self) -> Result<String, NotaError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| NotaError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, NotaError> {
        let elem = BytesStart::new(name);
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, NotaError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, NotaError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, NotaError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Emit the element only when the value is present and non-empty.
    pub fn opt_text_element(
        &mut self,
        name: &str,
        text: Option<&str>,
    ) -> Result<&mut Self, NotaError> {
        match text {
            Some(value) if !value.is_empty() => self.text_element(name, value),
            _ => Ok(self),
        }
    }

    /// Raw pre-serialized XML, written through unescaped.
    pub fn raw(&mut self, xml: &str) -> Result<&mut Self, NotaError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(xml)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Monetary amount element, 2 fraction digits.
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, NotaError> {
        self.text_element(name, &format_amount(amount))
    }

    /// Quantity element, 4 fraction digits.
    pub fn quantity_element(&mut self, name: &str, qty: Decimal) -> Result<&mut Self, NotaError> {
        self.text_element(name, &format_quantity(qty))
    }
}
