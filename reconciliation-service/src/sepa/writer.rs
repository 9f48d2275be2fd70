//! Thin element-oriented wrapper over `quick_xml::Writer`.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;

use super::SepaError;

fn xml<E: std::fmt::Display>(e: E) -> SepaError {
    SepaError::Xml(e.to_string())
}

pub struct XmlWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, SepaError> {
        let mut inner = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml)?;
        Ok(Self { inner })
    }

    pub fn start(&mut self, name: &str) -> Result<(), SepaError> {
        self.start_with_attrs(name, &[])
    }

    pub fn start_with_attrs(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SepaError> {
        let mut elem = BytesStart::new(name);
        for attr in attrs {
            elem.push_attribute(*attr);
        }
        self.inner.write_event(Event::Start(elem)).map_err(xml)
    }

    pub fn end(&mut self, name: &str) -> Result<(), SepaError> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml)
    }

    pub fn text(&mut self, name: &str, value: &str) -> Result<(), SepaError> {
        self.text_with_attrs(name, &[], value)
    }

    pub fn text_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        value: &str,
    ) -> Result<(), SepaError> {
        self.start_with_attrs(name, attrs)?;
        self.inner
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml)?;
        self.end(name)
    }

    /// `<Outer><Inner>value</Inner></Outer>` and deeper chains.
    pub fn nested(&mut self, path: &[&str], value: &str) -> Result<(), SepaError> {
        let Some((leaf, parents)) = path.split_last() else {
            return Ok(());
        };
        for p in parents {
            self.start(p)?;
        }
        self.text(leaf, value)?;
        for p in parents.iter().rev() {
            self.end(p)?;
        }
        Ok(())
    }

    pub fn into_string(self) -> Result<String, SepaError> {
        String::from_utf8(self.inner.into_inner().into_inner()).map_err(xml)
    }
}

/// Amounts are always written with two decimals.
pub fn amount(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}
