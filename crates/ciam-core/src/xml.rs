//! Indented XML output shared by the scenario, period index, and world
//! serializers.
//!
//! The writer carries its own nesting depth, so several serializers can
//! append to the same stream (the serialized scenario, or the debug trace
//! that stays open for a whole run) without a process-wide indentation
//! counter. One tab is written per nesting level.

use std::borrow::Cow;
use std::fmt::Display;
use std::io::{self, Write};

/// XML declaration written at the top of standalone documents.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A line-oriented XML writer with tracked indentation.
pub struct XmlWriter<'a> {
    /// Destination stream.
    out: Box<dyn Write + 'a>,
    /// Current nesting depth (number of open elements).
    depth: usize,
}

impl std::fmt::Debug for XmlWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlWriter")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'a> XmlWriter<'a> {
    /// Wrap a writer. The depth starts at zero.
    pub fn new<W: Write + 'a>(out: W) -> Self {
        Self {
            out: Box::new(out),
            depth: 0,
        }
    }

    /// Wrap an already boxed writer.
    pub fn from_boxed(out: Box<dyn Write + 'a>) -> Self {
        Self { out, depth: 0 }
    }

    /// Return the current nesting depth.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Write the XML declaration line.
    pub fn declaration(&mut self) -> io::Result<()> {
        writeln!(self.out, "{XML_DECLARATION}")
    }

    /// Write an opening tag with attributes and increase the depth.
    pub fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.write_tabs()?;
        write!(self.out, "<{tag}")?;
        self.write_attrs(attrs)?;
        writeln!(self.out, ">")?;
        self.depth = self.depth.saturating_add(1);
        Ok(())
    }

    /// Decrease the depth and write the matching closing tag.
    pub fn close(&mut self, tag: &str) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.write_tabs()?;
        writeln!(self.out, "</{tag}>")
    }

    /// Write `<tag>value</tag>` on one line.
    pub fn element<T: Display>(&mut self, tag: &str, value: T) -> io::Result<()> {
        self.element_with_attrs(tag, &[], value)
    }

    /// Write `<tag a="..">value</tag>` on one line.
    pub fn element_with_attrs<T: Display>(
        &mut self,
        tag: &str,
        attrs: &[(&str, &str)],
        value: T,
    ) -> io::Result<()> {
        self.write_tabs()?;
        write!(self.out, "<{tag}")?;
        self.write_attrs(attrs)?;
        let text = value.to_string();
        writeln!(self.out, ">{}</{tag}>", escape(&text))
    }

    /// Write a self-closing `<tag a=".."/>` element.
    pub fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.write_tabs()?;
        write!(self.out, "<{tag}")?;
        self.write_attrs(attrs)?;
        writeln!(self.out, "/>")
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn write_tabs(&mut self) -> io::Result<()> {
        for _ in 0..self.depth {
            self.out.write_all(b"\t")?;
        }
        Ok(())
    }

    fn write_attrs(&mut self, attrs: &[(&str, &str)]) -> io::Result<()> {
        for (name, value) in attrs {
            write!(self.out, " {name}=\"{}\"", escape(value))?;
        }
        Ok(())
    }
}

/// Escape the five XML special characters.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len().saturating_add(8));
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn nested_elements_are_indented_with_tabs() {
        let mut buf = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut buf);
            xml.open("scenario", &[("name", "ref")]).unwrap();
            xml.element("summary", "text").unwrap();
            xml.open("world", &[]).unwrap();
            xml.empty("region", &[("name", "usa")]).unwrap();
            xml.close("world").unwrap();
            xml.close("scenario").unwrap();
            assert_eq!(xml.depth(), 0);
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "<scenario name=\"ref\">\n\t<summary>text</summary>\n\t<world>\n\t\t<region name=\"usa\"/>\n\t</world>\n</scenario>\n"
        );
    }

    #[test]
    fn close_never_underflows() {
        let mut buf = Vec::new();
        let mut xml = XmlWriter::new(&mut buf);
        xml.close("stray").unwrap();
        assert_eq!(xml.depth(), 0);
    }

    #[test]
    fn special_characters_are_escaped() {
        assert_eq!(escape("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let mut buf = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut buf);
            xml.empty("market", &[("name", "oil&gas")]).unwrap();
        }
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "<market name=\"oil&amp;gas\"/>\n"
        );
    }
}
