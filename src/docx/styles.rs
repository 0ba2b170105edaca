//! DOCX styles parsing.
//!
//! The normalizer never reads style contents; it only needs to know which
//! styles exist and which paragraph style is the document default, so the
//! paragraph reset can be skipped when its target is missing from the
//! registry.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Style type (paragraph, character, table, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleType {
    Paragraph,
    Character,
    Table,
    Numbering,
}

/// A style registry entry from styles.xml.
#[derive(Debug, Clone, Default)]
pub struct StyleInfo {
    /// Style ID (e.g., "Normal", "TableGrid")
    pub id: String,
    /// Style name (e.g., "Table Grid")
    pub name: String,
    /// Style type
    pub style_type: Option<StyleType>,
}

/// Collection of styles from word/styles.xml.
#[derive(Debug, Clone, Default)]
pub struct StyleMap {
    /// Styles by ID
    pub styles: HashMap<String, StyleInfo>,
    /// Default paragraph style ID
    pub default_paragraph: Option<String>,
}

impl StyleMap {
    /// Parse the style registry from XML content.
    pub fn parse(xml: &str) -> Result<Self> {
        if xml.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut map = StyleMap::default();
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut current_style: Option<StyleInfo> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Start(e)) => {
                    if e.name().as_ref() == b"w:style" {
                        let mut style = StyleInfo::default();
                        let mut is_default = false;
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"w:styleId" => {
                                    style.id = String::from_utf8_lossy(&attr.value).to_string();
                                }
                                b"w:type" => {
                                    let t = String::from_utf8_lossy(&attr.value);
                                    style.style_type = match t.as_ref() {
                                        "paragraph" => Some(StyleType::Paragraph),
                                        "character" => Some(StyleType::Character),
                                        "table" => Some(StyleType::Table),
                                        "numbering" => Some(StyleType::Numbering),
                                        _ => None,
                                    };
                                }
                                b"w:default" => {
                                    let val = String::from_utf8_lossy(&attr.value);
                                    is_default = val == "1" || val == "true";
                                }
                                _ => {}
                            }
                        }
                        if is_default && style.style_type == Some(StyleType::Paragraph) {
                            map.default_paragraph = Some(style.id.clone());
                        }
                        current_style = Some(style);
                    }
                }
                Ok(quick_xml::events::Event::Empty(e)) => {
                    if e.name().as_ref() == b"w:name" {
                        if let Some(ref mut style) = current_style {
                            for attr in e.attributes().flatten() {
                                if attr.key.as_ref() == b"w:val" {
                                    style.name = String::from_utf8_lossy(&attr.value).to_string();
                                }
                            }
                        }
                    }
                }
                Ok(quick_xml::events::Event::End(e)) => {
                    if e.name().as_ref() == b"w:style" {
                        if let Some(style) = current_style.take() {
                            if !style.id.is_empty() {
                                map.styles.insert(style.id.clone(), style);
                            }
                        }
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(map)
    }

    /// Check whether a paragraph style with this ID exists.
    pub fn has_paragraph_style(&self, id: &str) -> bool {
        self.styles
            .get(id)
            .is_some_and(|s| s.style_type == Some(StyleType::Paragraph))
    }

    /// Resolve the paragraph style the normalizer should reset cell
    /// paragraphs to.
    ///
    /// Preference order: the explicitly requested style, then the document
    /// default paragraph style, then "Normal". Returns `None` when no
    /// candidate exists in the registry — paragraphs are then left as-is
    /// and counted as skipped.
    pub fn paragraph_reset_target(&self, requested: Option<&str>) -> Option<String> {
        if let Some(id) = requested {
            if self.has_paragraph_style(id) {
                return Some(id.to_string());
            }
            return None;
        }
        if let Some(ref id) = self.default_paragraph {
            if self.has_paragraph_style(id) {
                return Some(id.clone());
            }
        }
        if self.has_paragraph_style("Normal") {
            return Some("Normal".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
    <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
        <w:name w:val="Normal"/>
    </w:style>
    <w:style w:type="table" w:styleId="TableGrid">
        <w:name w:val="Table Grid"/>
    </w:style>
    <w:style w:type="character" w:styleId="Emphasis">
        <w:name w:val="Emphasis"/>
    </w:style>
</w:styles>"#;

    #[test]
    fn test_parse_styles() {
        let map = StyleMap::parse(STYLES_XML).unwrap();
        assert_eq!(map.styles.len(), 3);
        assert_eq!(map.default_paragraph.as_deref(), Some("Normal"));

        let grid = map.styles.get("TableGrid").unwrap();
        assert_eq!(grid.name, "Table Grid");
        assert_eq!(grid.style_type, Some(StyleType::Table));
    }

    #[test]
    fn test_has_paragraph_style_checks_type() {
        let map = StyleMap::parse(STYLES_XML).unwrap();
        assert!(map.has_paragraph_style("Normal"));
        // Exists, but is a character style
        assert!(!map.has_paragraph_style("Emphasis"));
        assert!(!map.has_paragraph_style("Missing"));
    }

    #[test]
    fn test_paragraph_reset_target() {
        let map = StyleMap::parse(STYLES_XML).unwrap();
        assert_eq!(map.paragraph_reset_target(None).as_deref(), Some("Normal"));
        assert_eq!(
            map.paragraph_reset_target(Some("Normal")).as_deref(),
            Some("Normal")
        );
        // Requested style missing: no fallback, the reset is skipped
        assert_eq!(map.paragraph_reset_target(Some("BodyText")), None);

        let empty = StyleMap::default();
        assert_eq!(empty.paragraph_reset_target(None), None);
    }

    #[test]
    fn test_parse_empty() {
        let map = StyleMap::parse("   ").unwrap();
        assert!(map.styles.is_empty());
        assert!(map.default_paragraph.is_none());
    }
}
