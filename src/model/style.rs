//! Style records: number formats, fonts, fills, borders and composite cell formats.
//!
//! Fonts, fills and borders are carried as XML fragments. Records read from a package keep
//! their original text so they are written back untouched; records built through this API
//! generate their fragment up front. Two records are equal exactly when their fragments are.

use crate::xml;
use serde::Serialize;
use std::fmt;

/// A color as written in `rgb`, `theme`, `indexed` or `auto` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// 32-bit ARGB
    Rgb(u32),
    Theme { index: u32, tint: Option<f64> },
    Indexed(u32),
    Auto,
}

impl Color {
    /// Opaque color from red, green and blue components.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb(0xFF00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    /// Parse an `AARRGGBB` or `RRGGBB` hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let value = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            8 => Some(Color::Rgb(value)),
            6 => Some(Color::Rgb(0xFF00_0000 | value)),
            _ => None,
        }
    }

    /// `AARRGGBB` hex for RGB colors.
    pub fn to_hex(&self) -> Option<String> {
        match self {
            Color::Rgb(argb) => Some(format!("{argb:08X}")),
            _ => None,
        }
    }

    fn from_attrs(attrs: &[(String, String)]) -> Option<Self> {
        if let Some(rgb) = xml::attr(attrs, "rgb") {
            return Color::from_hex(rgb);
        }
        if let Some(theme) = xml::attr(attrs, "theme") {
            return Some(Color::Theme {
                index: theme.parse().ok()?,
                tint: xml::attr(attrs, "tint").and_then(|t| t.parse().ok()),
            });
        }
        if let Some(indexed) = xml::attr(attrs, "indexed") {
            return indexed.parse().ok().map(Color::Indexed);
        }
        (xml::attr(attrs, "auto") == Some("1")).then_some(Color::Auto)
    }

    fn write_element(&self, out: &mut String, name: &str) {
        out.push('<');
        out.push_str(name);
        match self {
            Color::Rgb(argb) => out.push_str(&format!(" rgb=\"{argb:08X}\"")),
            Color::Theme { index, tint } => {
                out.push_str(&format!(" theme=\"{index}\""));
                if let Some(tint) = tint {
                    out.push_str(&format!(" tint=\"{tint}\""));
                }
            }
            Color::Indexed(index) => out.push_str(&format!(" indexed=\"{index}\"")),
            Color::Auto => out.push_str(" auto=\"1\""),
        }
        out.push_str("/>");
    }
}

macro_rules! xml_names {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Attribute value as written in the package.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse an attribute value.
            pub fn parse(text: &str) -> Option<Self> {
                match text {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

xml_names! {
    /// Fill pattern (`patternFill/@patternType`).
    PatternType {
        None => "none",
        Solid => "solid",
        Gray125 => "gray125",
        Gray0625 => "gray0625",
        MediumGray => "mediumGray",
        DarkGray => "darkGray",
        LightGray => "lightGray",
        DarkHorizontal => "darkHorizontal",
        DarkVertical => "darkVertical",
        DarkDown => "darkDown",
        DarkUp => "darkUp",
        DarkGrid => "darkGrid",
        DarkTrellis => "darkTrellis",
        LightHorizontal => "lightHorizontal",
        LightVertical => "lightVertical",
        LightDown => "lightDown",
        LightUp => "lightUp",
        LightGrid => "lightGrid",
        LightTrellis => "lightTrellis",
    }
}

xml_names! {
    /// Border line style.
    BorderStyle {
        None => "none",
        Thin => "thin",
        Medium => "medium",
        Thick => "thick",
        Dashed => "dashed",
        Dotted => "dotted",
        Double => "double",
        Hair => "hair",
        MediumDashed => "mediumDashed",
        DashDot => "dashDot",
        MediumDashDot => "mediumDashDot",
        DashDotDot => "dashDotDot",
        MediumDashDotDot => "mediumDashDotDot",
        SlantDashDot => "slantDashDot",
    }
}

/// Find the first descendant element named `name` and return its attributes.
fn element_attrs(fragment: &str, name: &str) -> Option<Vec<(String, String)>> {
    xml::find_section(fragment, name)
        .ok()
        .flatten()
        .map(|section| section.element.attrs)
}

/// A fill record (`<fill>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fill {
    xml: String,
}

impl Fill {
    /// Wrap a fragment read from a package.
    pub fn from_xml(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    /// The empty fill every stylesheet starts with.
    pub fn none() -> Self {
        Self::pattern(PatternType::None, None, None)
    }

    /// The second mandatory fill.
    pub fn gray125() -> Self {
        Self::pattern(PatternType::Gray125, None, None)
    }

    /// A solid fill of one color.
    pub fn solid(color: Color) -> Self {
        Self::pattern(PatternType::Solid, Some(color), Some(Color::Indexed(64)))
    }

    /// A pattern fill with optional foreground and background colors.
    pub fn pattern(pattern: PatternType, fg: Option<Color>, bg: Option<Color>) -> Self {
        let mut out = format!("<fill><patternFill patternType=\"{pattern}\"");
        if fg.is_none() && bg.is_none() {
            out.push_str("/></fill>");
            return Self { xml: out };
        }
        out.push('>');
        if let Some(fg) = fg {
            fg.write_element(&mut out, "fgColor");
        }
        if let Some(bg) = bg {
            bg.write_element(&mut out, "bgColor");
        }
        out.push_str("</patternFill></fill>");
        Self { xml: out }
    }

    /// The fragment text.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Pattern of a pattern fill; gradient fills report `None`.
    pub fn pattern_type(&self) -> PatternType {
        element_attrs(&self.xml, "patternFill")
            .and_then(|attrs| xml::attr(&attrs, "patternType").and_then(PatternType::parse))
            .unwrap_or(PatternType::None)
    }

    pub fn foreground_color(&self) -> Option<Color> {
        element_attrs(&self.xml, "fgColor").and_then(|attrs| Color::from_attrs(&attrs))
    }

    pub fn background_color(&self) -> Option<Color> {
        element_attrs(&self.xml, "bgColor").and_then(|attrs| Color::from_attrs(&attrs))
    }
}

/// Properties for building a font record.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub name: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Color>,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            name: "Calibri".to_string(),
            size: 11.0,
            bold: false,
            italic: false,
            underline: false,
            color: None,
        }
    }
}

impl FontSpec {
    /// Generate the font record.
    pub fn build(&self) -> Font {
        let mut out = String::from("<font>");
        if self.bold {
            out.push_str("<b/>");
        }
        if self.italic {
            out.push_str("<i/>");
        }
        if self.underline {
            out.push_str("<u/>");
        }
        out.push_str(&format!("<sz val=\"{}\"/>", self.size));
        if let Some(color) = &self.color {
            color.write_element(&mut out, "color");
        }
        out.push_str(&format!("<name val=\"{}\"/>", xml::escape(&self.name)));
        out.push_str("<family val=\"2\"/>");
        if self.name.eq_ignore_ascii_case("calibri") {
            out.push_str("<scheme val=\"minor\"/>");
        }
        out.push_str("</font>");
        Font { xml: out }
    }
}

/// A font record (`<font>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Font {
    xml: String,
}

impl Default for Font {
    fn default() -> Self {
        FontSpec::default().build()
    }
}

impl Font {
    /// Wrap a fragment read from a package.
    pub fn from_xml(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    /// The fragment text.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn name(&self) -> Option<String> {
        self.value_of("name")
    }

    pub fn size(&self) -> Option<f64> {
        self.value_of("sz").and_then(|v| v.parse().ok())
    }

    pub fn is_bold(&self) -> bool {
        self.flag("b")
    }

    pub fn is_italic(&self) -> bool {
        self.flag("i")
    }

    pub fn color(&self) -> Option<Color> {
        element_attrs(&self.xml, "color").and_then(|attrs| Color::from_attrs(&attrs))
    }

    fn value_of(&self, element: &str) -> Option<String> {
        element_attrs(&self.xml, element)
            .and_then(|attrs| xml::attr(&attrs, "val").map(str::to_string))
    }

    // `<b/>` and `<b val="1"/>` both switch the flag on.
    fn flag(&self, element: &str) -> bool {
        element_attrs(&self.xml, element)
            .map(|attrs| !matches!(xml::attr(&attrs, "val"), Some("0") | Some("false")))
            .unwrap_or(false)
    }
}

/// One side of a border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderSide {
    Left,
    Right,
    Top,
    Bottom,
    Diagonal,
}

impl BorderSide {
    const ALL: [BorderSide; 5] = [
        BorderSide::Left,
        BorderSide::Right,
        BorderSide::Top,
        BorderSide::Bottom,
        BorderSide::Diagonal,
    ];

    fn element(self) -> &'static str {
        match self {
            BorderSide::Left => "left",
            BorderSide::Right => "right",
            BorderSide::Top => "top",
            BorderSide::Bottom => "bottom",
            BorderSide::Diagonal => "diagonal",
        }
    }
}

/// A border record (`<border>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Border {
    xml: String,
}

impl Default for Border {
    fn default() -> Self {
        Self::none()
    }
}

impl Border {
    /// Wrap a fragment read from a package.
    pub fn from_xml(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    /// A border with no lines.
    pub fn none() -> Self {
        Self {
            xml: "<border><left/><right/><top/><bottom/><diagonal/></border>".to_string(),
        }
    }

    /// The same line on the four outer sides.
    pub fn outline(style: BorderStyle, color: Option<Color>) -> Self {
        let mut out = String::from("<border>");
        for side in BorderSide::ALL {
            let name = side.element();
            if side == BorderSide::Diagonal {
                out.push_str("<diagonal/>");
                continue;
            }
            out.push_str(&format!("<{name} style=\"{style}\""));
            match color {
                Some(color) => {
                    out.push('>');
                    color.write_element(&mut out, "color");
                    out.push_str(&format!("</{name}>"));
                }
                None => out.push_str("/>"),
            }
        }
        out.push_str("</border>");
        Self { xml: out }
    }

    /// The fragment text.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Line style of one side, `None` when the side has no line.
    pub fn side_style(&self, side: BorderSide) -> Option<BorderStyle> {
        element_attrs(&self.xml, side.element())
            .and_then(|attrs| xml::attr(&attrs, "style").and_then(BorderStyle::parse))
            .filter(|style| *style != BorderStyle::None)
    }
}

/// A number format: id plus format code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NumberFormat {
    pub id: u32,
    pub code: String,
}

/// A composite cell-format record (`cellXfs/xf`), referencing components by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CellFormat {
    pub num_fmt_id: u32,
    pub font_id: u32,
    pub fill_id: u32,
    pub border_id: u32,
    /// Parent cell style (`cellStyleXfs`) index
    pub xf_id: Option<u32>,
    /// Remaining attributes (`applyFill`, `quotePrefix`, ...) in document order
    pub attrs: Vec<(String, String)>,
    /// Verbatim child elements (`alignment`, `protection`, ...)
    pub children: String,
}

impl CellFormat {
    /// Set an attribute, replacing an existing value.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }

    /// Render as an `<xf>` element, with the namespace prefix of the enclosing part.
    pub fn to_xml(&self, prefix: &str) -> String {
        let mut out = format!(
            "<{prefix}xf numFmtId=\"{}\" fontId=\"{}\" fillId=\"{}\" borderId=\"{}\"",
            self.num_fmt_id, self.font_id, self.fill_id, self.border_id
        );
        if let Some(xf_id) = self.xf_id {
            out.push_str(&format!(" xfId=\"{xf_id}\""));
        }
        xml::push_attrs(&mut out, &self.attrs);
        if self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&self.children);
            out.push_str(&format!("</{prefix}xf>"));
        }
        out
    }
}

/// One component swap applied to a composite record.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleChange {
    /// Format code; built-in codes map to their built-in id
    NumberFormat(String),
    Font(Font),
    Fill(Fill),
    Border(Border),
}

/// A composite record with its components resolved, for reading styles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFormat {
    /// Composite record index
    pub index: u32,
    pub number_format: NumberFormat,
    pub is_date: bool,
    pub font: Option<Font>,
    pub fill: Option<Fill>,
    pub border: Option<Border>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_fill_fragment() {
        let fill = Fill::solid(Color::rgb(0, 0, 255));
        assert_eq!(
            fill.xml(),
            r#"<fill><patternFill patternType="solid"><fgColor rgb="FF0000FF"/><bgColor indexed="64"/></patternFill></fill>"#
        );
        assert_eq!(fill.pattern_type(), PatternType::Solid);
        assert_eq!(fill.foreground_color(), Some(Color::Rgb(0xFF0000FF)));
        assert_eq!(fill.background_color(), Some(Color::Indexed(64)));
    }

    #[test]
    fn test_fill_from_package_text() {
        let fill = Fill::from_xml(
            r#"<fill><patternFill patternType="darkGrid"><fgColor theme="4" tint="0.5"/></patternFill></fill>"#,
        );
        assert_eq!(fill.pattern_type(), PatternType::DarkGrid);
        assert_eq!(
            fill.foreground_color(),
            Some(Color::Theme {
                index: 4,
                tint: Some(0.5)
            })
        );
        assert_eq!(Fill::none().pattern_type(), PatternType::None);
        assert_eq!(Fill::from_xml("<fill><gradientFill/></fill>").pattern_type(), PatternType::None);
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::from_hex("FF0000"), Some(Color::Rgb(0xFFFF0000)));
        assert_eq!(Color::rgb(255, 0, 0).to_hex().as_deref(), Some("FFFF0000"));
        assert_eq!(Color::from_hex("xyz"), None);
        assert_eq!(Color::Auto.to_hex(), None);
    }

    #[test]
    fn test_font_spec() {
        let font = FontSpec {
            name: "Arial".to_string(),
            size: 12.0,
            bold: true,
            color: Some(Color::rgb(255, 0, 0)),
            ..FontSpec::default()
        }
        .build();
        assert_eq!(font.name().as_deref(), Some("Arial"));
        assert_eq!(font.size(), Some(12.0));
        assert!(font.is_bold());
        assert!(!font.is_italic());
        assert_eq!(font.color(), Some(Color::Rgb(0xFFFF0000)));
        assert!(!Font::from_xml(r#"<font><b val="0"/></font>"#).is_bold());
    }

    #[test]
    fn test_border_sides() {
        let border = Border::outline(BorderStyle::Thin, None);
        assert_eq!(border.side_style(BorderSide::Left), Some(BorderStyle::Thin));
        assert_eq!(border.side_style(BorderSide::Diagonal), None);
        assert_eq!(Border::none().side_style(BorderSide::Top), None);
    }

    #[test]
    fn test_cell_format_xml() {
        let mut format = CellFormat {
            num_fmt_id: 49,
            fill_id: 2,
            xf_id: Some(0),
            ..CellFormat::default()
        };
        format.set_attr("applyFill", "1");
        format.set_attr("applyFill", "1");
        assert_eq!(
            format.to_xml(""),
            r#"<xf numFmtId="49" fontId="0" fillId="2" borderId="0" xfId="0" applyFill="1"/>"#
        );
        format.children = r#"<alignment horizontal="center"/>"#.to_string();
        assert!(format.to_xml("").ends_with("<alignment horizontal=\"center\"/></xf>"));
        assert!(format.to_xml("x:").starts_with("<x:xf numFmtId=\"49\""));
        assert!(format.to_xml("x:").ends_with("</x:xf>"));
    }
}
