use serde::{Deserialize, Serialize};

/// Weight classes ordered by visual strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum FontWeight {
    Light,
    #[default]
    Regular,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FontStyle {
    pub weight: FontWeight,
    pub italic: bool,
}

impl FontStyle {
    /// Derive the style from a font name such as "Arial,BoldItalic" or
    /// "ABCDEF+Helvetica-Black". Done once when a span is ingested.
    pub fn from_font_name(font_name: &str) -> Self {
        let font_lower = font_name.to_lowercase();

        let weight = if font_lower.contains("black") || font_lower.contains("heavy") {
            FontWeight::Black
        } else if font_lower.contains("extrabold") || font_lower.contains("ultrabold") {
            FontWeight::ExtraBold
        } else if font_lower.contains("semibold") || font_lower.contains("demibold") {
            FontWeight::SemiBold
        } else if font_lower.contains("bold") {
            FontWeight::Bold
        } else if font_lower.contains("medium") {
            FontWeight::Medium
        } else if font_lower.contains("light") || font_lower.contains("thin") {
            FontWeight::Light
        } else {
            FontWeight::Regular
        };

        let italic = font_lower.contains("italic") || font_lower.contains("oblique");

        Self { weight, italic }
    }

    /// Bold or heavier, the weight the heading rules treat as emphasized.
    pub fn is_bold(&self) -> bool {
        self.weight >= FontWeight::SemiBold
    }

    /// Rank used when two headings share a size.
    pub fn weight_rank(&self) -> u8 {
        self.weight as u8
    }
}

/// Font family with subset prefix and style suffix removed,
/// e.g. "arial" from "ABCDEF+Arial,Bold".
pub fn base_family(font_name: &str) -> String {
    let name = match font_name.split_once('+') {
        Some((prefix, rest)) if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => font_name,
    };
    name.split([',', '-'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_lowercase()
}

/// Whether the font is one of the symbolic bullet fonts.
pub fn is_bullet_font(font_name: &str, bullet_fonts: &[String]) -> bool {
    let family = base_family(font_name);
    bullet_fonts.iter().any(|f| f.eq_ignore_ascii_case(&family))
}
