use std::fs;

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColors {
    pub bg: String,
    pub fg: String,
    pub muted: String,
    pub accent: String,
    pub border: String,
    pub border_focused: String,
    pub header_bg: String,
    pub header_fg: String,
    pub code_bg: String,
    pub cursor_bg: String,
    pub cursor_fg: String,
    pub correct: String,
    pub incorrect: String,
    pub warning: String,
}

impl Theme {
    /// User themes live in `{config_dir}/cquiz/themes/{name}.toml`.
    pub fn load(name: &str) -> Option<Self> {
        let path = dirs::config_dir()?
            .join("cquiz")
            .join("themes")
            .join(format!("{name}.toml"));
        let content = fs::read_to_string(path).ok()?;
        toml::from_str::<Theme>(&content).ok()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            colors: ThemeColors::default(),
        }
    }
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            bg: "#1e1e2e".to_string(),
            fg: "#cdd6f4".to_string(),
            muted: "#7f849c".to_string(),
            accent: "#89b4fa".to_string(),
            border: "#45475a".to_string(),
            border_focused: "#89b4fa".to_string(),
            header_bg: "#313244".to_string(),
            header_fg: "#cdd6f4".to_string(),
            code_bg: "#181825".to_string(),
            cursor_bg: "#f5e0dc".to_string(),
            cursor_fg: "#1e1e2e".to_string(),
            correct: "#a6e3a1".to_string(),
            incorrect: "#f38ba8".to_string(),
            warning: "#f9e2af".to_string(),
        }
    }
}

impl ThemeColors {
    pub fn parse_color(hex: &str) -> Color {
        let hex = hex.trim_start_matches('#');
        if hex.len() == 6 {
            if let (Ok(r), Ok(g), Ok(b)) = (
                u8::from_str_radix(&hex[0..2], 16),
                u8::from_str_radix(&hex[2..4], 16),
                u8::from_str_radix(&hex[4..6], 16),
            ) {
                return Color::Rgb(r, g, b);
            }
        }
        Color::White
    }

    pub fn bg(&self) -> Color { Self::parse_color(&self.bg) }
    pub fn fg(&self) -> Color { Self::parse_color(&self.fg) }
    pub fn muted(&self) -> Color { Self::parse_color(&self.muted) }
    pub fn accent(&self) -> Color { Self::parse_color(&self.accent) }
    pub fn border(&self) -> Color { Self::parse_color(&self.border) }
    pub fn border_focused(&self) -> Color { Self::parse_color(&self.border_focused) }
    pub fn header_bg(&self) -> Color { Self::parse_color(&self.header_bg) }
    pub fn header_fg(&self) -> Color { Self::parse_color(&self.header_fg) }
    pub fn code_bg(&self) -> Color { Self::parse_color(&self.code_bg) }
    pub fn cursor_bg(&self) -> Color { Self::parse_color(&self.cursor_bg) }
    pub fn cursor_fg(&self) -> Color { Self::parse_color(&self.cursor_fg) }
    pub fn correct(&self) -> Color { Self::parse_color(&self.correct) }
    pub fn incorrect(&self) -> Color { Self::parse_color(&self.incorrect) }
    pub fn warning(&self) -> Color { Self::parse_color(&self.warning) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(ThemeColors::parse_color("#ff8000"), Color::Rgb(255, 128, 0));
        assert_eq!(ThemeColors::parse_color("nope"), Color::White);
    }

    #[test]
    fn test_partial_theme_fills_defaults() {
        let theme: Theme = toml::from_str(
            "name = \"mine\"\n[colors]\naccent = \"#010203\"\n",
        )
        .unwrap();
        assert_eq!(theme.colors.accent(), Color::Rgb(1, 2, 3));
        assert_eq!(theme.colors.bg, ThemeColors::default().bg);
    }
}
