use crate::storage::Storage;
use crate::task::Priority;
use ratatui::style::Color;

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Colors the TUI draws with.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub background: Color,
    pub high: Color,
    pub medium: Color,
    pub low: Color,
}

impl Palette {
    pub fn priority(&self, priority: Priority) -> Color {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

impl Theme {
    pub fn load(storage: &dyn Storage) -> Self {
        match storage.get(THEME_KEY) {
            Ok(Some(raw)) if raw.trim() == "dark" => Theme::Dark,
            Ok(_) => Theme::Light,
            Err(err) => {
                log::warn!("Failed to read theme: {err}");
                Theme::Light
            }
        }
    }

    pub fn save(self, storage: &mut dyn Storage) {
        if let Err(err) = storage.set(THEME_KEY, self.as_str()) {
            log::error!("Failed to save theme: {err}");
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Light => Palette {
                text: Color::Black,
                muted: Color::DarkGray,
                accent: Color::Blue,
                background: Color::White,
                high: Color::Red,
                medium: Color::Yellow,
                low: Color::Green,
            },
            Theme::Dark => Palette {
                text: Color::White,
                muted: Color::Gray,
                accent: Color::Cyan,
                background: Color::Black,
                high: Color::LightRed,
                medium: Color::LightYellow,
                low: Color::LightGreen,
            },
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(crate::error::Error::InvalidInput(format!("unknown theme '{other}'"))),
        }
    }
}
