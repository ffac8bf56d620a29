use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Terminal palette for CLI output
#[derive(Debug, Clone)]
pub struct Theme {
    pub title: Style,
    pub ok: Style,
    pub failure: Style,
    pub label: Style,
    pub revision: Style,
    pub secret: Style,
}

impl Theme {
    /// Styled only when stdout is a terminal and `NO_COLOR` is unset.
    pub fn detect() -> Self {
        let colored = std::env::var_os("NO_COLOR").is_none() && console::Term::stdout().is_term();
        if colored { Self::colored() } else { Self::plain() }
    }

    pub fn colored() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            ok: Style::new().green().bold(),
            failure: Style::new().red().bold(),
            label: Style::new().bright_black(),
            revision: Style::new().yellow(),
            secret: Style::new().red().italic(),
        }
    }

    pub fn plain() -> Self {
        Self {
            title: Style::new(),
            ok: Style::new(),
            failure: Style::new(),
            label: Style::new(),
            revision: Style::new(),
            secret: Style::new(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
