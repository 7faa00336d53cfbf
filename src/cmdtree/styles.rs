use console::Style;
use helpdoc::{rgb_to_ansi256, Theme};
use once_cell::sync::Lazy;

pub static HELP_THEME: Lazy<Theme> = Lazy::new(|| {
    Theme::new()
        .add("heading", Style::new().bold())
        .add("flag", Style::new().bold())
        .add("positional", Style::new().underlined())
        .add("group", Style::new().cyan().bold())
        .add("command", Style::new().cyan())
        .add("deprecated", Style::new().yellow())
        .add(
            "muted",
            Style::new()
                .color256(rgb_to_ansi256((154, 154, 154)))
                .italic(),
        )
});
