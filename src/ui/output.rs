use crate::property::Property;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

/// Title line followed by a subtitle
pub fn banner(title: &str, subtitle: &str) {
    println!();
    println!("{}", title.style(theme().title.clone()));
    println!("{}", subtitle.style(theme().label.clone()));
    println!();
}

pub fn success(message: &str) {
    println!("{} {}", Icons::STORED, message.style(theme().ok.clone()));
}

pub fn error(message: &str) {
    eprintln!("{} {}", Icons::FAILED, message.style(theme().failure.clone()));
}

/// Aligned `label value` line
pub fn field(label: &str, value: &str) {
    println!("  {:>10} {}", label.style(theme().label.clone()), value);
}

/// One line per stored property: identity and resulting revision
pub fn stored(property: &Property) {
    println!(
        "{} {}{}{} {}",
        Icons::STORED,
        property.namespace,
        "/".style(theme().label.clone()),
        property.key.bold(),
        format!("rev {}", property.revision).style(theme().revision.clone())
    );
}
