//! Placeholder substitution – merges a customization record into a template.
//!
//! Placeholders form a closed, enumerated set ([`Placeholder`]); each variant
//! knows its `{{token}}` and how to resolve a value from the customization.
//! Every occurrence of a known token is replaced in both markup and
//! stylesheet; tokens outside the set are left verbatim so callers can detect
//! them by scanning for the `{{` delimiter.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::template::Template;

/// Caller-supplied field values for one invitation instance.
///
/// Every field except `template_id` is optional; empty strings are treated
/// as absent so the rendered artifact never shows a blank field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Customization {
    pub template_id: String,
    pub title: Option<String>,
    pub names: Option<String>,
    /// Event date in `YYYY-MM-DD` form.
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub message: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    /// Reference (URL or data URI) to a background image.
    pub background_image: Option<String>,
    /// Identifier used to build the RSVP link.
    pub event_id: Option<String>,
}

impl Customization {
    fn field<'a>(value: &'a Option<String>) -> Option<&'a str> {
        value.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// The closed set of recognized placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    EventTitle,
    Names,
    Date,
    Time,
    Location,
    Message,
    RsvpLink,
    BackgroundImage,
    PrimaryColor,
    SecondaryColor,
}

impl Placeholder {
    pub const ALL: [Placeholder; 10] = [
        Placeholder::EventTitle,
        Placeholder::Names,
        Placeholder::Date,
        Placeholder::Time,
        Placeholder::Location,
        Placeholder::Message,
        Placeholder::RsvpLink,
        Placeholder::BackgroundImage,
        Placeholder::PrimaryColor,
        Placeholder::SecondaryColor,
    ];

    /// The literal token as it appears in template markup and stylesheets.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::EventTitle => "{{eventTitle}}",
            Placeholder::Names => "{{names}}",
            Placeholder::Date => "{{date}}",
            Placeholder::Time => "{{time}}",
            Placeholder::Location => "{{location}}",
            Placeholder::Message => "{{message}}",
            Placeholder::RsvpLink => "{{rsvpLink}}",
            Placeholder::BackgroundImage => "{{backgroundImage}}",
            Placeholder::PrimaryColor => "{{primaryColor}}",
            Placeholder::SecondaryColor => "{{secondaryColor}}",
        }
    }

    /// Resolve the replacement value: customization field when present and
    /// non-empty, otherwise the localized default.
    pub fn resolve(self, c: &Customization, origin: &str) -> String {
        match self {
            Placeholder::EventTitle => Customization::field(&c.title)
                .unwrap_or("Tu Evento Especial")
                .to_string(),
            Placeholder::Names => Customization::field(&c.names)
                .unwrap_or("Nombres")
                .to_string(),
            Placeholder::Date => match Customization::field(&c.date) {
                Some(raw) => format_event_date(raw),
                None => "Fecha".to_string(),
            },
            Placeholder::Time => Customization::field(&c.time).unwrap_or("Hora").to_string(),
            Placeholder::Location => Customization::field(&c.location)
                .unwrap_or("Ubicación")
                .to_string(),
            Placeholder::Message => Customization::field(&c.message)
                .unwrap_or("Mensaje especial...")
                .to_string(),
            Placeholder::RsvpLink => {
                let event_id = Customization::field(&c.event_id).unwrap_or("default");
                format!("{}/rsvp/{}", origin.trim_end_matches('/'), event_id)
            }
            Placeholder::BackgroundImage => Customization::field(&c.background_image)
                .unwrap_or("")
                .to_string(),
            Placeholder::PrimaryColor => Customization::field(&c.primary_color)
                .unwrap_or("#ec4899")
                .to_string(),
            Placeholder::SecondaryColor => Customization::field(&c.secondary_color)
                .unwrap_or("#a855f7")
                .to_string(),
        }
    }
}

/// Result of substituting a customization into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub markup: String,
    pub stylesheet: String,
}

/// Replace every occurrence of each known placeholder in both the markup and
/// the stylesheet. Pure; calling twice with the same inputs yields identical
/// output.
pub fn substitute(template: &Template, customization: &Customization, origin: &str) -> Substituted {
    let mut markup = template.markup.clone();
    let mut stylesheet = template.stylesheet.clone();

    for placeholder in Placeholder::ALL {
        let value = placeholder.resolve(customization, origin);
        let token = placeholder.token();
        markup = markup.replace(token, &value);
        stylesheet = stylesheet.replace(token, &value);
    }

    Substituted { markup, stylesheet }
}

// ---------------------------------------------------------------------------
// Date formatting
// ---------------------------------------------------------------------------

const WEEKDAYS: [&str; 7] = [
    "lunes",
    "martes",
    "miércoles",
    "jueves",
    "viernes",
    "sábado",
    "domingo",
];

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Render a `YYYY-MM-DD` date in long Spanish form, e.g.
/// `viernes, 20 de junio de 2025`. Malformed input becomes the literal
/// "Fecha inválida" rather than an error.
pub fn format_event_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => {
            let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
            let month = MONTHS[date.month0() as usize];
            format!("{}, {} de {} de {}", weekday, date.day(), month, date.year())
        }
        Err(_) => "Fecha inválida".to_string(),
    }
}

/// Year of the event date, falling back to the current year when the date is
/// absent or malformed. Used by slug derivation.
pub fn event_year(customization: &Customization) -> i32 {
    Customization::field(&customization.date)
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
        .map(|d| d.year())
        .unwrap_or_else(|| chrono::Utc::now().year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateRegistry;

    const ORIGIN: &str = "https://inviteu.digital";

    fn customization() -> Customization {
        Customization {
            template_id: "boda-elegante".to_string(),
            names: Some("Ana y Luis".to_string()),
            date: Some("2025-06-20".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn replaces_supplied_and_default_fields() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("boda-elegante").unwrap();
        let out = substitute(template, &customization(), ORIGIN);

        assert!(out.markup.contains("Ana y Luis"));
        assert!(out.markup.contains("viernes, 20 de junio de 2025"));
        // Missing title falls back to the localized default, never blank.
        assert!(out.markup.contains("Tu Evento Especial"));
        assert!(!out.markup.contains("{{names}}"));
        assert!(!out.markup.contains("{{"));
    }

    #[test]
    fn stylesheet_gets_theme_colors() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("cumple-festivo").unwrap();
        let mut c = customization();
        c.primary_color = Some("#112233".to_string());
        let out = substitute(template, &c, ORIGIN);

        assert!(out.stylesheet.contains("#112233"));
        assert!(out.stylesheet.contains("#a855f7")); // default secondary
        assert!(!out.stylesheet.contains("{{primaryColor}}"));
    }

    #[test]
    fn unknown_tokens_stay_verbatim() {
        let mut template = TemplateRegistry::builtin()
            .get("boda-elegante")
            .unwrap()
            .clone();
        template.markup.push_str("<p>{{mystery}}</p>");
        let out = substitute(&template, &customization(), ORIGIN);
        assert!(out.markup.contains("{{mystery}}"));
    }

    #[test]
    fn substitution_is_idempotent() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("baby-dulce").unwrap();
        let c = customization();
        let a = substitute(template, &c, ORIGIN);
        let b = substitute(template, &c, ORIGIN);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_string_counts_as_absent() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("boda-elegante").unwrap();
        let mut c = customization();
        c.location = Some("   ".to_string());
        let out = substitute(template, &c, ORIGIN);
        assert!(out.markup.contains("Ubicación"));
    }

    #[test]
    fn rsvp_link_uses_origin_and_event_id() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("boda-elegante").unwrap();
        let mut c = customization();
        c.event_id = Some("ev42".to_string());
        let out = substitute(template, &c, ORIGIN);
        assert!(out.markup.contains("https://inviteu.digital/rsvp/ev42"));
    }

    #[test]
    fn spanish_long_dates() {
        assert_eq!(
            format_event_date("2025-06-20"),
            "viernes, 20 de junio de 2025"
        );
        assert_eq!(
            format_event_date("2026-01-01"),
            "jueves, 1 de enero de 2026"
        );
        assert_eq!(format_event_date("not-a-date"), "Fecha inválida");
        assert_eq!(format_event_date("2025-13-40"), "Fecha inválida");
    }

    #[test]
    fn event_year_falls_back_to_current() {
        let mut c = customization();
        assert_eq!(event_year(&c), 2025);
        c.date = Some("garbage".to_string());
        assert_eq!(event_year(&c), chrono::Utc::now().year());
    }
}
