//! Template registry – the fixed catalog of invitation designs.
//!
//! Each template pairs markup and a stylesheet, both carrying `{{name}}`
//! placeholders, plus the ordered list of font families the design needs.
//! The catalog is built once by the composition root and is read-only for
//! the lifetime of the process.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Event category a template is designed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    Wedding,
    Birthday,
    Baptism,
    BabyShower,
}

/// A single invitation design.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub category: EventCategory,
    /// Markup with `{{name}}` placeholders.
    pub markup: String,
    /// Stylesheet; may also reference placeholders (theme colors, background).
    pub stylesheet: String,
    /// Font families required before rasterization, in preference order.
    pub required_fonts: Vec<String>,
}

/// Read-only catalog of templates keyed by id.
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    /// Build the registry from an explicit list of templates.
    pub fn new(templates: Vec<Template>) -> Self {
        let templates = templates.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self { templates }
    }

    /// Build the registry with the builtin design catalog.
    pub fn builtin() -> Self {
        Self::new(vec![
            wedding_elegant(),
            birthday_festive(),
            baptism_angelic(),
            baby_shower_sweet(),
        ])
    }

    /// Look up a template. Unknown ids abort the whole generation request.
    pub fn get(&self, id: &str) -> Result<&Template> {
        self.templates
            .get(id)
            .ok_or_else(|| Error::TemplateNotFound { id: id.to_string() })
    }

    /// Ids of every registered template, in no particular order.
    pub fn ids(&self) -> Vec<&str> {
        self.templates.keys().map(|s| s.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Builtin catalog
// ---------------------------------------------------------------------------

fn wedding_elegant() -> Template {
    Template {
        id: "boda-elegante".to_string(),
        name: "Boda Elegante".to_string(),
        category: EventCategory::Wedding,
        markup: r##"
<div class="invitation-container wedding-elegant">
    <div class="invitation-header">
        <div class="ornament top"></div>
        <h1 class="event-title">{{eventTitle}}</h1>
        <div class="ornament bottom"></div>
    </div>
    <div class="invitation-body">
        <h2 class="names">{{names}}</h2>
        <div class="details-section">
            <p class="detail-text">{{date}}</p>
            <p class="detail-text">{{time}}</p>
            <p class="detail-text">{{location}}</p>
        </div>
        <p class="message">{{message}}</p>
        <a href="{{rsvpLink}}" class="rsvp-button">Confirmar Asistencia</a>
    </div>
</div>
"##
        .to_string(),
        stylesheet: r##"
.invitation-container.wedding-elegant {
    max-width: 600px;
    margin: 0 auto;
    background: linear-gradient(135deg, #fdf2f8, #faf5ff);
    padding: 40px;
    font-family: 'Source Sans Pro', sans-serif;
    color: #333;
}
.invitation-container.wedding-elegant::before {
    background: url('{{backgroundImage}}') center/cover;
    opacity: 0.1;
}
.ornament {
    background: linear-gradient(to right, {{primaryColor}}, {{secondaryColor}});
}
.event-title {
    font-family: 'Playfair Display', serif;
    font-size: 2.5rem;
    background: linear-gradient(to right, {{primaryColor}}, {{secondaryColor}});
}
.names {
    font-family: 'Playfair Display', serif;
    font-size: 3rem;
    color: #333;
}
.detail-text { font-size: 1.2rem; color: #555; }
.message { font-style: italic; font-size: 1.1rem; color: #666; }
.rsvp-button {
    background: linear-gradient(to right, {{primaryColor}}, {{secondaryColor}});
    color: white;
    padding: 15px 30px;
    border-radius: 30px;
}
"##
        .to_string(),
        required_fonts: vec![
            "Playfair Display".to_string(),
            "Source Sans Pro".to_string(),
        ],
    }
}

fn birthday_festive() -> Template {
    Template {
        id: "cumple-festivo".to_string(),
        name: "Cumpleaños Festivo".to_string(),
        category: EventCategory::Birthday,
        markup: r##"
<div class="invitation-container birthday-festive">
    <div class="party-header">
        <h1 class="party-title">{{eventTitle}}</h1>
        <p class="celebration-text">¡Es hora de celebrar!</p>
    </div>
    <h2 class="birthday-name">{{names}}</h2>
    <div class="party-details">
        <p class="detail-text">{{date}}</p>
        <p class="detail-text">{{time}}</p>
        <p class="detail-text">{{location}}</p>
    </div>
    <p class="message">{{message}}</p>
    <a href="{{rsvpLink}}" class="rsvp-button">¡Confirma tu asistencia!</a>
</div>
"##
        .to_string(),
        stylesheet: r##"
.invitation-container.birthday-festive {
    max-width: 600px;
    margin: 0 auto;
    background: linear-gradient(45deg, {{primaryColor}}, {{secondaryColor}});
    padding: 40px;
    font-family: 'Open Sans', sans-serif;
    color: #333;
}
.party-title {
    font-family: 'Fredoka One', cursive;
    font-size: 2.5rem;
    color: {{primaryColor}};
}
.celebration-text { font-size: 1.2rem; color: {{secondaryColor}}; }
.birthday-name {
    font-family: 'Fredoka One', cursive;
    font-size: 3rem;
    color: #333;
}
.detail-text { font-size: 1.1rem; color: #333; }
.message {
    font-size: 1.1rem;
    color: #555;
    border-left: 4px solid {{primaryColor}};
}
.rsvp-button {
    background: linear-gradient(45deg, {{primaryColor}}, {{secondaryColor}});
    color: white;
    padding: 15px 30px;
    border-radius: 25px;
}
"##
        .to_string(),
        required_fonts: vec!["Fredoka One".to_string(), "Open Sans".to_string()],
    }
}

fn baptism_angelic() -> Template {
    Template {
        id: "bautizo-angelical".to_string(),
        name: "Bautizo Angelical".to_string(),
        category: EventCategory::Baptism,
        markup: r##"
<div class="invitation-container baptism-angelic">
    <div class="sacred-header">
        <h1 class="sacred-title">{{eventTitle}}</h1>
    </div>
    <h2 class="child-name">{{names}}</h2>
    <p class="blessing-text">Será bendecido(a) en el nombre del Señor</p>
    <div class="ceremony-details">
        <p class="detail-text">{{date}}</p>
        <p class="detail-text">{{time}}</p>
        <p class="detail-text">{{location}}</p>
    </div>
    <p class="message">{{message}}</p>
    <a href="{{rsvpLink}}" class="rsvp-button">Confirmar Asistencia</a>
    <p class="blessing-footer">Que la paz del Señor esté con ustedes</p>
</div>
"##
        .to_string(),
        stylesheet: r##"
.invitation-container.baptism-angelic {
    max-width: 600px;
    margin: 0 auto;
    background: linear-gradient(135deg, #f8f9ff, #e8f4fd);
    padding: 40px;
    font-family: 'Lato', sans-serif;
    color: #4a5568;
}
.sacred-title {
    font-family: 'Dancing Script', cursive;
    font-size: 2.8rem;
    color: {{primaryColor}};
}
.child-name {
    font-family: 'Dancing Script', cursive;
    font-size: 3.5rem;
    color: #2d3748;
}
.blessing-text { font-style: italic; color: {{secondaryColor}}; }
.detail-text { font-size: 1.2rem; color: #4a5568; }
.message { font-style: italic; font-size: 1.1rem; color: #4a5568; }
.rsvp-button {
    background: linear-gradient(135deg, {{primaryColor}}, {{secondaryColor}});
    color: white;
    padding: 15px 35px;
    border-radius: 30px;
}
.blessing-footer { font-style: italic; color: {{secondaryColor}}; }
"##
        .to_string(),
        required_fonts: vec!["Dancing Script".to_string(), "Lato".to_string()],
    }
}

fn baby_shower_sweet() -> Template {
    Template {
        id: "baby-dulce".to_string(),
        name: "Baby Shower Dulce".to_string(),
        category: EventCategory::BabyShower,
        markup: r##"
<div class="invitation-container baby-sweet">
    <div class="sweet-header">
        <h1 class="sweet-title">{{eventTitle}}</h1>
    </div>
    <h2 class="parents-names">{{names}}</h2>
    <p class="expecting-text">¡Esperan la llegada de su bebé!</p>
    <div class="shower-details">
        <p class="detail-text">{{date}}</p>
        <p class="detail-text">{{time}}</p>
        <p class="detail-text">{{location}}</p>
    </div>
    <p class="message">{{message}}</p>
    <a href="{{rsvpLink}}" class="rsvp-button">¡Confirma tu asistencia!</a>
    <p class="baby-footer">¡Celebremos juntos este momento especial!</p>
</div>
"##
        .to_string(),
        stylesheet: r##"
.invitation-container.baby-sweet {
    max-width: 600px;
    margin: 0 auto;
    background: linear-gradient(135deg, #fef7f0, #fdf2f8, #f0f9ff);
    padding: 40px;
    font-family: 'Nunito', sans-serif;
    color: #374151;
}
.sweet-title {
    font-family: 'Quicksand', sans-serif;
    font-size: 2.5rem;
    color: {{primaryColor}};
}
.parents-names {
    font-family: 'Quicksand', sans-serif;
    font-size: 2.8rem;
    color: #374151;
}
.expecting-text { font-style: italic; color: {{secondaryColor}}; }
.detail-text { font-size: 1.1rem; color: #374151; }
.message { font-style: italic; font-size: 1.1rem; color: #4b5563; }
.rsvp-button {
    background: linear-gradient(135deg, {{primaryColor}}, {{secondaryColor}});
    color: white;
    padding: 18px 35px;
    border-radius: 25px;
}
.baby-footer { font-style: italic; color: {{secondaryColor}}; }
"##
        .to_string(),
        required_fonts: vec!["Quicksand".to_string(), "Nunito".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_all_designs() {
        let registry = TemplateRegistry::builtin();
        for id in [
            "boda-elegante",
            "cumple-festivo",
            "bautizo-angelical",
            "baby-dulce",
        ] {
            let t = registry.get(id).unwrap();
            assert_eq!(t.id, id);
            assert!(!t.markup.is_empty());
            assert!(!t.stylesheet.is_empty());
            assert_eq!(t.required_fonts.len(), 2);
        }
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = TemplateRegistry::builtin();
        match registry.get("no-such-design") {
            Err(Error::TemplateNotFound { id }) => assert_eq!(id, "no-such-design"),
            other => panic!("expected TemplateNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn templates_reference_only_known_placeholders() {
        use crate::substitute::Placeholder;
        let registry = TemplateRegistry::builtin();
        let known: Vec<&str> = Placeholder::ALL.iter().map(|p| p.token()).collect();

        for id in registry.ids() {
            let t = registry.get(id).unwrap();
            for source in [&t.markup, &t.stylesheet] {
                let mut rest = source.as_str();
                while let Some(start) = rest.find("{{") {
                    let after = &rest[start..];
                    let end = after.find("}}").expect("unterminated placeholder") + 2;
                    let token = &after[..end];
                    assert!(
                        known.contains(&token),
                        "template '{}' uses unknown placeholder {}",
                        id,
                        token
                    );
                    rest = &after[end..];
                }
            }
        }
    }
}
