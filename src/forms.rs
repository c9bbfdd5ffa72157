use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Textarea,
}

impl FieldKind {
    pub fn input_type(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Textarea => "text",
            FieldKind::Email => "email",
            FieldKind::Password => "password",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
}

impl FormField {
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
        }
    }

    pub fn is_textarea(&self) -> bool {
        self.kind == FieldKind::Textarea
    }
}

/// A form the host knows how to render.
#[derive(Debug, Clone, Serialize)]
pub struct FormDefinition {
    pub id: String,
    pub label: String,
    pub fields: Vec<FormField>,
}

/// Known forms, in registration order. Consulted by the settings screen and
/// the form pages, never by the gate.
pub struct FormRegistry {
    forms: Vec<FormDefinition>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self { forms: Vec::new() }
    }

    /// Registry with the general forms every site has.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(FormDefinition {
            id: "user_register_form".to_string(),
            label: "User Registration form".to_string(),
            fields: vec![
                FormField::new("name", "Username", FieldKind::Text),
                FormField::new("mail", "E-mail address", FieldKind::Email),
            ],
        });
        registry.register(FormDefinition {
            id: "user_pass".to_string(),
            label: "User Password Reset form".to_string(),
            fields: vec![FormField::new("name", "Username or e-mail address", FieldKind::Text)],
        });
        registry.register(FormDefinition {
            id: "contact_site_form".to_string(),
            label: "Sitewide Contact form".to_string(),
            fields: vec![
                FormField::new("name", "Your name", FieldKind::Text),
                FormField::new("mail", "Your e-mail address", FieldKind::Email),
                FormField::new("subject", "Subject", FieldKind::Text),
                FormField::new("message", "Message", FieldKind::Textarea),
            ],
        });
        registry.register(FormDefinition {
            id: "contact_personal_form".to_string(),
            label: "Personal Contact forms".to_string(),
            fields: vec![
                FormField::new("subject", "Subject", FieldKind::Text),
                FormField::new("message", "Message", FieldKind::Textarea),
            ],
        });
        registry.register(FormDefinition {
            id: "comment_form".to_string(),
            label: "Comment form".to_string(),
            fields: vec![FormField::new("comment_body", "Comment", FieldKind::Textarea)],
        });
        registry
    }

    /// Register a form. A later registration with the same id replaces the
    /// earlier one in place.
    pub fn register(&mut self, form: FormDefinition) {
        match self.forms.iter_mut().find(|f| f.id == form.id) {
            Some(existing) => *existing = form,
            None => self.forms.push(form),
        }
    }

    pub fn get(&self, id: &str) -> Option<&FormDefinition> {
        self.forms.iter().find(|f| f.id == id)
    }

    pub fn list(&self) -> &[FormDefinition] {
        &self.forms
    }
}

impl Default for FormRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
