//! Localised mail templates keyed by `(template_id, locale)`.
//!
//! Templates are compiled into a single [`Tera`] instance when registered, so
//! syntax errors surface at startup rather than on the first send. HTML
//! bodies are registered under an `.html` name and therefore autoescaped.

use std::collections::{BTreeMap, HashSet};

use tera::{Context, Tera};
use thiserror::Error;

/// Locale used when a template has no variant for the requested locale.
pub const DEFAULT_FALLBACK_LOCALE: &str = "ja";

/// Composite lookup key for one template variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    pub id: String,
    pub locale: String,
}

impl TemplateKey {
    /// Build a key, normalising the locale to lower case.
    pub fn new(id: impl Into<String>, locale: impl AsRef<str>) -> Self {
        Self {
            id: id.into(),
            locale: locale.as_ref().trim().to_ascii_lowercase(),
        }
    }

    fn part_name(&self, part: &str) -> String {
        format!("{}/{}/{part}", self.id, self.locale)
    }
}

/// Raw template sources for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailTemplate {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Rendered subject and bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Errors raised while registering or rendering templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Neither the requested nor the fallback locale is registered.
    #[error("template not found: {id} ({locale})")]
    NotFound { id: String, locale: String },
    /// A template source failed to compile.
    #[error("template {name} is invalid: {message}")]
    Invalid { name: String, message: String },
    /// Rendering failed, typically because a payload value is missing.
    #[error("template {name} failed to render: {message}")]
    Render { name: String, message: String },
}

/// In-memory registry of mail templates.
#[derive(Debug)]
pub struct TemplateStore {
    tera: Tera,
    keys: HashSet<TemplateKey>,
    fallback_locale: String,
}

impl TemplateStore {
    /// Create an empty store that falls back to `fallback_locale`.
    pub fn new(fallback_locale: impl AsRef<str>) -> Self {
        Self {
            tera: Tera::default(),
            keys: HashSet::new(),
            fallback_locale: fallback_locale.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// Create a store pre-loaded with the bundled templates.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Invalid`] if a bundled template fails to
    /// compile.
    pub fn with_builtin_templates(fallback_locale: impl AsRef<str>) -> Result<Self, TemplateError> {
        let mut store = Self::new(fallback_locale);
        for (key, template) in super::builtin::templates() {
            store.register(key, template)?;
        }
        Ok(store)
    }

    /// Locale used when the requested one is missing.
    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    /// Register or replace a template variant.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Invalid`] when any part fails to compile.
    pub fn register(&mut self, key: TemplateKey, template: MailTemplate) -> Result<(), TemplateError> {
        let parts = [
            (key.part_name("subject"), template.subject),
            (key.part_name("body.txt"), template.text),
            (key.part_name("body.html"), template.html),
        ];
        for (name, source) in parts {
            self.tera
                .add_raw_template(&name, &source)
                .map_err(|err| TemplateError::Invalid {
                    name: name.clone(),
                    message: describe(&err),
                })?;
        }
        self.keys.insert(key);
        Ok(())
    }

    /// Resolve the variant to use for `(id, locale)`.
    ///
    /// Falls back to the configured fallback locale when the exact locale is
    /// not registered.
    pub fn resolve(&self, id: &str, locale: &str) -> Result<TemplateKey, TemplateError> {
        let exact = TemplateKey::new(id, locale);
        if self.keys.contains(&exact) {
            return Ok(exact);
        }
        let fallback = TemplateKey::new(id, &self.fallback_locale);
        if self.keys.contains(&fallback) {
            tracing::debug!(
                template_id = id,
                requested_locale = locale,
                fallback_locale = %self.fallback_locale,
                "mail template locale fell back"
            );
            return Ok(fallback);
        }
        Err(TemplateError::NotFound {
            id: id.to_owned(),
            locale: exact.locale,
        })
    }

    /// Render the subject and bodies of `(id, locale)` with `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] when no variant resolves and
    /// [`TemplateError::Render`] when rendering fails.
    pub fn render(
        &self,
        id: &str,
        locale: &str,
        payload: &BTreeMap<String, serde_json::Value>,
    ) -> Result<RenderedMail, TemplateError> {
        let key = self.resolve(id, locale)?;
        let context = Context::from_serialize(payload).map_err(|err| TemplateError::Render {
            name: key.part_name("context"),
            message: describe(&err),
        })?;
        Ok(RenderedMail {
            subject: self.render_part(&key, "subject", &context)?.trim().to_owned(),
            text: self.render_part(&key, "body.txt", &context)?,
            html: self.render_part(&key, "body.html", &context)?,
        })
    }

    fn render_part(&self, key: &TemplateKey, part: &str, context: &Context) -> Result<String, TemplateError> {
        let name = key.part_name(part);
        self.tera
            .render(&name, context)
            .map_err(|err| TemplateError::Render {
                message: describe(&err),
                name,
            })
    }
}

/// Flatten a Tera error and its sources into one line.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
