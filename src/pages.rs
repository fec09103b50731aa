//! HTML pages rendered from the embedded Handlebars templates, plus the
//! flash-message convention: one-shot messages ride along in the redirect's
//! query string (`?error=` / `?ok=`).

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use handlebars::{Handlebars, TemplateError};
use serde::{Deserialize, Serialize};

/// One-shot user message shown at the top of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ok: Option<String>,
}

impl Flash {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ok: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: None,
            ok: Some(message.into()),
        }
    }

    /// Query string carrying this flash, empty when there is nothing to say.
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(error) = &self.error {
            parts.push(format!("error={}", urlencoding::encode(error)));
        }
        if let Some(ok) = &self.ok {
            parts.push(format!("ok={}", urlencoding::encode(ok)));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }
}

/// Redirect to `path` with a flash message attached.
pub fn redirect_with(path: &str, flash: &Flash) -> Redirect {
    Redirect::to(&format!("{path}{}", flash.to_query()))
}

/// Compiled page templates.
pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    /// Compile every embedded template.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if a template fails to parse.
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_partial("header", include_str!("../templates/header.hbs"))?;
        registry.register_template_string("login", include_str!("../templates/login.hbs"))?;
        registry.register_template_string("workout", include_str!("../templates/workout.hbs"))?;
        registry.register_template_string("history", include_str!("../templates/history.hbs"))?;
        registry.register_template_string("admin", include_str!("../templates/admin.hbs"))?;
        Ok(Self { registry })
    }

    /// Render a page to HTML.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, handlebars::RenderError> {
        self.registry.render(name, data)
    }

    /// Render a page into a response; a render failure becomes a plain 500.
    pub fn page<T: Serialize>(&self, name: &str, data: &T) -> Response {
        match self.render(name, data) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!(template = name, error = %e, "Template render failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flash_query_is_encoded() {
        assert_eq!(Flash::default().to_query(), "");
        assert_eq!(
            Flash::error("Exercise may already exist.").to_query(),
            "?error=Exercise%20may%20already%20exist."
        );
        assert_eq!(Flash::ok("a&b").to_query(), "?ok=a%26b");
    }

    #[test]
    fn test_templates_compile_and_render() {
        let pages = Pages::new().unwrap();

        let html = pages
            .render("login", &json!({ "flash": Flash::error("Invalid credentials") }))
            .unwrap();
        assert!(html.contains("Discipline"));
        assert!(html.contains("Invalid credentials"));

        let html = pages
            .render(
                "workout",
                &json!({
                    "username": "admin",
                    "today": "2024-03-01",
                    "current_time": "10:30",
                    "exercises": [{ "id": 1, "name": "Leg Press", "is_active": true }],
                    "rows": [{ "id": 1, "date": "2024-03-01", "time": "10:00", "exercise": "Leg Press",
                               "reps": 10, "weight_kg": 40.0, "sets": 3, "notes": null }],
                    "finalized_today": true,
                    "flash": Flash::default(),
                }),
            )
            .unwrap();
        assert!(html.contains("Leg Press"));
        assert!(html.contains("Day finalized"));
    }

    #[test]
    fn test_user_text_is_escaped() {
        let pages = Pages::new().unwrap();
        let html = pages
            .render("history", &json!({ "rows": [{ "date": "2024-03-01", "time": "10:00",
                "exercise": "<script>", "reps": 1, "weight_kg": 1.0, "sets": 1, "notes": "" }] }))
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
