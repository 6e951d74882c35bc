//! Template rendering boundary.
//!
//! The core only needs `render(template_id, data) -> raw XML`. Any engine can
//! sit behind [`TemplateRenderer`]; closures work directly, and
//! [`DirectoryTemplates`] renders Handlebars files from a directory.

use crate::infra::error::{NfseError, NfseResult};
use handlebars::Handlebars;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

pub trait TemplateRenderer: Send + Sync {
    /// Deterministic rendering of `template_id` against `data`.
    fn render(&self, template_id: &str, data: &Value) -> NfseResult<String>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &Value) -> NfseResult<String> + Send + Sync,
{
    fn render(&self, template_id: &str, data: &Value) -> NfseResult<String> {
        self(template_id, data)
    }
}

/// Renders `<dir>/<template_id>` as a Handlebars template.
///
/// Strict mode is on, so a placeholder naming a field the data model lacks
/// is an error. Values are escaped with Handlebars' default HTML escaping,
/// which is also valid XML.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
    registry: Handlebars<'static>,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        Self {
            dir: dir.into(),
            registry,
        }
    }
}

impl TemplateRenderer for DirectoryTemplates {
    fn render(&self, template_id: &str, data: &Value) -> NfseResult<String> {
        let path = self.dir.join(template_id);
        let template = fs::read_to_string(&path).map_err(|e| {
            NfseError::TemplateError(format!("cannot read {}: {e}", path.display()))
        })?;
        self.registry
            .render_template(&template, data)
            .map_err(|e| NfseError::TemplateError(format!("{template_id}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, data: &Value) -> NfseResult<String> {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("t.xml"), template).unwrap();
        DirectoryTemplates::new(dir.path()).render("t.xml", data)
    }

    #[test]
    fn closures_are_renderers() {
        let renderer = |id: &str, data: &Value| -> NfseResult<String> {
            Ok(format!("<{id}>{}</{id}>", data["n"]))
        };
        assert_eq!(renderer.render("a", &json!({"n": 1})).unwrap(), "<a>1</a>");
    }

    #[test]
    fn substitutes_dotted_paths_with_escaping() {
        let data = json!({
            "id": "DPS1",
            "prestador": {"nome": "Silva & Filhos <ME>"},
            "valor": 150.5,
            "ausente": null
        });
        let out = render(
            r#"<infDPS Id="{{id}}"><xNome>{{ prestador.nome }}</xNome><v>{{valor}}</v><o>{{ausente}}</o></infDPS>"#,
            &data,
        )
        .unwrap();
        assert_eq!(
            out,
            r#"<infDPS Id="DPS1"><xNome>Silva &amp; Filhos &lt;ME&gt;</xNome><v>150.5</v><o></o></infDPS>"#
        );
    }

    #[test]
    fn conditional_blocks() {
        let template = "<infDPS>{{#if tomador}}<toma><CNPJ>{{tomador.cnpj}}</CNPJ></toma>{{/if}}<tpAmb>2</tpAmb></infDPS>";

        let with = render(template, &json!({"tomador": {"cnpj": "11222333000181"}})).unwrap();
        assert_eq!(
            with,
            "<infDPS><toma><CNPJ>11222333000181</CNPJ></toma><tpAmb>2</tpAmb></infDPS>"
        );

        let without = render(template, &json!({"tomador": null})).unwrap();
        assert_eq!(without, "<infDPS><tpAmb>2</tpAmb></infDPS>");
    }

    #[test]
    fn each_blocks() {
        let out = render(
            "<l>{{#each itens}}<i>{{this}}</i>{{/each}}</l>",
            &json!({"itens": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(out, "<l><i>a</i><i>b</i></l>");
    }

    #[test]
    fn missing_field_is_an_error() {
        let err = render("<m>{{missing.key}}</m>", &json!({})).unwrap_err();
        assert!(matches!(err, NfseError::TemplateError(_)));
    }

    #[test]
    fn malformed_template() {
        assert!(matches!(
            render("<a>{{#if x}}</a>", &json!({"x": true})),
            Err(NfseError::TemplateError(_))
        ));
    }

    #[test]
    fn directory_templates_read_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("dps.xml"), "<DPS>\n  <n>{{n}}</n>\n</DPS>").unwrap();
        let templates = DirectoryTemplates::new(dir.path());
        assert_eq!(
            templates.render("dps.xml", &json!({"n": "7"})).unwrap(),
            "<DPS>\n  <n>7</n>\n</DPS>"
        );
        assert!(matches!(
            templates.render("missing.xml", &json!({})),
            Err(NfseError::TemplateError(_))
        ));
    }
}
