//! Render a handlebars template, then decode the output

use handlebars::{Handlebars, no_escape};
use serde::Serialize;
use tracing::debug;

use crate::codec::{Format, decode_text};
use crate::core::Value;
use crate::error::{ArdError, ArdResult};

/// Render `template` against `data` and decode the complete output
///
/// Output is not HTML-escaped. Binary formats expect the template to
/// produce a base64 envelope.
///
/// ```rust
/// use ard::Value;
/// use ard::codec::{Format, decode_template};
/// use serde_json::json;
///
/// let value = decode_template("port: {{port}}\n", &json!({"port": 8080}), Format::Yaml).unwrap();
/// assert_eq!(value.get_key("port"), Some(&Value::Integer(8080)));
/// ```
///
/// # Errors
///
/// Returns [`ArdError::Template`] when the template does not parse or
/// render, otherwise the decode error for the rendered text.
pub fn decode_template<T>(template: &str, data: &T, format: Format) -> ArdResult<Value>
where
    T: Serialize,
{
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(no_escape);

    let rendered = handlebars
        .render_template(template, data)
        .map_err(|e| ArdError::template(e.to_string()))?;
    debug!(len = rendered.len(), format = %format, "rendered template");

    Ok(decode_text(&rendered, format, false)?.value)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::core::Map;

    #[test]
    fn test_renders_then_decodes() {
        let data = json!({"name": "a <b>", "replicas": [1, 2]});
        let template = "name: \"{{name}}\"\nreplicas:\n{{#each replicas}}  - {{this}}\n{{/each}}";

        let value = decode_template(template, &data, Format::Yaml).unwrap();

        let mut expected = Map::new();
        expected.insert(Value::string("name"), Value::string("a <b>"));
        expected.insert(
            Value::string("replicas"),
            Value::List(vec![Value::Integer(1), Value::Integer(2)]),
        );
        assert_eq!(value, Value::Map(expected));
    }

    #[test]
    fn test_value_as_data() {
        let mut data = Map::new();
        data.insert(Value::string("flag"), Value::Boolean(true));

        let value = decode_template("[{{flag}}]", &Value::Map(data), Format::Json).unwrap();
        assert_eq!(value, Value::List(vec![Value::Boolean(true)]));
    }

    #[test]
    fn test_template_errors() {
        let error = decode_template("{{#if}}", &json!({}), Format::Yaml).unwrap_err();
        assert!(matches!(error, ArdError::Template { .. }), "{error}");
    }

    #[test]
    fn test_rendered_output_must_decode() {
        let error = decode_template("[{{x}}", &json!({"x": 1}), Format::Json).unwrap_err();
        assert!(error.is_decode());
    }
}
