//! Per-route request body schemas.
//!
//! A [`RouteSchema`] lists the fields a JSON body must (or may) carry and
//! the bounds on each. Unknown fields are ignored. Routes without a schema
//! are not validated at all: that is the gate's one fail-open point, so
//! every route that accepts a privileged payload must be registered here.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Type and bounds of a single field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text {
        min_chars: Option<usize>,
        max_chars: Option<usize>,
        pattern: Option<Regex>,
    },
    OneOf(&'static [&'static str]),
    Uuid,
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Boolean,
    Object,
}

impl FieldKind {
    pub fn text() -> Self {
        FieldKind::Text {
            min_chars: None,
            max_chars: None,
            pattern: None,
        }
    }

    pub fn text_between(min_chars: usize, max_chars: usize) -> Self {
        FieldKind::Text {
            min_chars: Some(min_chars),
            max_chars: Some(max_chars),
            pattern: None,
        }
    }

    pub fn text_matching(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(FieldKind::Text {
            min_chars: None,
            max_chars: None,
            pattern: Some(Regex::new(pattern)?),
        })
    }

    pub fn number_between(min: f64, max: f64) -> Self {
        FieldKind::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    fn check(&self, name: &str, value: &Value) -> Option<String> {
        match self {
            FieldKind::Text {
                min_chars,
                max_chars,
                pattern,
            } => {
                let Some(s) = value.as_str() else {
                    return Some(format!("{name}: expected string"));
                };
                let chars = s.chars().count();
                if let Some(min) = min_chars
                    && chars < *min
                {
                    return Some(format!("{name}: must be at least {min} characters"));
                }
                if let Some(max) = max_chars
                    && chars > *max
                {
                    return Some(format!("{name}: must be at most {max} characters"));
                }
                if let Some(re) = pattern
                    && !re.is_match(s)
                {
                    return Some(format!("{name}: must match {}", re.as_str()));
                }
                None
            }
            FieldKind::OneOf(options) => match value.as_str() {
                Some(s) if options.contains(&s) => None,
                _ => Some(format!("{name}: must be one of {}", options.join(", "))),
            },
            FieldKind::Uuid => match value.as_str() {
                Some(s) if s.len() == 36 && uuid::Uuid::parse_str(s).is_ok() => None,
                _ => Some(format!("{name}: must be a UUID")),
            },
            FieldKind::Number { min, max } => {
                let Some(n) = value.as_f64() else {
                    return Some(format!("{name}: expected number"));
                };
                if let Some(min) = min
                    && n < *min
                {
                    return Some(format!("{name}: must be >= {min}"));
                }
                if let Some(max) = max
                    && n > *max
                {
                    return Some(format!("{name}: must be <= {max}"));
                }
                None
            }
            FieldKind::Boolean => {
                (!value.is_boolean()).then(|| format!("{name}: expected boolean"))
            }
            FieldKind::Object => (!value.is_object()).then(|| format!("{name}: expected object")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: true,
            kind,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: false,
            kind,
        }
    }
}

/// The body contract of one route.
#[derive(Debug, Clone)]
pub struct RouteSchema {
    route: String,
    fields: Vec<FieldSpec>,
}

impl RouteSchema {
    pub fn new(route: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            route: route.into(),
            fields,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Every problem with `body`, in field order. Empty means valid.
    pub fn validate(&self, body: &Value) -> Result<(), Vec<String>> {
        let Some(object) = body.as_object() else {
            return Err(vec!["body: expected object".to_string()]);
        };

        let errors: Vec<String> = self
            .fields
            .iter()
            .filter_map(|field| check_field(field, object))
            .collect();

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn check_field(field: &FieldSpec, object: &Map<String, Value>) -> Option<String> {
    match object.get(field.name) {
        Some(value) => field.kind.check(field.name, value),
        None if field.required => Some(format!("{}: required", field.name)),
        None => None,
    }
}

/// Route path to schema. Lookups are by exact path.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, RouteSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The application's privileged API routes.
    pub fn builtin() -> Result<Self, regex_lite::Error> {
        let mut registry = Self::new();

        registry.register(RouteSchema::new(
            "/api/run",
            vec![
                FieldSpec::required("module_id", FieldKind::text_matching(r"^M\d{2}$")?),
                FieldSpec::required("domain", FieldKind::text()),
                FieldSpec::required("output_format", FieldKind::text()),
                FieldSpec::required("inputs", FieldKind::Object),
                FieldSpec::optional("custom", FieldKind::Object),
            ],
        ));

        registry.register(RouteSchema::new(
            "/api/export",
            vec![
                FieldSpec::required("run_id", FieldKind::Uuid),
                FieldSpec::required(
                    "format",
                    FieldKind::OneOf(&["txt", "md", "pdf", "json", "zip"]),
                ),
                FieldSpec::optional("include_telemetry", FieldKind::Boolean),
            ],
        ));

        registry.register(RouteSchema::new(
            "/api/gpt-test",
            vec![
                FieldSpec::required("prompt", FieldKind::text_between(1, 2000)),
                FieldSpec::optional("model", FieldKind::text()),
                FieldSpec::optional("temperature", FieldKind::number_between(0.0, 2.0)),
            ],
        ));

        registry.register(RouteSchema::new(
            "/v1/authorize",
            vec![
                FieldSpec::required("kind", FieldKind::text_between(1, 32)),
                FieldSpec::optional("target", FieldKind::text_between(1, 4096)),
            ],
        ));

        Ok(registry)
    }

    /// Add or replace the schema for its route.
    pub fn register(&mut self, schema: RouteSchema) {
        tracing::debug!(
            route = %schema.route,
            fields = schema.fields.len(),
            "Route schema registered"
        );
        self.schemas.insert(schema.route.clone(), schema);
    }

    pub fn get(&self, path: &str) -> Option<&RouteSchema> {
        self.schemas.get(path)
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
