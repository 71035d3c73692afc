//! Prompt templates.
//!
//! Two template formats are understood:
//!
//! - `f-string` (default): `{variable}` placeholders, literal braces written
//!   doubled as `{{` and `}}`.
//! - `jinja2`: rendered as-is by MiniJinja.
//!
//! Both formats render through the same MiniJinja environment with strict
//! undefined handling; an f-string is compiled to an equivalent Jinja source
//! first.

use minijinja::{Environment, UndefinedBehavior, Value as MJValue};
use rustedclaw_load::{BuildError, Buildable, Kwargs, LiveValue, Serializable, TypeDecl};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;

pub const BASE_PROMPT_TEMPLATE: TypeDecl = TypeDecl::new("BasePromptTemplate");

/// Name under which f-string variables are exposed to the compiled template.
const FSTRING_SCOPE: &str = "vars";

/// Errors from parsing or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unclosed '{{' at byte {position}")]
    UnclosedBrace { position: usize },

    #[error("single '}}' at byte {position}")]
    UnmatchedClose { position: usize },

    #[error("empty placeholder at byte {position}")]
    EmptyPlaceholder { position: usize },

    #[error("missing value for variable `{0}`")]
    MissingVariable(String),

    #[error("unsupported template format {0:?}")]
    UnsupportedFormat(String),

    #[error("template error: {0}")]
    Template(String),
}

impl From<minijinja::Error> for FormatError {
    fn from(e: minijinja::Error) -> Self {
        FormatError::Template(e.to_string())
    }
}

/// How a template's placeholders are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateFormat {
    #[default]
    FString,
    Jinja2,
}

impl TemplateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFormat::FString => "f-string",
            TemplateFormat::Jinja2 => "jinja2",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, FormatError> {
        match raw {
            "f-string" => Ok(TemplateFormat::FString),
            "jinja2" => Ok(TemplateFormat::Jinja2),
            other => Err(FormatError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A string template rendered by substituting named variables.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    template_format: TemplateFormat,
    input_variables: Vec<String>,
    /// MiniJinja source the template renders through.
    source: String,
    kwargs: Kwargs,
}

impl PromptTemplate {
    /// Parse an f-string template, inferring its input variables.
    pub fn new(template: impl Into<String>) -> Result<Self, FormatError> {
        let template = template.into();
        let segments = parse(&template)?;
        let input_variables = variables(&segments);
        let source = jinja_source(&segments);

        let mut kwargs = Kwargs::new();
        kwargs.insert("template", template.clone());
        kwargs.insert("inputVariables", string_list(&input_variables));

        Ok(Self {
            template,
            template_format: TemplateFormat::FString,
            input_variables,
            source,
            kwargs,
        })
    }

    /// A Jinja template. Its variables are not inferred and must be declared.
    pub fn jinja2(
        template: impl Into<String>,
        input_variables: Vec<String>,
    ) -> Result<Self, FormatError> {
        let template = template.into();
        compile_check(&template)?;

        let mut kwargs = Kwargs::new();
        kwargs.insert("template", template.clone());
        kwargs.insert("inputVariables", string_list(&input_variables));
        kwargs.insert("templateFormat", TemplateFormat::Jinja2.as_str());

        Ok(Self {
            source: template.clone(),
            template,
            template_format: TemplateFormat::Jinja2,
            input_variables,
            kwargs,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn template_format(&self) -> TemplateFormat {
        self.template_format
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Render the template. Every input variable must have a value.
    pub fn format(&self, values: &HashMap<&str, &str>) -> Result<String, FormatError> {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !values.contains_key(name.as_str()))
        {
            return Err(FormatError::MissingVariable(missing.clone()));
        }

        let env = environment();
        let template = env.template_from_str(&self.source)?;
        let context = match self.template_format {
            TemplateFormat::FString => MJValue::from_serialize(&HashMap::from([(FSTRING_SCOPE, values)])),
            TemplateFormat::Jinja2 => MJValue::from_serialize(values),
        };
        Ok(template.render(context)?)
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

fn compile_check(source: &str) -> Result<(), FormatError> {
    let env = environment();
    env.template_from_str(source)?;
    Ok(())
}

fn parse(template: &str) -> Result<Vec<Segment>, FormatError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) => name.push(ch),
                        None => return Err(FormatError::UnclosedBrace { position }),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(FormatError::EmptyPlaceholder { position });
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name.to_string()));
            }
            '}' => return Err(FormatError::UnmatchedClose { position }),
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Compile f-string segments to Jinja: literals become quoted string
/// expressions and variables become lookups in [`FSTRING_SCOPE`].
fn jinja_source(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Literal(text) => format!("{{{{ {} }}}}", quoted(text)),
            Segment::Variable(name) => format!("{{{{ {FSTRING_SCOPE}[{}] }}}}", quoted(name)),
        })
        .collect()
}

fn quoted(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn variables(segments: &[Segment]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for segment in segments {
        if let Segment::Variable(name) = segment {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

fn string_list(items: &[String]) -> LiveValue {
    LiveValue::Json(Value::Array(items.iter().cloned().map(Value::String).collect()))
}

impl Serializable for PromptTemplate {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "prompts", "prompt"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn lc_field(&self, field: &str) -> Option<LiveValue> {
        match field {
            "template" => Some(self.template.clone().into()),
            "inputVariables" => Some(string_list(&self.input_variables)),
            "templateFormat" => Some(self.template_format.as_str().into()),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for PromptTemplate {
    const ANCESTRY: &'static [TypeDecl] = &[TypeDecl::new("PromptTemplate"), BASE_PROMPT_TEMPLATE];

    fn build(mut kwargs: Kwargs) -> Result<Self, BuildError> {
        let stored = kwargs.clone();
        let invalid = |field: &str, e: FormatError| BuildError::InvalidField {
            field: field.into(),
            reason: e.to_string(),
        };

        let template_format = match kwargs.take_as::<String>("templateFormat")? {
            Some(raw) => TemplateFormat::parse(&raw).map_err(|e| invalid("templateFormat", e))?,
            None => TemplateFormat::FString,
        };
        let template: String = kwargs.require("template")?;
        let declared = kwargs.take_as::<Vec<String>>("inputVariables")?;

        let (input_variables, source) = match template_format {
            TemplateFormat::FString => {
                let segments = parse(&template).map_err(|e| invalid("template", e))?;
                let found = variables(&segments);
                let input_variables = match declared {
                    Some(declared) => {
                        if let Some(missing) = found.iter().find(|name| !declared.contains(name)) {
                            return Err(BuildError::InvalidField {
                                field: "inputVariables".into(),
                                reason: format!("template uses undeclared variable `{missing}`"),
                            });
                        }
                        declared
                    }
                    None => found,
                };
                (input_variables, jinja_source(&segments))
            }
            TemplateFormat::Jinja2 => {
                compile_check(&template).map_err(|e| invalid("template", e))?;
                (declared.unwrap_or_default(), template.clone())
            }
        };

        Ok(Self {
            template,
            template_format,
            input_variables,
            source,
            kwargs: stored,
        })
    }
}
