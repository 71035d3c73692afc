//! Shared test components for the load crate.

use serde_json::{Map, Value};
use std::any::Any;

use crate::error::BuildError;
use crate::serializable::{Buildable, Serializable, TypeDecl};
use crate::value::{Kwargs, LiveValue};

pub const BASE_ECHO: TypeDecl = TypeDecl::new("BaseEcho");

/// A component that keeps the kwargs it was built with.
///
/// `apiKey` is a declared secret; `headers.token` is a nested secret path.
#[derive(Debug, Clone, Default)]
pub struct Echo {
    pub kwargs: Kwargs,
    pub api_key: Option<String>,
    pub headers: Option<Value>,
    pub label: Option<String>,
}

impl Echo {
    pub const ANCESTRY_DECLS: &'static [TypeDecl] = &[
        TypeDecl::new("Echo")
            .with_aliases(&[("apiKey", "echo_api_key")])
            .with_secrets(&[("apiKey", "ECHO_API_KEY"), ("headers.token", "ECHO_TOKEN")]),
        BASE_ECHO,
    ];

    pub fn with_kwargs(kwargs: Kwargs) -> Self {
        let api_key = kwargs.get("apiKey").and_then(LiveValue::as_str).map(str::to_string);
        let headers = kwargs.get("headers").and_then(LiveValue::to_json);
        Self {
            kwargs,
            api_key,
            headers,
            label: None,
        }
    }
}

impl Serializable for Echo {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "tests", "echo"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn lc_field(&self, field: &str) -> Option<LiveValue> {
        match field {
            "apiKey" => self.api_key.clone().map(LiveValue::from),
            "headers" => self.headers.clone().map(LiveValue::Json),
            "label" => self.label.clone().map(LiveValue::from),
            _ => None,
        }
    }

    fn lc_attributes(&self, level: &TypeDecl) -> Option<Map<String, Value>> {
        if level.name == BASE_ECHO.name {
            let mut attrs = Map::new();
            attrs.insert("flavor".into(), Value::from("base"));
            return Some(attrs);
        }
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for Echo {
    const ANCESTRY: &'static [TypeDecl] = Self::ANCESTRY_DECLS;

    fn build(kwargs: Kwargs) -> Result<Self, BuildError> {
        Ok(Self::with_kwargs(kwargs))
    }
}

/// A type whose given name differs from the name it is addressed by.
#[derive(Debug, Clone, Default)]
pub struct Renamed {
    pub kwargs: Kwargs,
}

impl Serializable for Renamed {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "tests", "renamed"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        self.kwargs.clone().into()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for Renamed {
    const ANCESTRY: &'static [TypeDecl] =
        &[TypeDecl::new("Renamed_x9f").with_lc_name("RenamedComponent"), BASE_ECHO];

    fn build(kwargs: Kwargs) -> Result<Self, BuildError> {
        Ok(Self { kwargs })
    }
}

/// A component that opts out of snapshots.
#[derive(Debug, Default)]
pub struct Opaque;

impl Serializable for Opaque {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        const ANCESTRY: &[TypeDecl] = &[TypeDecl::new("Opaque")];
        ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "tests"]
    }

    fn lc_serializable(&self) -> bool {
        false
    }

    fn lc_kwargs(&self) -> LiveValue {
        LiveValue::Map(Default::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A component constructed from positional arguments.
#[derive(Debug, Default)]
pub struct Positional;

impl Serializable for Positional {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        const ANCESTRY: &[TypeDecl] = &[TypeDecl::new("Positional")];
        ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "tests"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        LiveValue::List(vec!["a".into(), "b".into()])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A builder that always rejects its kwargs.
#[derive(Debug, Default)]
pub struct Failing;

impl Serializable for Failing {
    fn lc_ancestry(&self) -> &'static [TypeDecl] {
        Self::ANCESTRY
    }

    fn lc_namespace(&self) -> &'static [&'static str] {
        &["langchain", "tests"]
    }

    fn lc_kwargs(&self) -> LiveValue {
        LiveValue::Map(Default::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Buildable for Failing {
    const ANCESTRY: &'static [TypeDecl] = &[TypeDecl::new("Failing")];

    fn build(_kwargs: Kwargs) -> Result<Self, BuildError> {
        Err(BuildError::Custom("always fails".into()))
    }
}
