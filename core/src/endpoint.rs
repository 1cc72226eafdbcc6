//! Declared endpoints.
//!
//! # Design
//! An endpoint is declared once, through `EndpointBuilder`, and frozen into
//! a `MethodDescriptor`: verb, parsed template, declared parameters, body
//! encoding, leftover policy, response kind and extraction path. Nothing in
//! a descriptor is recomputed per call. The typed wrapper `Endpoint<R>`
//! ties the descriptor to its return type and is meant to live in a
//! `static LazyLock`, shared by every client and every call:
//!
//! ```ignore
//! static GET_USER: LazyLock<Endpoint<User>> = LazyLock::new(|| {
//!     Endpoint::get("get_user", "/users/{id}?active={active}")
//!         .param("id")
//!         .optional("active")
//!         .build()
//! });
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::args::{Arg, Args, REQUEST_HEADERS};
use crate::cast::{self, Extractable, ExtractPath, FromResponse, ResponseKind};
use crate::error::{CastError, ValidationError};
use crate::http::HttpMethod;
use crate::template::PathTemplate;

/// What to do with arguments bound to neither path, query nor body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum UnknownArgs {
    #[serde(rename = "not_allow", alias = "reject")]
    Reject,
    #[serde(rename = "query")]
    FoldIntoQuery,
    #[default]
    #[serde(rename = "body")]
    FoldIntoBody,
}

impl UnknownArgs {
    pub fn as_str(self) -> &'static str {
        match self {
            UnknownArgs::Reject => "not_allow",
            UnknownArgs::FoldIntoQuery => "query",
            UnknownArgs::FoldIntoBody => "body",
        }
    }
}

impl fmt::Display for UnknownArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnknownArgs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_allow" | "reject" => Ok(UnknownArgs::Reject),
            "query" => Ok(UnknownArgs::FoldIntoQuery),
            "body" => Ok(UnknownArgs::FoldIntoBody),
            other => Err(format!("unknown argument policy `{other}`")),
        }
    }
}

/// A declared parameter and its default, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    default: Option<Value>,
}

impl Param {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Immutable metadata of one declared endpoint.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    name: String,
    http_method: HttpMethod,
    template: PathTemplate,
    params: Vec<Param>,
    form_body: bool,
    unknown_args: UnknownArgs,
    response_kind: ResponseKind,
    extract: Option<ExtractPath>,
}

impl MethodDescriptor {
    /// Method name, also the mock-table key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn form_body(&self) -> bool {
        self.form_body
    }

    pub fn unknown_args(&self) -> UnknownArgs {
        self.unknown_args
    }

    pub fn response_kind(&self) -> ResponseKind {
        self.response_kind
    }

    pub fn extract_path(&self) -> Option<&ExtractPath> {
        self.extract.as_ref()
    }

    /// Bind call arguments against the declared parameters.
    ///
    /// Output follows declaration order, defaults filled in;
    /// `request_headers` is accepted on every endpoint and appended last.
    pub fn bind(&self, args: Args) -> Result<Vec<(String, Arg)>, ValidationError> {
        let mut supplied = args.into_entries();
        if let Some((name, _)) = supplied
            .iter()
            .find(|(name, _)| name != REQUEST_HEADERS && !self.params.iter().any(|p| &p.name == name))
        {
            return Err(ValidationError::UnexpectedArgument { name: name.clone() });
        }

        let mut bound = Vec::with_capacity(supplied.len().max(self.params.len()));
        for param in &self.params {
            match supplied.iter().position(|(name, _)| name == &param.name) {
                Some(i) => bound.push(supplied.swap_remove(i)),
                None => match &param.default {
                    Some(default) => bound.push((param.name.clone(), Arg::Value(default.clone()))),
                    None => {
                        return Err(ValidationError::MissingArgument {
                            name: param.name.clone(),
                        })
                    }
                },
            }
        }
        bound.extend(supplied);
        Ok(bound)
    }
}

/// A declared endpoint returning `R`.
pub struct Endpoint<R> {
    descriptor: MethodDescriptor,
    _response: PhantomData<fn() -> R>,
}

impl<R> fmt::Debug for Endpoint<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl<R: FromResponse> Endpoint<R> {
    pub fn get(name: &str, template: &str) -> EndpointBuilder<R> {
        EndpointBuilder::new(name, HttpMethod::Get, template)
    }

    pub fn post(name: &str, template: &str) -> EndpointBuilder<R> {
        EndpointBuilder::new(name, HttpMethod::Post, template)
    }

    pub fn put(name: &str, template: &str) -> EndpointBuilder<R> {
        EndpointBuilder::new(name, HttpMethod::Put, template)
    }

    pub fn patch(name: &str, template: &str) -> EndpointBuilder<R> {
        EndpointBuilder::new(name, HttpMethod::Patch, template)
    }

    pub fn delete(name: &str, template: &str) -> EndpointBuilder<R> {
        EndpointBuilder::new(name, HttpMethod::Delete, template)
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Cast a response body with this endpoint's rules.
    pub fn cast(&self, raw: &Bytes, status: u16) -> Result<R, CastError> {
        cast::cast(
            raw,
            status,
            self.descriptor.response_kind,
            self.descriptor.extract.as_ref(),
        )
    }
}

/// Registration-time builder for an `Endpoint`.
#[derive(Debug)]
pub struct EndpointBuilder<R> {
    name: String,
    http_method: HttpMethod,
    template: String,
    params: Vec<Param>,
    form_body: bool,
    unknown_args: UnknownArgs,
    extract: Option<String>,
    _response: PhantomData<fn() -> R>,
}

impl<R: FromResponse> EndpointBuilder<R> {
    pub fn new(name: &str, http_method: HttpMethod, template: &str) -> Self {
        Self {
            name: name.to_string(),
            http_method,
            template: template.to_string(),
            params: Vec::new(),
            form_body: false,
            unknown_args: UnknownArgs::default(),
            extract: None,
            _response: PhantomData,
        }
    }

    /// Declare a required parameter.
    pub fn param(self, name: &str) -> Self {
        self.push_param(name, None)
    }

    /// Declare a parameter that defaults to null.
    pub fn optional(self, name: &str) -> Self {
        self.push_param(name, Some(Value::Null))
    }

    pub fn param_default(self, name: &str, default: impl Into<Value>) -> Self {
        self.push_param(name, Some(default.into()))
    }

    /// Send the body form-encoded instead of as JSON.
    pub fn form_body(mut self) -> Self {
        self.form_body = true;
        self
    }

    pub fn unknown_args(mut self, policy: UnknownArgs) -> Self {
        self.unknown_args = policy;
        self
    }

    pub fn build(self) -> Endpoint<R> {
        let template = PathTemplate::parse(&self.template);

        let missing: Vec<&str> = template
            .placeholders()
            .iter()
            .map(String::as_str)
            .filter(|name| !self.params.iter().any(|p| p.name == *name))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                endpoint = %self.name,
                template = %self.template,
                ?missing,
                "path template has missing parameters in the declared signature"
            );
        }

        let form_body = if self.form_body && !self.http_method.allows_body() {
            tracing::warn!(
                endpoint = %self.name,
                method = %self.http_method,
                "form_body ignored: method cannot carry a body"
            );
            false
        } else {
            self.form_body
        };

        Endpoint {
            descriptor: MethodDescriptor {
                name: self.name,
                http_method: self.http_method,
                template,
                params: self.params,
                form_body,
                unknown_args: self.unknown_args,
                response_kind: R::kind(),
                extract: self.extract.as_deref().map(ExtractPath::parse),
            },
            _response: PhantomData,
        }
    }

    fn push_param(mut self, name: &str, default: Option<Value>) -> Self {
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.default = default,
            None => self.params.push(Param {
                name: name.to_string(),
                default,
            }),
        }
        self
    }
}

impl<R: Extractable> EndpointBuilder<R> {
    /// Narrow the decoded JSON to a nested value before casting.
    pub fn extract(mut self, path: &str) -> Self {
        self.extract = Some(path.to_string());
        self
    }
}

/// Endpoints sharing a URL prefix.
#[derive(Debug, Clone)]
pub struct Group {
    prefix: String,
}

impl Group {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get<R: FromResponse>(&self, name: &str, path: &str) -> EndpointBuilder<R> {
        self.endpoint(name, HttpMethod::Get, path)
    }

    pub fn post<R: FromResponse>(&self, name: &str, path: &str) -> EndpointBuilder<R> {
        self.endpoint(name, HttpMethod::Post, path)
    }

    pub fn put<R: FromResponse>(&self, name: &str, path: &str) -> EndpointBuilder<R> {
        self.endpoint(name, HttpMethod::Put, path)
    }

    pub fn patch<R: FromResponse>(&self, name: &str, path: &str) -> EndpointBuilder<R> {
        self.endpoint(name, HttpMethod::Patch, path)
    }

    pub fn delete<R: FromResponse>(&self, name: &str, path: &str) -> EndpointBuilder<R> {
        self.endpoint(name, HttpMethod::Delete, path)
    }

    fn endpoint<R: FromResponse>(&self, name: &str, method: HttpMethod, path: &str) -> EndpointBuilder<R> {
        EndpointBuilder::new(name, method, &format!("{}{path}", self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Debug, Serialize, serde::Deserialize)]
    struct User {
        id: String,
    }

    crate::model!(User);

    #[test]
    fn descriptor_captures_declaration() {
        let endpoint: Endpoint<Option<Vec<User>>> = Endpoint::post("create", "/users?v=2")
            .param("user")
            .form_body()
            .unknown_args(UnknownArgs::Reject)
            .extract("$.data")
            .build();
        let d = endpoint.descriptor();
        assert_eq!(d.name(), "create");
        assert_eq!(d.http_method(), HttpMethod::Post);
        assert_eq!(d.template().path(), "/users");
        assert!(d.form_body());
        assert_eq!(d.unknown_args(), UnknownArgs::Reject);
        assert!(matches!(d.response_kind(), ResponseKind::ListOfModel { .. }));
        assert_eq!(d.extract_path().map(ExtractPath::as_str), Some("$.data"));
    }

    #[test]
    fn form_body_is_dropped_on_get() {
        let endpoint: Endpoint<Value> = Endpoint::get("list", "/users").form_body().build();
        assert!(!endpoint.descriptor().form_body());
    }

    #[test]
    fn missing_placeholder_param_still_registers() {
        let endpoint: Endpoint<Value> = Endpoint::get("get", "/users/{user_id}").build();
        assert_eq!(endpoint.descriptor().template().placeholders(), ["user_id"]);
    }

    #[test]
    fn bind_applies_defaults_in_declaration_order() {
        let endpoint: Endpoint<Value> = Endpoint::get("search", "/search/{kw}")
            .param("kw")
            .param_default("page", 1)
            .optional("sort")
            .build();
        let bound = endpoint.descriptor().bind(Args::new().arg("kw", "x")).unwrap();
        assert_eq!(
            bound,
            vec![
                ("kw".to_string(), Arg::Value(json!("x"))),
                ("page".to_string(), Arg::Value(json!(1))),
                ("sort".to_string(), Arg::Value(Value::Null)),
            ]
        );
    }

    #[test]
    fn bind_rejects_undeclared_and_missing() {
        let endpoint: Endpoint<Value> = Endpoint::get("get", "/users/{id}").param("id").build();
        let err = endpoint
            .descriptor()
            .bind(Args::new().arg("id", 1).arg("other", 2))
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnexpectedArgument { name } if name == "other"));

        let err = endpoint.descriptor().bind(Args::new()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingArgument { name } if name == "id"));
    }

    #[test]
    fn bind_always_accepts_request_headers() {
        let endpoint: Endpoint<Value> = Endpoint::get("list", "/users").build();
        let bound = endpoint
            .descriptor()
            .bind(Args::new().headers([("x-trace", "1")]))
            .unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].0, REQUEST_HEADERS);
    }

    #[test]
    fn group_prefixes_templates() {
        let group = Group::new("/book/");
        let endpoint: Endpoint<Value> = group.get("get_book", "/{book_id}").param("book_id").build();
        assert_eq!(endpoint.descriptor().template().raw(), "/book/{book_id}");
        assert_eq!(endpoint.descriptor().http_method(), HttpMethod::Get);
    }

    #[test]
    fn unknown_args_parses_policy_names() {
        assert_eq!("not_allow".parse::<UnknownArgs>(), Ok(UnknownArgs::Reject));
        assert_eq!("query".parse::<UnknownArgs>(), Ok(UnknownArgs::FoldIntoQuery));
        assert_eq!("body".parse::<UnknownArgs>(), Ok(UnknownArgs::FoldIntoBody));
        assert!("sometimes".parse::<UnknownArgs>().is_err());
        let parsed: UnknownArgs = serde_json::from_value(json!("not_allow")).unwrap();
        assert_eq!(parsed, UnknownArgs::Reject);
    }
}
