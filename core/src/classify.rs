//! Argument classification.
//!
//! Given a descriptor and its bound arguments, decide where every argument
//! goes: path placeholder, query string, request body, or the
//! `request_headers` side channel. The order is fixed:
//!
//! 1. pull out `request_headers`;
//! 2. render the path, consuming its placeholders;
//! 3. emit the template's query pairs, consuming dynamic bindings
//!    (a parameter already used by the path or by an earlier binding is
//!    reused, not re-reported);
//! 4. accept at most one structured model as the body;
//! 5. dispose of leftovers under the endpoint's `UnknownArgs` policy.
//!
//! Everything here is synchronous and free of I/O; every failure is a
//! caller mistake caught before any transport is involved.

use serde_json::{Map, Value};

use crate::args::{Arg, REQUEST_HEADERS};
use crate::endpoint::{MethodDescriptor, UnknownArgs};
use crate::error::{Result, ValidationError};
use crate::http::HttpMethod;
use crate::template::{value_to_string, QueryPart};

/// Classified call, ready to be turned into an `HttpRequest`.
///
/// At most one of `json_body` / `form_body` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub method: HttpMethod,
    pub rendered_path: String,
    pub query_params: Vec<(String, Value)>,
    pub json_body: Option<Map<String, Value>>,
    pub form_body: Option<Map<String, Value>>,
    pub headers: Option<Vec<(String, String)>>,
    pub function_name: String,
}

pub fn classify(
    descriptor: &MethodDescriptor,
    bound: Vec<(String, Arg)>,
    method: HttpMethod,
) -> Result<RequestContext> {
    let mut pool = bound;

    let headers = match take(&mut pool, REQUEST_HEADERS) {
        Some(arg) => request_headers(arg)?,
        None => None,
    };

    let template = descriptor.template();
    let rendered_path = template.render(|name| lookup(&pool, name))?;
    let mut consumed: Vec<(String, Arg)> = template
        .placeholders()
        .iter()
        .filter_map(|name| take(&mut pool, name).map(|arg| (name.clone(), arg)))
        .collect();

    let mut query_params = Vec::new();
    for part in template.query_parts() {
        match part {
            QueryPart::Static { key, value } => {
                query_params.push((key.clone(), Value::String(value.clone())));
            }
            QueryPart::Dynamic { key, param } => {
                if let Some(arg) = take(&mut pool, param) {
                    consumed.push((param.clone(), arg));
                }
                let value = lookup(&consumed, param).cloned();
                if let Some(value) = value.filter(|v| !v.is_null()) {
                    query_params.push((key.clone(), value));
                }
            }
        }
    }

    let mut body: Option<(String, Map<String, Value>)> = None;
    let mut leftovers = Vec::new();
    for (name, arg) in pool {
        match arg {
            Arg::Model(Value::Object(fields)) => {
                if let Some((first, _)) = &body {
                    return Err(ValidationError::MultipleBodies {
                        first: first.clone(),
                        second: name,
                    }
                    .into());
                }
                body = Some((name, fields));
            }
            Arg::Model(_) => return Err(ValidationError::ModelNotObject { param: name }.into()),
            Arg::Value(value) => leftovers.push((name, value)),
            Arg::Headers(_) => return Err(ValidationError::InvalidHeaders.into()),
        }
    }
    if let Some((param, _)) = &body {
        if !method.allows_body() {
            return Err(ValidationError::BodyNotAllowed {
                method,
                param: param.clone(),
            }
            .into());
        }
    }

    let policy = descriptor.unknown_args();
    let (body_param, mut payload) = match body {
        Some((name, fields)) => (Some(name), Some(fields)),
        None => (None, None),
    };
    if !leftovers.is_empty() {
        match policy {
            UnknownArgs::Reject => {
                return Err(ValidationError::UnboundArguments {
                    names: leftovers.into_iter().map(|(name, _)| name).collect(),
                    policy,
                }
                .into());
            }
            UnknownArgs::FoldIntoBody if method.allows_body() => {
                if let Some(body) = body_param {
                    return Err(ValidationError::BodyConflict {
                        names: leftovers.into_iter().map(|(name, _)| name).collect(),
                        body,
                    }
                    .into());
                }
                payload = Some(leftovers.into_iter().collect());
            }
            // Body-less verbs have nowhere else to put leftovers.
            UnknownArgs::FoldIntoBody | UnknownArgs::FoldIntoQuery => {
                query_params.extend(leftovers.into_iter().filter(|(_, v)| !v.is_null()));
            }
        }
    }

    let (json_body, form_body) = match payload {
        Some(fields) if descriptor.form_body() => (None, Some(fields)),
        Some(fields) => (Some(fields), None),
        None => (None, None),
    };

    Ok(RequestContext {
        method,
        rendered_path,
        query_params,
        json_body,
        form_body,
        headers,
        function_name: descriptor.name().to_string(),
    })
}

fn take(pool: &mut Vec<(String, Arg)>, name: &str) -> Option<Arg> {
    let index = pool.iter().position(|(key, _)| key == name)?;
    Some(pool.remove(index).1)
}

fn lookup<'a>(pool: &'a [(String, Arg)], name: &str) -> Option<&'a Value> {
    pool.iter()
        .find(|(key, _)| key == name)
        .and_then(|(_, arg)| arg.as_value())
}

fn request_headers(arg: Arg) -> Result<Option<Vec<(String, String)>>, ValidationError> {
    match arg {
        Arg::Headers(headers) => Ok(Some(headers)),
        Arg::Value(Value::Null) => Ok(None),
        Arg::Value(Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::Null | Value::Array(_) | Value::Object(_) => Err(ValidationError::InvalidHeaders),
                other => Ok((key, value_to_string(&other))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        _ => Err(ValidationError::InvalidHeaders),
    }
}
