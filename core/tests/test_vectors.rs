//! Verify template rendering, classification and casting against JSON
//! test vectors stored in `test-vectors/`.
//!
//! Request bodies are compared as parsed JSON where the vector gives an
//! object, and byte for byte where it gives a string (form bodies).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use restbind_core::{
    cast, Args, CastError, Client, Endpoint, EndpointBuilder, Error, Exchange, ExtractPath,
    FromResponse, HttpMethod, PathTemplate, TemplateError, UnknownArgs, UreqTransport,
    ValidationError,
};

const BASE_URL: &str = "http://localhost:3000";

/// Arbitrary JSON object passed as a structured argument.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
struct Fields(Map<String, Value>);

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
}

restbind_core::model!(Fields, User);

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[test]
fn template_test_vectors() {
    let raw = include_str!("../../test-vectors/templates.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let template = PathTemplate::parse(case["template"].as_str().unwrap());
        let values = case["values"].as_object().unwrap();
        let result = template.render(|param| values.get(param));

        if let Some(expected_error) = case.get("expected_error") {
            let TemplateError::MissingPathParameter { name: missing, .. } = result.unwrap_err();
            assert_eq!(expected_error["kind"], "MissingPathParameter", "{name}: kind");
            assert_eq!(missing, expected_error["name"].as_str().unwrap(), "{name}: parameter");
            continue;
        }

        assert_eq!(result.unwrap(), case["expected_path"].as_str().unwrap(), "{name}: path");
        let placeholders: Vec<&str> = case["expected_placeholders"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.as_str().unwrap())
            .collect();
        assert_eq!(template.placeholders(), placeholders.as_slice(), "{name}: placeholders");

        let expected_query = case["expected_query"].as_array().unwrap();
        assert_eq!(template.query_parts().len(), expected_query.len(), "{name}: query length");
        let statics: Vec<(&str, &str)> = expected_query
            .iter()
            .filter_map(|q| Some((q["key"].as_str()?, q.get("static")?.as_str()?)))
            .collect();
        let dynamics: Vec<(&str, &str)> = expected_query
            .iter()
            .filter_map(|q| Some((q["key"].as_str()?, q.get("param")?.as_str()?)))
            .collect();
        assert_eq!(template.static_query_pairs().collect::<Vec<_>>(), statics, "{name}: static pairs");
        assert_eq!(template.dynamic_query_bindings().collect::<Vec<_>>(), dynamics, "{name}: bindings");
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn endpoint_from(name: &str, declared: &Value) -> Endpoint<Value> {
    let method = parse_method(declared["method"].as_str().unwrap());
    let mut builder: EndpointBuilder<Value> =
        EndpointBuilder::new(name, method, declared["template"].as_str().unwrap());
    for param in declared["params"].as_array().unwrap() {
        let param_name = param["name"].as_str().unwrap();
        builder = match param.get("default") {
            Some(default) => builder.param_default(param_name, default.clone()),
            None => builder.param(param_name),
        };
    }
    if declared["form_body"].as_bool().unwrap_or(false) {
        builder = builder.form_body();
    }
    if let Some(policy) = declared["unknown_args"].as_str() {
        builder = builder.unknown_args(policy.parse::<UnknownArgs>().unwrap());
    }
    builder.build()
}

fn args_from(case: &Value) -> Args {
    let mut args = Args::new();
    for (name, value) in case["args"].as_object().unwrap() {
        args = args.arg(name, value.clone());
    }
    if let Some(models) = case.get("models").and_then(Value::as_object) {
        for (name, fields) in models {
            let fields = Fields(fields.as_object().unwrap().clone());
            args = args.model(name, &fields).unwrap();
        }
    }
    if let Some(headers) = case.get("headers") {
        args = args.headers(pairs(headers));
    }
    args
}

fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::Template(TemplateError::MissingPathParameter { .. }) => "MissingPathParameter",
        Error::Validation(err) => match err {
            ValidationError::MultipleBodies { .. } => "MultipleBodies",
            ValidationError::BodyNotAllowed { .. } => "BodyNotAllowed",
            ValidationError::UnboundArguments { .. } => "UnboundArguments",
            ValidationError::BodyConflict { .. } => "BodyConflict",
            ValidationError::UnexpectedArgument { .. } => "UnexpectedArgument",
            ValidationError::MissingArgument { .. } => "MissingArgument",
            ValidationError::ModelNotObject { .. } => "ModelNotObject",
            ValidationError::ModelSerialize { .. } => "ModelSerialize",
            ValidationError::InvalidHeaders => "InvalidHeaders",
        },
        _ => "Other",
    }
}

#[test]
fn classification_test_vectors() {
    let raw = include_str!("../../test-vectors/classification.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let client = Client::blocking(BASE_URL, UreqTransport::new());
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let endpoint = endpoint_from(name, &case["endpoint"]);
        let result = client.build(&endpoint, args_from(case));

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            assert_eq!(error_kind(&err), expected_error.as_str().unwrap(), "{name}: {err}");
            continue;
        }

        let Exchange::Live(req) = result.unwrap() else {
            panic!("{name}: unexpected mock");
        };
        let expected_req = &case["expected_request"];
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{BASE_URL}{}", expected_req["url"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.headers, pairs(&expected_req["headers"]), "{name}: headers");

        match &expected_req["body"] {
            Value::Null => assert!(req.body.is_none(), "{name}: body should be None"),
            Value::String(form) => assert_eq!(req.body.unwrap(), form.as_str(), "{name}: form body"),
            json => {
                let body: Value = serde_json::from_slice(&req.body.unwrap()).unwrap();
                assert_eq!(&body, json, "{name}: body");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cast
// ---------------------------------------------------------------------------

fn cast_to_json<R: FromResponse + Serialize>(
    raw: &Bytes,
    status: u16,
    extract: Option<&ExtractPath>,
) -> Result<Value, CastError> {
    cast::cast::<R>(raw, status, R::kind(), extract).map(|out| serde_json::to_value(out).unwrap())
}

#[test]
fn cast_test_vectors() {
    let raw = include_str!("../../test-vectors/cast.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let status = case["status"].as_u64().unwrap() as u16;
        let body = Bytes::from(case["body"].as_str().unwrap().to_string());
        let extract = case["extract"].as_str().map(ExtractPath::parse);
        let extract = extract.as_ref();

        let result = match case["kind"].as_str().unwrap() {
            "bytes" => cast::cast::<Bytes>(&body, status, Bytes::kind(), extract)
                .map(|out| Value::String(String::from_utf8(out.to_vec()).unwrap())),
            "text" => cast_to_json::<String>(&body, status, extract),
            "any" => cast_to_json::<Value>(&body, status, extract),
            "user" => cast_to_json::<User>(&body, status, extract),
            "users" => cast_to_json::<Vec<User>>(&body, status, extract),
            "optional_users" => cast_to_json::<Option<Vec<User>>>(&body, status, extract),
            other => panic!("{name}: unknown kind {other}"),
        };

        if let Some(expected_error) = case.get("expected_error") {
            let kind = match result.unwrap_err() {
                CastError::Decode(_) => "Decode",
                CastError::Validation { .. } => "Validation",
                CastError::NestedElementType { .. } => "NestedElementType",
                CastError::Shape { .. } => "Shape",
            };
            assert_eq!(kind, expected_error.as_str().unwrap(), "{name}: error kind");
        } else {
            assert_eq!(result.unwrap(), case["expected"], "{name}: cast result");
        }
    }
}
