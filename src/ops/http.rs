use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::eval::interpreter::{Interpreter, Outcome};
use crate::eval::walker;
use crate::host::HttpResponse;
use crate::template;
use crate::value::{Map, Value};

use super::{run_continuation, OpHandler};

#[derive(Debug, Clone, Copy, Default, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
enum ResponseType {
    #[default]
    Text,
    Json,
    Binary,
}

fn extract(kind: ResponseType, response: HttpResponse) -> EvalResult<Value> {
    match kind {
        ResponseType::Text => Ok(Value::String(
            String::from_utf8_lossy(&response.body).into_owned(),
        )),
        ResponseType::Json => {
            let parsed: serde_json::Value = serde_json::from_slice(&response.body)
                .map_err(|e| EvalError::InvalidOperation(format!("response body is not JSON: {e}")))?;
            Ok(Value::from_json(&parsed))
        }
        ResponseType::Binary => Ok(Value::List(
            response.body.iter().map(|b| Value::Number(*b as f64)).collect(),
        )),
    }
}

/// `fetch`: every failure — transport, body extraction, even a fault in the
/// success continuation — is caught here and routed to `onError`. Nothing
/// propagates past this op.
pub(crate) struct Fetch;

impl Fetch {
    async fn route_error(
        interp: &Interpreter,
        ctx: &Context,
        op: &Map,
        error: EvalError,
    ) -> Outcome {
        debug!(%error, "fetch failed");
        match run_continuation(
            interp,
            ctx,
            op.get("onError"),
            "error",
            Value::String(error.to_string()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "fetch error continuation failed");
                Value::Null.into()
            }
        }
    }
}

#[async_trait]
impl OpHandler for Fetch {
    async fn execute(&self, op: &Map, interp: &Interpreter, ctx: &Context) -> EvalResult<Outcome> {
        let url = op
            .get("url")
            .map(|u| template::resolve(u, ctx).to_string())
            .unwrap_or_default();
        let response_type = op
            .get("responseType")
            .and_then(Value::as_str)
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();

        let attempt: EvalResult<Value> = async {
            let options = match op.get("options") {
                Some(options) => walker::resolve(options, interp, ctx).await?,
                None => Value::Map(Map::new()),
            };
            let response = interp.host().http.fetch(&url, &options).await?;
            extract(response_type, response)
        }
        .await;

        let outcome = match attempt {
            Ok(data) => match run_continuation(interp, ctx, op.get("onSuccess"), "data", data).await
            {
                Ok(outcome) => outcome,
                Err(error) => Self::route_error(interp, ctx, op, error).await,
            },
            Err(error) => Self::route_error(interp, ctx, op, error).await,
        };
        Ok(outcome)
    }
}
