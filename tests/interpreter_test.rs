use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;

use opflow::host::memory::{
    MemoryClipboard, MemoryElement, MemoryElementTree, MemoryHandlers, MemoryNotifier, MemoryStore,
};
use opflow::{Context, EvalError, Host, Interpreter, Value};

#[ctor::ctor]
fn init_tests() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn var(interp: &Interpreter, name: &str) -> Value {
    interp
        .registries()
        .vars
        .get(name)
        .map(|v| v.clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_if_math_and_variable_store_end_to_end() {
    let interp = Interpreter::new(Host::in_memory());
    let op = json!({
        "_op": "if_",
        "condition": {
            "left": {"_op": "math", "fn": "sum", "args": [1, 2]},
            "operator": "==",
            "right": 3,
        },
        "then": {"_op": "setVar", "name": "r", "value": "yes"},
    });
    interp.execute(&op, &Context::new()).await.unwrap();

    let result = interp
        .execute(&json!({"_op": "getVar", "name": "r"}), &Context::new())
        .await
        .unwrap();
    assert_eq!(result, "yes".into());
}

#[tokio::test]
async fn test_batch_runs_in_order_and_aborts_on_fault() {
    let interp = Interpreter::new(Host::in_memory());
    let op = json!({"_ops": [
        {"_op": "setVar", "name": "a", "value": 1},
        {"_op": "math", "fn": "no_such_fn", "args": []},
        {"_op": "setVar", "name": "b", "value": 2},
    ]});
    let result = interp.execute(&op, &Context::new()).await;
    assert!(matches!(result, Err(EvalError::UnknownMathFunction(_))));
    assert_eq!(var(&interp, "a"), 1.0.into());
    assert_eq!(var(&interp, "b"), Value::Null);
}

#[tokio::test]
async fn test_unknown_op_and_non_record_input_are_soft() {
    let interp = Interpreter::new(Host::in_memory());
    let ctx = Context::new();
    assert_eq!(
        interp
            .execute(&json!({"_op": "teleport"}), &ctx)
            .await
            .unwrap(),
        Value::Null
    );
    assert_eq!(interp.execute(&json!(42), &ctx).await.unwrap(), Value::Null);
    assert_eq!(
        interp.execute(&json!({"data": 1}), &ctx).await.unwrap(),
        Value::Null
    );
}

#[tokio::test]
async fn test_handler_arguments_resolve_three_ways() {
    let handlers = Arc::new(MemoryHandlers::new());
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    handlers.register_fn("record", move |args| {
        sink.lock().unwrap().extend(args);
        Value::Null
    });
    let host = Host {
        handlers: handlers.clone(),
        ..Host::in_memory()
    };
    let interp = Interpreter::new(host);
    interp.registries().vars.insert("n".to_string(), 7.0.into());

    let ctx = Context::from_json(&json!({"name": "ada"}));
    let op = json!({
        "_handler": true,
        "fn": "record",
        "args": [
            {"_op": "getVar", "name": "n"},
            {"headers": {"x": "{{name}}", "nested": {"_op": "getVar", "name": "n"}}},
            "{{name}}",
            5,
        ],
    });
    interp.execute(&op, &ctx).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], 7.0.into());
    let walked = &seen[1];
    assert_eq!(
        walked.get("headers").and_then(|h| h.get("x")),
        Some(&"ada".into())
    );
    assert_eq!(
        walked.get("headers").and_then(|h| h.get("nested")),
        Some(&7.0.into())
    );
    assert_eq!(seen[2], "ada".into());
    assert_eq!(seen[3], 5.0.into());
}

#[tokio::test]
async fn test_missing_handler_is_soft() {
    let interp = Interpreter::new(Host::in_memory());
    let result = interp
        .execute(&json!({"_handler": true, "fn": "nope"}), &Context::new())
        .await
        .unwrap();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn test_logical_and_evaluates_every_operand() {
    let handlers = Arc::new(MemoryHandlers::new());
    let calls = Arc::new(Mutex::new(0usize));
    let (c1, c2) = (calls.clone(), calls.clone());
    handlers.register_fn("yieldFalse", move |_| {
        *c1.lock().unwrap() += 1;
        Value::Bool(false)
    });
    handlers.register_fn("yieldTrue", move |_| {
        *c2.lock().unwrap() += 1;
        Value::Bool(true)
    });
    let interp = Interpreter::new(Host {
        handlers,
        ..Host::in_memory()
    });

    // the false operand comes first: a short-circuiting evaluator would
    // never reach the second one
    let op = json!({
        "_op": "if_",
        "_complexCondition": true,
        "condition": {"operator": "&&", "conditions": [
            {"left": {"_handler": true, "fn": "yieldFalse"}, "operator": "==", "right": true},
            {"left": {"_handler": true, "fn": "yieldTrue"}, "operator": "==", "right": true},
        ]},
        "then": {"_op": "setVar", "name": "r", "value": "then"},
        "else": {"_op": "setVar", "name": "r", "value": "else"},
    });
    interp.execute(&op, &Context::new()).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), 2);
    assert_eq!(var(&interp, "r"), "else".into());
}

#[tokio::test]
async fn test_declared_functions_bind_params_and_intercept_return() {
    let interp = Interpreter::new(Host::in_memory());
    let declare = json!({
        "_op": "declareFunction",
        "name": "greet",
        "params": ["who"],
        "body": {"_ops": [
            {"_op": "return", "value": "hello {{who}}"},
            {"_op": "setVar", "name": "after", "value": "unreachable"},
        ]},
    });
    interp.execute(&declare, &Context::new()).await.unwrap();

    let result = interp
        .execute(
            &json!({"_handler": true, "fn": "greet", "args": ["ada"]}),
            &Context::new(),
        )
        .await
        .unwrap();
    assert_eq!(result, "hello ada".into());
    assert_eq!(var(&interp, "after"), Value::Null);
}

#[tokio::test]
async fn test_declared_function_from_textual_body() {
    let interp = Interpreter::new(Host::in_memory());
    let declare = json!({
        "_op": "declareFunction",
        "name": "stash",
        "params": ["v"],
        "body": r#"{"_op": "setVar", "name": "stashed", "value": "{{v}}"}"#,
    });
    interp.execute(&declare, &Context::new()).await.unwrap();
    interp
        .execute(
            &json!({"_handler": true, "fn": "stash", "args": [41]}),
            &Context::new(),
        )
        .await
        .unwrap();
    assert_eq!(var(&interp, "stashed"), "41".into());
}

#[tokio::test]
async fn test_declared_function_shadows_host_handler() {
    let handlers = Arc::new(MemoryHandlers::new());
    handlers.register_fn("who", |_| "host".into());
    let interp = Interpreter::new(Host {
        handlers,
        ..Host::in_memory()
    });

    let call = json!({"_handler": true, "fn": "who"});
    assert_eq!(
        interp.execute(&call, &Context::new()).await.unwrap(),
        "host".into()
    );

    let declare = json!({
        "_op": "declareFunction",
        "name": "who",
        "body": {"_op": "return", "value": "declared"},
    });
    interp.execute(&declare, &Context::new()).await.unwrap();
    assert_eq!(
        interp.execute(&call, &Context::new()).await.unwrap(),
        "declared".into()
    );
}

#[tokio::test]
async fn test_declare_function_input_errors_are_fatal() {
    let interp = Interpreter::new(Host::in_memory());
    let ctx = Context::new();
    let nameless = json!({"_op": "declareFunction", "body": {"_op": "return"}});
    assert!(matches!(
        interp.execute(&nameless, &ctx).await,
        Err(EvalError::MissingField { .. })
    ));
    let bad_body = json!({"_op": "declareFunction", "name": "f", "body": 42});
    assert!(matches!(
        interp.execute(&bad_body, &ctx).await,
        Err(EvalError::UnsupportedFunctionBody(_))
    ));
    let unparsable = json!({"_op": "declareFunction", "name": "f", "body": "not json"});
    assert!(matches!(
        interp.execute(&unparsable, &ctx).await,
        Err(EvalError::UnsupportedFunctionBody(_))
    ));
}

#[tokio::test]
async fn test_storage_ops_hit_independent_stores() {
    let durable = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    let interp = Interpreter::new(Host {
        durable: durable.clone(),
        session: session.clone(),
        ..Host::in_memory()
    });
    let ctx = Context::from_json(&json!({"user": "ada"}));

    interp
        .execute(
            &json!({"_op": "localSet", "key": "who", "value": "{{user}}"}),
            &ctx,
        )
        .await
        .unwrap();
    interp
        .execute(
            &json!({"_op": "sessionSet", "key": "who", "value": "temp"}),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(
        interp
            .execute(&json!({"_op": "localGet", "key": "who"}), &ctx)
            .await
            .unwrap(),
        "ada".into()
    );
    assert_eq!(
        interp
            .execute(&json!({"_op": "sessionGet", "key": "who"}), &ctx)
            .await
            .unwrap(),
        "temp".into()
    );

    interp
        .execute(&json!({"_op": "localRemove", "key": "who"}), &ctx)
        .await
        .unwrap();
    assert_eq!(
        interp
            .execute(&json!({"_op": "localGet", "key": "who"}), &ctx)
            .await
            .unwrap(),
        Value::Null
    );
    // the session store is untouched by the durable remove
    assert_eq!(
        interp
            .execute(&json!({"_op": "sessionGet", "key": "who"}), &ctx)
            .await
            .unwrap(),
        "temp".into()
    );
}

#[tokio::test]
async fn test_clipboard_round_trip() {
    let clipboard = Arc::new(MemoryClipboard::new());
    let interp = Interpreter::new(Host {
        clipboard: clipboard.clone(),
        ..Host::in_memory()
    });
    let ctx = Context::from_json(&json!({"name": "ada"}));

    interp
        .execute(&json!({"_op": "copyText", "text": "hi {{name}}"}), &ctx)
        .await
        .unwrap();
    assert_eq!(clipboard.contents(), "hi ada");

    assert_eq!(
        interp
            .execute(&json!({"_op": "readText"}), &ctx)
            .await
            .unwrap(),
        "hi ada".into()
    );
}

#[tokio::test]
async fn test_notifications_respect_permission() {
    let granted = Arc::new(MemoryNotifier::granted());
    let interp = Interpreter::new(Host {
        notifier: granted.clone(),
        ..Host::in_memory()
    });
    interp
        .execute(
            &json!({"_op": "notify", "title": "Hi", "body": "there"}),
            &Context::new(),
        )
        .await
        .unwrap();
    // absent title falls back to a default
    interp
        .execute(&json!({"_op": "notify"}), &Context::new())
        .await
        .unwrap();
    assert_eq!(
        granted.shown(),
        vec![
            ("Hi".to_string(), "there".to_string()),
            ("Notification".to_string(), String::new()),
        ]
    );

    let denied = Arc::new(MemoryNotifier::denied());
    let interp = Interpreter::new(Host {
        notifier: denied.clone(),
        ..Host::in_memory()
    });
    interp
        .execute(&json!({"_op": "notify", "title": "Hi"}), &Context::new())
        .await
        .unwrap();
    assert!(denied.shown().is_empty());
}

#[tokio::test]
async fn test_element_ops() {
    let tree = Arc::new(MemoryElementTree::new());
    let title = MemoryElement::new("title", &[]);
    let row1 = MemoryElement::new("r1", &[".row"]);
    let row2 = MemoryElement::new("r2", &[".row"]);
    tree.insert(title.clone());
    tree.insert(row1.clone());
    tree.insert(row2.clone());
    let interp = Interpreter::new(Host {
        elements: tree.clone(),
        ..Host::in_memory()
    });
    let ctx = Context::from_json(&json!({"who": "world", "sel": "#title"}));

    interp
        .execute(
            &json!({"_op": "setText", "selector": "{{sel}}", "value": "Hello {{who}}"}),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(title.current_text(), "Hello world");
    assert_eq!(
        interp
            .execute(&json!({"_op": "getText", "selector": "#title"}), &ctx)
            .await
            .unwrap(),
        "Hello world".into()
    );

    interp
        .execute(
            &json!({"_op": "setValue", "selector": ".row", "value": "v"}),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(row1.current_value(), "v");
    assert_eq!(row2.current_value(), "v");
    assert_eq!(
        interp
            .execute(&json!({"_op": "getValue", "selector": ".row"}), &ctx)
            .await
            .unwrap(),
        "v".into()
    );

    interp
        .execute(
            &json!({"_op": "addClass", "selector": ".row", "className": "active"}),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(row1.classes(), vec!["active"]);
    assert_eq!(row2.classes(), vec!["active"]);
    interp
        .execute(
            &json!({"_op": "removeClass", "selector": "#r1", "className": "active"}),
            &ctx,
        )
        .await
        .unwrap();
    assert!(row1.classes().is_empty());
    assert_eq!(row2.classes(), vec!["active"]);

    interp
        .execute(&json!({"_op": "hide", "selector": ".row"}), &ctx)
        .await
        .unwrap();
    assert!(!row1.is_visible());
    interp
        .execute(&json!({"_op": "show", "selector": "#r1"}), &ctx)
        .await
        .unwrap();
    assert!(row1.is_visible());
    assert!(!row2.is_visible());

    interp
        .execute(
            &json!({"_op": "setAttrs", "selector": "#title", "attrs": {
                "disabled": true,
                "data-who": "{{who}}",
                "hidden": false,
                "count": 5,
            }}),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(title.attr("disabled"), Some(String::new()));
    assert_eq!(title.attr("data-who"), Some("world".to_string()));
    assert_eq!(title.attr("hidden"), None);
    assert_eq!(title.attr("count"), Some("5".to_string()));

    // union of selector patterns
    interp
        .execute(
            &json!({"_op": "setText", "selector": [".row", "#title"], "value": "all"}),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(row1.current_text(), "all");
    assert_eq!(title.current_text(), "all");

    let found = interp
        .execute(&json!({"_op": "query", "selector": ".row"}), &ctx)
        .await
        .unwrap();
    assert!(matches!(found, Value::Element(_)));
    assert_eq!(
        interp
            .execute(&json!({"_op": "query", "selector": ".none"}), &ctx)
            .await
            .unwrap(),
        Value::Null
    );
    assert_eq!(
        interp
            .execute(&json!({"_op": "getValue", "selector": ".none"}), &ctx)
            .await
            .unwrap(),
        Value::Null
    );
}

#[tokio::test]
async fn test_custom_op_registration() {
    use async_trait::async_trait;
    use opflow::value::Map;
    use opflow::{EvalResult, OpHandler, Outcome};

    struct Shout;

    #[async_trait]
    impl OpHandler for Shout {
        async fn execute(
            &self,
            op: &Map,
            _interp: &Interpreter,
            _ctx: &Context,
        ) -> EvalResult<Outcome> {
            let text = op.get("text").map(|t| t.to_string()).unwrap_or_default();
            Ok(Value::String(text.to_uppercase()).into())
        }
    }

    let interp = Interpreter::new(Host::in_memory());
    interp.register_op("shout", Arc::new(Shout));
    assert_eq!(
        interp
            .execute(&json!({"_op": "shout", "text": "hey"}), &Context::new())
            .await
            .unwrap(),
        "HEY".into()
    );
}
