use rpcmirror::{
    arg, fail, generate, params, ClassDef, Discovery, Exposer, Forwarder, FunctionDef,
    HandlerResult, HttpServer, HttpTransport, MethodDescriptor, PropertyDescriptor, RustTemplate,
    Value,
};
use tokio::task;

// Rendered from the exposer below with `RustTemplate::new().in_module("remote")`.
include!("fixtures/calculator_proxy.rs");

const FIXTURE: &str = include_str!("fixtures/calculator_proxy.rs");

fn exposer() -> Exposer {
    let mut exposer = Exposer::new();
    exposer.expose_class(
        ClassDef::new("Calculator")
            .property(PropertyDescriptor::new("precision").typed("i64").default_value(2i64))
            .constructor(
                params![precision: "i64" = 2i64],
                |this: Option<Value>, args: Vec<Value>| -> HandlerResult {
                    let Some(Value::Object(mut this)) = this else {
                        return fail!("constructor needs an instance");
                    };
                    this.set("precision", arg::<i64>(&args, 0)?);
                    Ok(Value::Object(this))
                },
            )
            .method(
                MethodDescriptor::new("add", params![a: "i64", b: "i64"]).returns("i64"),
                |_: Option<Value>, args: Vec<Value>| -> HandlerResult {
                    Ok(Value::Int(arg::<i64>(&args, 0)? + arg::<i64>(&args, 1)?))
                },
            )
            .method(
                MethodDescriptor::new("scale", params![x: "i64"]).returns("i64"),
                |this: Option<Value>, args: Vec<Value>| -> HandlerResult {
                    let precision = this
                        .as_ref()
                        .and_then(Value::as_object)
                        .and_then(|o| o.get("precision"))
                        .cloned()
                        .unwrap_or(Value::Nil);
                    let precision = arg::<i64>(&[precision], 0)?;
                    Ok(Value::Int(arg::<i64>(&args, 0)? * precision))
                },
            )
            .method(
                MethodDescriptor::new("origin", params![]).modifiers(["public", "static"]),
                |this: Option<Value>, _: Vec<Value>| -> HandlerResult {
                    if this.is_some() {
                        return fail!("origin is static");
                    }
                    Ok(Value::Int(0))
                },
            ),
    );
    exposer.expose_function(FunctionDef::new("double", params![x: "i64"], |args| {
        Ok(Value::Int(arg::<i64>(&args, 0)? * 2))
    }));
    exposer
}

async fn spawn_server() -> String {
    let server = HttpServer::bind("127.0.0.1:0").await.unwrap();
    let url = server.url().unwrap();
    task::spawn(server.serve(exposer()));
    url
}

#[tokio::test]
async fn rendered_proxies_match_the_checked_in_copy() {
    let url = spawn_server().await;
    let mut discovery = Discovery::new();
    discovery.discover(&HttpTransport, &url).await.unwrap();

    let rendered = generate::render(
        &discovery.into_catalog(),
        &RustTemplate::new().in_module("remote"),
    )
    .unwrap();
    assert_eq!(rendered, FIXTURE);
}

#[tokio::test]
async fn generated_proxies_forward_to_the_exposer() {
    let url = spawn_server().await;
    let mut mirror = Forwarder::new();
    mirror.set_server(url);

    let calc = remote::Calculator::new(&mirror, Some(Value::Int(7)))
        .await
        .unwrap();
    assert_eq!(calc.precision, Value::Int(7));
    assert_eq!(calc.add(2.into(), 3.into()).await.unwrap(), Value::Int(5));
    // the receiver's state travels with the call
    assert_eq!(calc.scale(3.into()).await.unwrap(), Value::Int(21));
    assert_eq!(remote::Calculator::origin(&mirror).await.unwrap(), Value::Int(0));

    let defaulted = remote::Calculator::new(&mirror, None).await.unwrap();
    assert_eq!(defaulted.precision, Value::Int(2));

    assert_eq!(remote::double(&mirror, 21.into()).await.unwrap(), Value::Int(42));
}
