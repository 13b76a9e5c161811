use rpcmirror::{
    arg, fail, generate, params, ClassDef, Discovery, Exposer, Forwarder, FunctionDef,
    HandlerResult, HttpServer, HttpTransport, MethodDescriptor, Object, PropertyDescriptor,
    RustTemplate, Value,
};
use tokio::task;

fn exposer() -> Exposer {
    let mut exposer = Exposer::new();
    exposer.expose_class(
        ClassDef::new("Calculator")
            .property(PropertyDescriptor::new("memory").typed("i64").default_value(0i64))
            .method(
                MethodDescriptor::new("add", params![a: "i64", b: "i64" = 1i64]).returns("i64"),
                |this: Option<Value>, args: Vec<Value>| -> HandlerResult {
                    let Some(Value::Object(_)) = this else {
                        return fail!("add is an instance method");
                    };
                    Ok(Value::Int(arg::<i64>(&args, 0)? + arg::<i64>(&args, 1)?))
                },
            ),
    );
    exposer.expose_function(FunctionDef::new("double", params![x: "i64"], |args| {
        Ok(Value::Int(arg::<i64>(&args, 0)? * 2))
    }));
    exposer
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let server = HttpServer::bind("127.0.0.1:8888").await?;
    let url = server.url()?;
    task::spawn(server.serve(exposer()));

    let mut discovery = Discovery::new();
    discovery.discover(&HttpTransport, &url).await?;
    println!("{}", generate::render(&discovery.into_catalog(), &RustTemplate::new())?);

    let mut mirror = Forwarder::new();
    mirror.set_server(url);
    let calc = Value::Object(Object::new("Calculator").with("memory", 0i64));
    let sum: i64 = mirror
        .call_as("Calculator::add", vec![2.into()], Some(calc))
        .await?;
    println!("2 + 1 = {sum}");
    let doubled: i64 = mirror.call_as("double", vec![21.into()], None).await?;
    println!("double(21) = {doubled}");
    Ok(())
}
