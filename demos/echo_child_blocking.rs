// ABOUTME: Example application demonstrating the blocking child engine with a trivial echo handler
// ABOUTME: Connects to an inherited-socket stand-in (a TCP loopback port) and serves one client

use argh::FromArgs;
use forkrpc::child::ChildEngineBlocking;
use forkrpc::child::blocking::ExitOutcome;
use forkrpc::emitter::BlockingEmitter;
use forkrpc::handler::BlockingHandlerRegistry;
use forkrpc::serializer::LengthPrefixedStringsSerializer;
use forkrpc::value::Value;
use std::net::TcpStream;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Serve one blocking-mode echo session over a TCP loopback connection
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the hostname or IP address to connect to (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to connect to (default: 9000)
    #[argh(option, short = 'p')]
    port: Option<u32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::TRACE } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_string());
    let port = cli_args.port.unwrap_or(9000);

    let stream = TcpStream::connect((host.as_str(), port as u16))?;

    let mut handlers = BlockingHandlerRegistry::new();
    handlers.register(
        "echo",
        Box::new(|emitter: &mut BlockingEmitter, args: &[Value]| {
            let _ = emitter.emit(&[Value::Str("echo received".into())]);
            args.to_vec()
        }),
    );

    let serializer = Arc::new(LengthPrefixedStringsSerializer);
    let outcome = ChildEngineBlocking::run(stream, &handlers, serializer, forkrpc::frame::DEFAULT_MAX_PAYLOAD_LEN);

    match outcome {
        ExitOutcome::Clean => {
            tracing::info!("parent disconnected, exiting cleanly");
            Ok(())
        }
        ExitOutcome::Fatal(err) => {
            tracing::error!(error = %err, "child engine terminated with a fatal error");
            std::process::exit(1);
        }
    }
}
