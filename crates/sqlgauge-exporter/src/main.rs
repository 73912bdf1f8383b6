//! sqlgauge - SQL to Prometheus gauge exporter.

use std::process::ExitCode;

use clap::Parser;

use sqlgauge_core::ExporterConfig;
use sqlgauge_exporter::{create_router, logging, serve, Args, Exporter, StartupError, Supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging settings live in the config file, so load it first and report
    // a load failure once the subscriber is up.
    let loaded = ExporterConfig::from_file(&args.config);
    let global = loaded
        .as_ref()
        .map(|config| config.global.clone())
        .unwrap_or_default();

    let _log_guards = match logging::init(&args.log_level(&global), global.log_path.as_deref()) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("sqlgauge: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let result = match loaded {
        Ok(config) => run(args, config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exporter failed");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args, mut config: ExporterConfig) -> Result<(), StartupError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "starting sqlgauge"
    );
    args.apply(&mut config);

    let exporter = Exporter::postgres(config)?;

    if args.check {
        let config = exporter.config();
        println!(
            "configuration ok: {} connection(s), {} quer(y/ies), {} gauge(s), {} metric(s)",
            config.connections.len(),
            config.queries.len(),
            config.gauge_count(),
            exporter.schemas().len()
        );
        for schema in exporter.schemas() {
            println!("  {} {{{}}}", schema.name, schema.label_keys.join(", "));
        }
        return Ok(());
    }

    let global = &exporter.config().global;
    let addr = format!("{}:{}", global.listen_address, global.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(%addr, "listening for scrapes");

    let mut supervisor = Supervisor::new();
    exporter.spawn(&mut supervisor);
    tracing::info!(tasks = supervisor.len(), "polling started");

    let router = create_router(exporter.app_state());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    let served = serve(listener, router, shutdown).await;
    supervisor.shutdown(args.shutdown_grace()).await;
    served
}
