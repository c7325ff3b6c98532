use clap::Parser;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;
use switchbot_exporter::output::prometheus::PrometheusFormatter;
use switchbot_exporter::router::{Options, RealScanner, run_with_io};
use switchbot_exporter::server;
use switchbot_exporter::store::ReadingStore;
use tokio::net::TcpListener;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();

    // The store outlives the scan session: once the scan completes, the
    // endpoint keeps serving the last readings until the process exits.
    let store = ReadingStore::new();
    let formatter = Arc::new(PrometheusFormatter::new(options.metric_prefix.clone()));

    let listener = match TcpListener::bind(options.listen).await {
        Ok(listener) => listener,
        Err(why) => {
            eprintln!("error: failed to bind {}: {}", options.listen, why);
            std::process::exit(EXIT_ERROR);
        }
    };
    let endpoint = tokio::spawn(server::serve(listener, store.clone(), formatter));

    let scan_duration = options.scan_duration;
    if let Err(why) = run_with_io(
        options,
        &RealScanner,
        &store,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await
    {
        eprintln!("error: {}", why);
        std::process::exit(EXIT_ERROR);
    }

    if scan_duration.is_none() {
        // Indefinite scan ended only because the event channel closed.
        std::process::exit(EXIT_SUCCESS);
    }

    // Scan duration elapsed; keep answering scrapes with the final readings.
    match endpoint.await {
        Ok(Err(why)) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
        _ => std::process::exit(EXIT_SUCCESS),
    }
}
