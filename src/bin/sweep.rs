use session_gate::{Config, init_tracing, sweep_expired_sessions};

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} expired-sessions");
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let mut args = std::env::args();
    let bin_name = args.next().unwrap_or_else(|| "sweep".to_string());
    let command = args.next();

    if command.as_deref() != Some("expired-sessions") || args.next().is_some() {
        print_usage(&bin_name);
        std::process::exit(2);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level, config.logging.json_format);

    match sweep_expired_sessions(&config).await {
        Ok(result) => {
            println!("Expired session sweep completed: sessions_removed={}", result.sessions_removed);
        }
        Err(err) => {
            eprintln!("Sweep failed: {err}");
            std::process::exit(1);
        }
    }
}
