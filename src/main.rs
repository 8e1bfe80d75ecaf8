use rocket::{Build, Rocket};
use session_gate::{Config, build_rocket};

#[rocket::launch]
fn rocket() -> Rocket<Build> {
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    build_rocket(config)
}
