mod application;
mod handlers;
mod state;

#[cfg(test)]
mod tests;

use std::process::ExitCode;

#[actix_web::main]
async fn main() -> ExitCode {
    match application::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fleetd: {err}");
            ExitCode::FAILURE
        }
    }
}
