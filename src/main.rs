use std::fmt::{Debug, Display};
use std::time::Instant;

use actix_starter_kit::configuration::get_configuration;
use actix_starter_kit::shutdown::{termination_signal, wait_for_termination};
use actix_starter_kit::startup::Application;
use actix_starter_kit::telemetry::init_for_environment;
use tokio::task::JoinError;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let start = Instant::now();

    let configuration = get_configuration().expect("Failed to read configuration.");
    init_for_environment(
        configuration.application.service_name.clone(),
        configuration.application.log_level.clone(),
        configuration.application.environment,
    );

    tracing::info!("starting server");
    let application = match start_application(configuration).await {
        Ok(application) => application,
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                duration = %format!("{}ms", start.elapsed().as_millis()),
                "Failed to start server"
            );
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Server ready on port {} ({} ms)",
        application.port(),
        start.elapsed().as_millis()
    );

    let shutdown = application.shutdown_handle();
    let application_task = tokio::spawn(application.run_until_stopped());

    let exit_code = tokio::select! {
        o = application_task => {
            report_exit("API", o);
            1
        }
        signal = wait_for_termination(termination_signal()) => {
            shutdown.run(signal).await
        }
    };

    std::process::exit(exit_code);
}

async fn start_application(
    configuration: actix_starter_kit::configuration::Settings,
) -> Result<Application, anyhow::Error> {
    let application = Application::build(configuration).await?;
    application.cache().connect().await?;
    Ok(application)
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error! {
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed", task_name
            }
        }
        Err(e) => {
            tracing::error! {
                error.cause_chain = ?e,
                error.message = %e,
                "{} task failed to complete", task_name
            }
        }
    }
}
