use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tryon_session::{
    ControllerConfig, GenerationRequest, SessionController, StaticToken, TryOnApi, TryOnClient,
};

/// Usage: cargo run --example poll_tryon -- <base_url> <outfit_id> [token]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tryon_session=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let base_url = args.next().unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
    let outfit_id = args.next().ok_or("missing <outfit_id>")?;

    let mut client = TryOnClient::new(base_url);
    if let Some(token) = args.next() {
        client = client.with_token_provider(StaticToken(token));
    }

    let availability = client.check_service_availability().await?;
    if !availability.available {
        println!(
            "Try-on service unavailable: {}",
            availability.error.as_deref().unwrap_or("no reason given")
        );
        return Ok(());
    }
    if let Some(model) = &availability.model {
        println!("Using model {}", model);
    }

    let config = ControllerConfig::builder()
        .with_poll_interval(Duration::from_secs(2))
        .build();
    let controller = SessionController::with_config(client, config);
    controller
        .start_generation(GenerationRequest::new(outfit_id).occasion("casual"))
        .await;

    let mut updates = controller.subscribe();
    loop {
        let view = updates.borrow_and_update().clone();
        let eta = view
            .estimated_remaining(tokio::time::Instant::now())
            .map(|d| format!(", ~{}s left", d.as_secs()))
            .unwrap_or_default();
        println!("{:>3}%{}", view.progress_percent, eta);

        if view.is_settled() {
            break;
        }
        if updates.changed().await.is_err() {
            break;
        }
    }

    let view = controller.state();
    match (view.result_url(), view.error()) {
        (Some(url), _) => println!("Result: {}", url),
        (None, Some(error)) => println!("Failed: {}", error),
        (None, None) => println!("Stopped without a result"),
    }

    let history = controller.api().list_sessions(Some(5)).await?;
    println!("{} sessions on record", history.total);
    Ok(())
}
