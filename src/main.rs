use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

use ridergo::api::{HttpApi, VehicleType};
use ridergo::auth::{SessionStore, Stage, WorkflowController, WorkflowDeps};
use ridergo::config::ClientConfig;
use ridergo::dashboard::{
    ClientDashboard, ClientServices, Navigator, RiderDashboard, RiderServices, Route,
};
use ridergo::error::Result;

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let register = match std::env::args().nth(1).as_deref() {
        None | Some("login") => false,
        Some("register") => true,
        Some(other) => bail!("unknown command {other:?}; expected `login` or `register`"),
    };

    let (config, api) = connect().context("starting client")?;

    eprintln!("🛵 RiderGo v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: {}", config.api_url);
    eprintln!("   Type 'back' at the code prompt to edit your details, /quit to exit.\n");

    let sessions = SessionStore::new();
    let (route_tx, route_rx) = watch::channel(None);
    let navigator: Arc<dyn Navigator> = Arc::new(route_tx);

    let deps = WorkflowDeps {
        identity: api.clone(),
        sessions: sessions.clone(),
        navigator: navigator.clone(),
    };
    let controller = if register {
        WorkflowController::sign_up(deps, &config)
    } else {
        WorkflowController::sign_in(deps, &config)
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    if !run_verification(&controller, &mut input, register).await? {
        controller.teardown();
        return Ok(());
    }

    let route = (*route_rx.borrow()).unwrap_or(Route::Login);
    match route {
        Route::RiderDashboard => show_rider_dashboard(api, sessions, navigator).await?,
        Route::ClientDashboard => show_client_dashboard(api, sessions, navigator).await?,
        other => eprintln!("Nothing to show for {other}"),
    }

    Ok(())
}

fn connect() -> Result<(ClientConfig, Arc<HttpApi>)> {
    let config = ClientConfig::from_env()?;
    let api = Arc::new(HttpApi::new(&config)?);
    Ok((config, api))
}

async fn show_rider_dashboard(
    api: Arc<HttpApi>,
    sessions: SessionStore,
    navigator: Arc<dyn Navigator>,
) -> Result<()> {
    let services = RiderServices {
        rider: api.clone(),
        wallet: api.clone(),
        payments: api,
    };
    let dashboard = RiderDashboard::new(services, sessions, navigator);
    let summary = dashboard.load().await;
    dashboard.teardown();
    let summary = summary?;

    println!("\nRider dashboard");
    println!("  Name:            {}", summary.name.as_deref().unwrap_or("-"));
    println!("  Wallet:          KES {}", summary.balance);
    println!("  Available trips: {}", summary.available_trips);
    println!("  Active trips:    {}", summary.active_trips);
    println!("  Completed:       {}", summary.completed_trips);
    println!(
        "  Subscription:    {}",
        if summary.subscription_active { "Active" } else { "Inactive" }
    );
    Ok(())
}

async fn show_client_dashboard(
    api: Arc<HttpApi>,
    sessions: SessionStore,
    navigator: Arc<dyn Navigator>,
) -> Result<()> {
    let services = ClientServices {
        client: api.clone(),
        wallet: api.clone(),
        payments: api,
    };
    let dashboard = ClientDashboard::new(services, sessions, navigator);
    let summary = dashboard.load().await;
    dashboard.teardown();
    let summary = summary?;

    println!("\nClient dashboard");
    println!("  Name:      {}", summary.name.as_deref().unwrap_or("-"));
    println!("  Wallet:    KES {}", summary.balance);
    println!("  Trips:     {}", summary.total_trips);
    println!("  Pending:   {}", summary.pending_trips);
    println!("  Active:    {}", summary.active_trips);
    println!("  Completed: {}", summary.completed_trips);
    Ok(())
}

/// Walk the user through the verification forms. Returns false if they quit.
async fn run_verification(
    controller: &WorkflowController,
    input: &mut Input,
    register: bool,
) -> anyhow::Result<bool> {
    loop {
        match controller.stage().await {
            Stage::CollectingIdentity => {
                let Some(phone) = prompt(input, "Phone number (e.g. 0712345678)").await? else {
                    return Ok(false);
                };
                controller.set_phone(phone).await;

                if register {
                    let Some(name) = prompt(input, "Full name").await? else {
                        return Ok(false);
                    };
                    controller.set_name(name).await;
                    let choices: Vec<&str> = VehicleType::ALL.iter().map(|v| v.as_str()).collect();
                    let label = format!("Vehicle type ({})", choices.join(", "));
                    let Some(vehicle) = prompt(input, &label).await? else {
                        return Ok(false);
                    };
                    if !controller.set_vehicle_type(&vehicle).await {
                        eprintln!("Unknown vehicle type {vehicle:?}.");
                    }
                    let Some(plate) = prompt(input, "Number plate (e.g. KCB 123A)").await? else {
                        return Ok(false);
                    };
                    controller.set_number_plate(plate).await;
                }

                if !controller.can_request_code().await {
                    eprintln!("Please fill in every field with a valid phone number.");
                    continue;
                }
                eprintln!("Sending...");
                if controller.request_code().await.is_err() {
                    report_error(controller).await;
                } else {
                    let phone = controller.snapshot().await.subject_phone;
                    eprintln!("We've sent a 6-digit code to {phone}");
                }
            }
            Stage::AwaitingCode => {
                let Some(raw) = prompt(input, "Verification code").await? else {
                    return Ok(false);
                };
                if raw.eq_ignore_ascii_case("back") {
                    controller.go_back().await?;
                    continue;
                }
                controller.set_code(&raw).await;
                if !controller.can_submit_code().await {
                    eprintln!("The code has 6 digits.");
                    continue;
                }
                eprintln!("{}", if register { "Creating..." } else { "Verifying..." });
                if controller.submit_code().await.is_err() {
                    report_error(controller).await;
                }
            }
            Stage::Verifying => tokio::task::yield_now().await,
            Stage::Authenticated => return Ok(true),
        }
    }
}

async fn report_error(controller: &WorkflowController) {
    if let Some(message) = controller.snapshot().await.last_error {
        eprintln!("❌ {message}");
    }
}

/// Read one trimmed line. `None` on EOF or `/quit`.
async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    eprint!("{label}: ");
    match input.next_line().await? {
        Some(line) if line.trim() == "/quit" => Ok(None),
        Some(line) => Ok(Some(line.trim().to_string())),
        None => Ok(None),
    }
}
