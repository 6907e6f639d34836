//! Command runners. Each one wires a view model to a renderer that prints
//! every published state to `stdout`.

use std::process::ExitCode;
use std::sync::Arc;

use checkin_server_client::Client;
use reqwest::Url;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use types_rs::registration::PaymentId;

use crate::api::DynRegistrationApi;
use crate::attendance::AttendanceForm;
use crate::config::{Command, Config};
use crate::payment::{PaymentPoller, PaymentViewStatus, PollConfig};
use crate::render;

pub(crate) async fn run(config: Config) -> color_eyre::Result<ExitCode> {
    let api: DynRegistrationApi = Arc::new(Client::new(config.api_url.clone()));
    tracing::debug!("using registration backend at {}", config.api_url);

    match config.command {
        Command::Attend { ref number } => attend(api, number, &config.registration_url).await,
        Command::Kiosk => kiosk(api, &config.registration_url).await,
        Command::Payment { ref payment_id } => {
            follow_payment(api, payment_id, config.poll_config()).await
        }
    }
}

async fn attend(
    api: DynRegistrationApi,
    number: &str,
    registration_url: &Url,
) -> color_eyre::Result<ExitCode> {
    let mut form = AttendanceForm::new(api);
    let renderer = spawn_renderer(form.subscribe(), {
        let registration_url = registration_url.clone();
        move |state| render::attendance(state, &registration_url)
    });

    let state = form.submit(number).await;
    drop(form);
    renderer.await?;

    Ok(if state.marked().is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn kiosk(api: DynRegistrationApi, registration_url: &Url) -> color_eyre::Result<ExitCode> {
    let mut form = AttendanceForm::new(api);
    let renderer = spawn_renderer(form.subscribe(), {
        let registration_url = registration_url.clone();
        move |state| render::attendance(state, &registration_url)
    });

    println!("Enter your WhatsApp mobile number to mark your attendance.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }
        form.submit(&line).await;
    }

    drop(form);
    renderer.await?;
    Ok(ExitCode::SUCCESS)
}

async fn follow_payment(
    api: DynRegistrationApi,
    payment_id: &PaymentId,
    config: PollConfig,
) -> color_eyre::Result<ExitCode> {
    let mut poller = PaymentPoller::mount(api, payment_id.clone(), config);
    let renderer = spawn_renderer(poller.subscribe(), render::payment);

    let settled = tokio::select! {
        view = poller.settled() => Some(view),
        _ = tokio::signal::ctrl_c() => None,
    };
    poller.dispose().await;
    renderer.await?;

    Ok(match settled {
        Some(view) if view.status == PaymentViewStatus::Success => ExitCode::SUCCESS,
        Some(_) => ExitCode::FAILURE,
        None => {
            tracing::info!("interrupted while following payment {payment_id}");
            ExitCode::from(130)
        }
    })
}

/// Prints every state published on `changes` until its sender goes away.
/// States that render to nothing are skipped.
fn spawn_renderer<T, F>(mut changes: watch::Receiver<T>, render: F) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> String + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let frame = render(&*changes.borrow_and_update());
            if !frame.is_empty() {
                println!("{frame}\n");
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
}
