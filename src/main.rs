use anyhow::Context;
use remoteconf::config::{OperationKind, SettingsRepository};
use remoteconf::init_app;
use remoteconf::rc::RcloneApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remoteconf=info,warn".into()),
        )
        .init();

    let state = init_app().context("failed to initialize remoteconf")?;

    let types = state.schemas.remote_types().await;
    println!("{} backend types available", types.len());
    for backend in &types {
        println!("  {:<16} {}", backend.name, backend.description);
    }

    let remotes = state
        .api
        .list_remotes()
        .await
        .context("could not list remotes from the rclone daemon")?;
    for remote in remotes {
        let Some(settings) = state.repository.load(&remote).await? else {
            println!("{}: no saved profiles", remote);
            continue;
        };
        let summary: Vec<String> = OperationKind::ALL
            .iter()
            .filter_map(|kind| {
                settings
                    .section(*kind)
                    .map(|section| format!("{} {}", section.len(), kind))
            })
            .collect();
        println!("{}: {}", remote, summary.join(", "));
    }

    Ok(())
}
