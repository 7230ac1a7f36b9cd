use anyhow::{Context, Result};

use signage_sync::{ChunkStatus, SyncClient, SyncEvent};

use crate::config::Config;
use crate::state::{self, SessionState};
use crate::ws::WsChannel;

fn prepare(cfg: &Config) -> Result<SessionState> {
    let mut session = state::load_state()?;
    session.sync.set_branch_ids(cfg.schedule.branch_ids.clone());
    session.sync.set_chunk_size(cfg.schedule.chunk_size);
    if cfg.schedule.branch_ids.is_empty() {
        tracing::warn!("no branch_ids configured; the server will not know which branch this is");
    }
    Ok(session)
}

fn awaiting_ack(sync: &SyncClient) -> bool {
    sync.session()
        .is_some_and(|s| s.chunks.iter().any(|c| c.status == ChunkStatus::Sent))
}

/// Feed server frames into the session until `done` says so or the server goes quiet.
async fn drive(
    cfg: &Config,
    ws: &mut WsChannel,
    session: &mut SessionState,
    done: impl Fn(&SyncEvent, &SyncClient) -> bool,
) -> Result<()> {
    let wait = cfg.server.response_timeout();
    loop {
        let Some(frame) = ws.next_frame(wait).await? else {
            tracing::warn!(secs = wait.as_secs(), "no response from server");
            return Ok(());
        };
        match session.sync.handle_incoming(&frame, &mut session.store) {
            Ok(event) => {
                report(&event);
                if done(&event, &session.sync) {
                    return Ok(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "ignoring frame"),
        }
    }
}

fn report(event: &SyncEvent) {
    match event {
        SyncEvent::Acked {
            schedule_id,
            committed,
        } => println!(
            "Acknowledged: schedule {} ({committed} block(s) committed)",
            schedule_id.as_deref().unwrap_or("?")
        ),
        SyncEvent::Rejected { message, chunks } => {
            println!("Rejected chunk(s) {chunks:?}: {message}")
        }
        SyncEvent::Merged { report, skipped } => println!(
            "Merged: {} added, {} confirmed, {} already present, {skipped} unreadable",
            report.added, report.confirmed, report.skipped
        ),
        SyncEvent::PullFailed { message } => println!("Pull failed: {message}"),
        SyncEvent::Ignored { action } => tracing::debug!(%action, "unrelated frame"),
    }
}

pub async fn push(cfg: &Config) -> Result<()> {
    let mut session = prepare(cfg)?;
    let mut ws = WsChannel::connect(&cfg.server.url).await?;

    let sent = session
        .sync
        .push(&mut ws, &mut session.store, &session.zones);
    let outcome = match sent {
        Ok(n) => {
            println!("Sent {n} chunk(s)");
            drive(cfg, &mut ws, &mut session, |_, sync| !awaiting_ack(sync)).await
        }
        Err(e) => Err(e).context("push"),
    };

    state::save_state(&session)?;
    ws.close().await?;
    outcome?;
    print_status(&session);
    Ok(())
}

pub async fn retry(cfg: &Config) -> Result<()> {
    let mut session = prepare(cfg)?;
    let mut ws = WsChannel::connect(&cfg.server.url).await?;

    let outcome = match session.sync.retry_failed(&mut ws, &mut session.store) {
        Ok(0) => {
            println!("Nothing to retry");
            Ok(())
        }
        Ok(n) => {
            println!("Resent {n} chunk(s)");
            drive(cfg, &mut ws, &mut session, |_, sync| !awaiting_ack(sync)).await
        }
        Err(e) => Err(e).context("retry"),
    };

    state::save_state(&session)?;
    ws.close().await?;
    outcome?;
    print_status(&session);
    Ok(())
}

pub async fn pull(cfg: &Config) -> Result<()> {
    let mut session = prepare(cfg)?;
    let mut ws = WsChannel::connect(&cfg.server.url).await?;

    let outcome = match session.sync.pull(&mut ws) {
        Ok(true) => {
            drive(cfg, &mut ws, &mut session, |event, _| {
                matches!(event, SyncEvent::Merged { .. } | SyncEvent::PullFailed { .. })
            })
            .await
        }
        Ok(false) => Ok(()),
        Err(e) => Err(e).context("pull"),
    };

    state::save_state(&session)?;
    ws.close().await?;
    outcome?;
    print_status(&session);
    Ok(())
}

pub fn status() -> Result<()> {
    print_status(&state::load_state()?);
    Ok(())
}

fn print_status(session: &SessionState) {
    let counts = session.store.state_counts();
    println!(
        "Schedule: {}",
        session.sync.schedule_id().unwrap_or("(not created yet)")
    );
    println!(
        "Blocks: {} pending, {} in flight, {} committed, {} failed",
        counts.pending, counts.in_flight, counts.committed, counts.failed
    );
    if let Some(s) = session.sync.session() {
        let failed = s.failed_chunks();
        if !failed.is_empty() {
            println!("Failed chunks: {failed:?} (run: signage retry)");
        }
    }
    if let Some(err) = session.sync.last_error() {
        println!("Last error: {err}");
    }
}
