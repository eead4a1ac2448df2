//! `cafepos watch`: follow one table's status from a running gateway.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use cafepos_core::{Credential, LocalOpenItems};
use cafepos_scheduler::{InputEvent, RefreshConfig};
use cafepos_status::{HttpStatusSource, OpenOrderBook, TableStatusView, TableView};

pub struct WatchOptions {
    pub table_id: String,
    pub url: String,
    pub token: Option<String>,
    pub refresh: RefreshConfig,
}

fn render(view: &TableView) -> String {
    let total = view
        .server_total
        .map(|t| format!(" total={t:.2}"))
        .unwrap_or_default();
    let error = view
        .error
        .as_deref()
        .map(|e| format!(" ({e})"))
        .unwrap_or_default();
    format!(
        "[{}] table {}: {}{}{}",
        view.refreshed_at.format("%H:%M:%S"),
        view.table_id,
        view.status,
        total,
        error
    )
}

/// Whether a new view is worth printing over the previous one.
fn differs(previous: Option<&TableView>, next: &TableView) -> bool {
    match previous {
        None => true,
        Some(prev) => {
            prev.status != next.status || prev.server_total != next.server_total || prev.error != next.error
        }
    }
}

/// Report a key press to the activity listener. Returns false once the
/// listener is gone.
async fn forward_key_press(tx: &mpsc::Sender<InputEvent>) -> bool {
    if tx.is_closed() {
        return false;
    }
    if tx.send(InputEvent::KeyPress).await.is_err() {
        debug!("activity listener closed; key presses no longer tracked");
        return false;
    }
    true
}

pub async fn run_watch(options: WatchOptions) -> Result<()> {
    let credential = options.token.and_then(Credential::new);
    let source = Arc::new(HttpStatusSource::new(options.url.clone(), credential));
    let local: Arc<dyn LocalOpenItems> = Arc::new(OpenOrderBook::new());

    info!(table_id = %options.table_id, url = %options.url, "Watching table status");
    let mut view = TableStatusView::mount(options.table_id, source, local, options.refresh).await;

    let (input_tx, input_rx) = mpsc::channel(64);
    view.attach_input(input_rx);
    let refresher = view.refresher();
    let mut updates = view.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("Press Enter to mark activity, 'r' to refresh now, 'q' to quit.");
    let mut last: Option<TableView> = view.current();
    if let Some(current) = &last {
        println!("{}", render(current));
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = updates.borrow_and_update().clone();
                if let Some(next) = next {
                    if differs(last.as_ref(), &next) {
                        println!("{}", render(&next));
                    }
                    last = Some(next);
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                forward_key_press(&input_tx).await;
                match line.trim() {
                    "q" => break,
                    "r" => refresher.force_refresh().await,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    view.dispose();
    Ok(())
}
