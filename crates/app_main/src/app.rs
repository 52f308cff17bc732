//! Command loop driving a culling session from stdin

use anyhow::{Context, Result};
use app_core::{
    AppConfig, BatchResult, CullSession, DbPersistence, ExportMode, FilterPredicate, HostRequest,
    KeyChord, KeyOutcome, Label, PendingBatch,
};
use app_db::SessionDb;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One parsed input line
#[derive(Debug, PartialEq)]
enum Command {
    Key(KeyChord),
    Open(PathBuf),
    Filter(FilterPredicate),
    Export { dest: PathBuf, mode: ExportMode },
    RejectAll,
    AdoptAll,
    Info,
    Stats,
    ClearDb,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "open" if !rest.is_empty() => Command::Open(PathBuf::from(rest)),
        "filter" => match rest {
            "all" => Command::Filter(FilterPredicate::All),
            "adopted" => Command::Filter(FilterPredicate::AdoptedOnly),
            "rejected" => Command::Filter(FilterPredicate::RejectedOnly),
            _ => return Err(format!("unknown filter '{}'", rest)),
        },
        "export" if !rest.is_empty() => {
            let (dest, mode) = match rest.strip_suffix(" move") {
                Some(dest) => (dest.trim(), ExportMode::Move),
                None => (rest, ExportMode::Copy),
            };
            Command::Export { dest: PathBuf::from(dest), mode }
        }
        "reject-all" => Command::RejectAll,
        "adopt-all" => Command::AdoptAll,
        "info" => Command::Info,
        "stats" => Command::Stats,
        "clear-db" => Command::ClearDb,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Key(line.parse().map_err(|_| format!("unknown command '{}'", line))?),
    };
    Ok(command)
}

pub async fn run(config: AppConfig, folder: Option<PathBuf>) -> Result<()> {
    let persistence = Arc::new(DbPersistence::from_config(&config).context("Failed to open session database")?);
    let mut session = CullSession::new(config, persistence.clone());

    if let Some(folder) = &folder {
        open(&mut session, folder).await;
    } else {
        println!("No folder given; use `open <path>`");
    }
    print_status(&session);

    // Label batches settle on their own tasks and report back here
    let (settled_tx, mut settled_rx) = mpsc::unbounded_channel::<BatchResult>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
            Some(result) = settled_rx.recv() => {
                session.batch_settled(&result);
                if !result.success {
                    print_batch(&result);
                    print_status(&session);
                }
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => print_help(),
            Command::Open(path) => open(&mut session, &path).await,
            Command::Filter(filter) => session.set_filter(filter),
            Command::Export { dest, mode } => export(&mut session, &dest, mode).await,
            Command::RejectAll => spawn_settle(session.begin_mark_all_rejected(), &settled_tx),
            Command::AdoptAll => spawn_settle(session.begin_remove_all_rejected(), &settled_tx),
            Command::Info => info(&session).await,
            Command::Stats => println!("{}", stats_line(persistence.db())),
            Command::ClearDb => println!("{}", clear_line(persistence.db())),
            Command::Key(chord) => match session.handle_key(chord.key, chord.modifiers) {
                KeyOutcome::Labeling(pending) => spawn_settle(pending, &settled_tx),
                KeyOutcome::Request(HostRequest::OpenFolder) => println!("use `open <path>`"),
                KeyOutcome::Request(HostRequest::Export) => println!("use `export <dest> [move]`"),
                KeyOutcome::Handled | KeyOutcome::Ignored => {}
            },
        }
        print_status(&session);
    }

    tracing::info!("Glimpse exiting");
    Ok(())
}

fn spawn_settle(pending: PendingBatch, settled: &mpsc::UnboundedSender<BatchResult>) {
    let settled = settled.clone();
    tokio::spawn(async move {
        // Receiver only goes away on exit
        let _ = settled.send(pending.settle().await);
    });
}

/// Store errors are reported, never propagated out of the command loop
fn stats_line(db: &SessionDb) -> String {
    let counts = db.session_count().and_then(|sessions| Ok((sessions, db.label_count()?)));
    match counts {
        Ok((sessions, labels)) => format!("sessions: {}, labels: {}", sessions, labels),
        Err(e) => format!("could not read the session store: {}", e),
    }
}

fn clear_line(db: &SessionDb) -> String {
    let cleared = db.clear_all_labels().and_then(|labels| Ok((labels, db.clear_all_sessions()?)));
    match cleared {
        Ok((labels, sessions)) => format!("cleared {} labels, {} sessions", labels, sessions),
        Err(e) => format!("could not clear the session store: {}", e),
    }
}

async fn open(session: &mut CullSession, path: &Path) {
    if let Err(e) = session.open_folder(path).await {
        println!("{}", e.user_message());
    }
}

async fn export(session: &mut CullSession, dest: &Path, mode: ExportMode) {
    session.set_modal_active(true);
    match session.export(dest, mode).await {
        Ok(summary) => {
            println!(
                "exported {}/{} ({} rejected skipped)",
                summary.copied, summary.total, summary.skipped
            );
            for error in &summary.errors {
                println!("  {}", error);
            }
        }
        Err(e) => println!("{}", e.user_message()),
    }
    session.set_modal_active(false);
}

async fn info(session: &CullSession) {
    match session.primary_exif().await {
        Ok(Some(exif)) => {
            println!("camera: {}", exif.camera().unwrap_or_else(|| "-".to_string()));
            if let Some(lens) = &exif.lens_model {
                println!("lens: {}", lens);
            }
            println!("exposure: {}", exif.exposure_line());
            if let Some(taken) = &exif.date_taken {
                println!("taken: {}", taken);
            }
        }
        Ok(None) => println!("nothing selected"),
        Err(e) => println!("{}", e.user_message()),
    }
}

fn print_batch(result: &BatchResult) {
    if !result.success {
        println!(
            "{} label(s) could not be saved: {}",
            result.failed_count,
            result.failed_ids.join(", ")
        );
    }
}

fn print_status(session: &CullSession) {
    let counts = session.label_counts();
    let current = session
        .primary_item()
        .map(|item| {
            let mark = if item.label == Label::Rejected { "x" } else { " " };
            format!("[{}] {}", mark, item.id)
        })
        .unwrap_or_else(|| "-".to_string());
    let position = session
        .selection()
        .primary_index
        .map(|i| (i + 1).to_string())
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{:?} {:?} | {}/{} | {} | selected {} | adopted {} rejected {}",
        session.view_mode(),
        session.filter(),
        position,
        session.filtered_view().len(),
        current,
        session.selection().multi_select.len(),
        counts.adopted,
        counts.rejected,
    );
}

fn print_help() {
    println!("keys: Left Right Up Down Home End PageUp PageDown Enter Space Escape 1 2 c g (Shift+/Ctrl+ prefixes)");
    println!("commands: open <path> | filter all|adopted|rejected | export <dest> [move]");
    println!("          reject-all | adopt-all | info | stats | clear-db | quit");
}
