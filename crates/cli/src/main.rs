use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use timing::{
    Document, Item, ItemId, KeyframeMarkers, Ms, NextMode, PlayheadMarker, Script, Selection,
    SelectionController, TimeRange, TimingContext, TimingController, TimingSettings,
};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "timing-cli")]
#[command(about = "Headless subtitle timing - replay marker edits against a script")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session of timing actions
    Replay {
        /// Script file (JSON array of items)
        #[arg(long)]
        script: PathBuf,

        /// Session file (JSON array of actions)
        #[arg(long)]
        session: PathBuf,

        /// Timing settings file
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Write the resulting items here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the markers visible in a time range
    Markers {
        /// Script file (JSON array of items)
        #[arg(long)]
        script: PathBuf,

        /// Index of the active item
        #[arg(long, default_value = "0")]
        active: usize,

        /// Indices of further selected items
        #[arg(long)]
        selected: Vec<usize>,

        /// Keyframe times in ms, comma separated
        #[arg(long, value_delimiter = ',')]
        keyframes: Vec<Ms>,

        /// Range start in ms
        #[arg(long)]
        from: Ms,

        /// Range end in ms
        #[arg(long)]
        to: Ms,
    },
}

/// One recorded step. Script steps act on the document or the selection,
/// timing steps go through the controller.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Step {
    Script(ScriptAction),
    Timing(TimingAction),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ScriptAction {
    Select {
        index: usize,
        #[serde(default)]
        also: Vec<usize>,
    },
    Remove {
        index: usize,
    },
    Undo,
    Keyframes {
        times: Vec<Ms>,
    },
    Playhead {
        ms: Option<Ms>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TimingAction {
    Click {
        ms: Ms,
        #[serde(default)]
        alt: bool,
        #[serde(default)]
        no_snap: bool,
    },
    Drag {
        ms: Ms,
        #[serde(default)]
        no_snap: bool,
    },
    Release,
    Commit,
    Revert,
    Next {
        #[serde(default)]
        mode: NextMode,
    },
    Prev,
    LeadIn,
    LeadOut,
    ModifyStart {
        delta: i32,
    },
    ModifyLength {
        delta: i32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            script,
            session,
            settings,
            output,
        } => replay_command(script, session, settings, output),
        Commands::Markers {
            script,
            active,
            selected,
            keyframes,
            from,
            to,
        } => markers_command(script, active, selected, keyframes, from, to),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {:?}", path))
}

fn item_id(doc: &Script, index: usize) -> Result<ItemId> {
    doc.items()
        .get(index)
        .map(|item| item.id)
        .with_context(|| format!("No item at index {} ({} items)", index, doc.items().len()))
}

fn replay_command(
    script_path: PathBuf,
    session_path: PathBuf,
    settings_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let items: Vec<Item> = read_json(&script_path)?;
    let steps: Vec<Step> = read_json(&session_path)?;
    let settings = match settings_path {
        Some(path) => TimingSettings::load(&path)
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => TimingSettings::default(),
    };
    info!(
        "Replaying {} steps against {} items from {:?}",
        steps.len(),
        items.len(),
        script_path
    );

    let mut doc = Script::new(items);
    let mut selection = Selection::new();
    if let Some(first) = doc.items().first() {
        selection.select_single(first.id);
    }

    let keyframes = Rc::new(KeyframeMarkers::new(Vec::new()));
    let playhead = Rc::new(PlayheadMarker::new());
    let mut controller = {
        let mut ctx = TimingContext::new(&mut doc, &mut selection);
        TimingController::new(&mut ctx, settings)
    };
    controller.add_marker_source(keyframes.clone());
    controller.set_playhead(playhead.clone());

    for (n, step) in steps.into_iter().enumerate() {
        debug!(step = n, ?step, "replaying");
        match step {
            Step::Script(ScriptAction::Select { index, also }) => {
                let active = item_id(&doc, index)?;
                let mut selected = vec![active];
                for i in also {
                    selected.push(item_id(&doc, i)?);
                }
                selection.set_selection_and_active(selected, Some(active));
            }
            Step::Script(ScriptAction::Remove { index }) => {
                let id = item_id(&doc, index)?;
                let neighbor = doc.next_item(id).or_else(|| doc.prev_item(id));
                doc.remove_item(id)?;
                if selection.active_item() == Some(id) {
                    selection.set_selection_and_active(neighbor.into_iter().collect(), neighbor);
                } else {
                    selection.remove_from_selection(id);
                }
            }
            Step::Script(ScriptAction::Undo) => {
                if let Err(e) = doc.undo() {
                    warn!("Step {}: {}", n, e);
                }
            }
            Step::Script(ScriptAction::Keyframes { times }) => {
                keyframes.set_keyframes(times);
                controller.notify_sources_changed();
            }
            Step::Script(ScriptAction::Playhead { ms }) => {
                playhead.set_position(ms);
                controller.notify_sources_changed();
            }
            Step::Timing(action) => {
                let mut ctx = TimingContext::new(&mut doc, &mut selection);
                apply(&mut controller, &mut ctx, action);
            }
        }

        let mut ctx = TimingContext::new(&mut doc, &mut selection);
        controller.pump(&mut ctx);
    }

    if !controller.modified_lines().is_empty() {
        warn!(
            "{} line(s) have uncommitted changes",
            controller.modified_lines().len()
        );
    }
    info!("Replay completed, {} history entries", doc.history().len());

    let json = serde_json::to_string_pretty(doc.items())?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Items written to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn apply(controller: &mut TimingController, ctx: &mut TimingContext<'_>, action: TimingAction) {
    let sensitivity = controller.settings().drag_sensitivity;
    match action {
        TimingAction::Click { ms, alt, no_snap } => {
            let snap_range = controller.settings().effective_snap_range(no_snap);
            let grabbed = controller.on_left_click(ctx, ms, alt, sensitivity, snap_range);
            debug!(ms, grabbed = grabbed.len(), "click");
        }
        TimingAction::Drag { ms, no_snap } => {
            let snap_range = controller.settings().effective_snap_range(no_snap);
            controller.on_drag(ctx, ms, snap_range);
        }
        TimingAction::Release => controller.on_drag_end(),
        TimingAction::Commit => controller.commit(ctx),
        TimingAction::Revert => controller.revert(ctx),
        TimingAction::Next { mode } => controller.next(ctx, mode),
        TimingAction::Prev => controller.prev(ctx),
        TimingAction::LeadIn => controller.add_lead_in(ctx),
        TimingAction::LeadOut => controller.add_lead_out(ctx),
        TimingAction::ModifyStart { delta } => controller.modify_start(ctx, delta),
        TimingAction::ModifyLength { delta } => controller.modify_length(ctx, delta),
    }
}

fn markers_command(
    script_path: PathBuf,
    active: usize,
    selected: Vec<usize>,
    keyframes: Vec<Ms>,
    from: Ms,
    to: Ms,
) -> Result<()> {
    let items: Vec<Item> = read_json(&script_path)?;
    let mut doc = Script::new(items);
    let mut selection = Selection::new();

    let active_id = item_id(&doc, active)?;
    let mut ids = vec![active_id];
    for i in selected {
        ids.push(item_id(&doc, i)?);
    }
    selection.set_selection_and_active(ids, Some(active_id));

    let mut ctx = TimingContext::new(&mut doc, &mut selection);
    let mut controller = TimingController::new(&mut ctx, TimingSettings::default());
    if !keyframes.is_empty() {
        controller.add_marker_source(Rc::new(KeyframeMarkers::new(keyframes)));
    }

    let markers = controller.markers_in(TimeRange::new(from, to));
    info!("{} markers in [{}, {})", markers.len(), from, to);
    println!("{}", serde_json::to_string_pretty(&markers)?);
    Ok(())
}
