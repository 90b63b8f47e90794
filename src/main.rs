use anyhow::Context;
use clap::Parser;
use eframe::egui;
use oaktracker::collapse::CollapseState;
use oaktracker::config::{ConfigArgs, TrackerConfig, DEFAULT_EXPORT_FILE};
use oaktracker::loader::load_datasets;
use oaktracker::logging;
use oaktracker::session::Session;
use oaktracker::store::FileStore;
use oaktracker::surface::{Marker, Region, RegionId, RegionTable, Tier, VisibleCell, TABLE_COLUMNS};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

const ROW_HEIGHT: f32 = 24.0;
/// Location, habitat and sub-category column widths; items take the rest.
const HEADER_COLUMN_WIDTHS: [f32; 3] = [220.0, 160.0, 150.0];
const MIN_ITEM_COLUMN_WIDTH: f32 = 240.0;

type TrackerSession = Session<FileStore>;
type LoadSlot = Arc<Mutex<Option<Result<TrackerSession, String>>>>;

#[derive(Parser)]
#[command(name = "oaktracker", about = "Collection tracker")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config.into_config();
    config.validate()?;
    logging::init(config.log_file.as_deref()).context("initialising logging")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_title("OakTracker"),
        ..Default::default()
    };

    eframe::run_native(
        "OakTracker",
        options,
        Box::new(move |cc| {
            configure_style(&cc.egui_ctx);
            let mut app = TrackerApp::new(config);
            app.start_load();
            Box::new(app)
        }),
    )
    .map_err(|err| anyhow::anyhow!("window failed: {}", err))
}

fn configure_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = egui::Color32::from_rgb(30, 41, 59);
    visuals.widgets.noninteractive.rounding = egui::Rounding::same(4.0);
    style.visuals = visuals;
    style.spacing.item_spacing = egui::vec2(10.0, 6.0);
    ctx.set_style(style);
}

fn start_session(config: &TrackerConfig) -> oaktracker::Result<TrackerSession> {
    let store = FileStore::open(config.state_file.clone())?;
    let datasets = load_datasets(config)?;
    Ok(Session::start(config, store, &datasets))
}

/// A visible region and the block of drawn lines it covers.
struct CellBlock<'a> {
    cell: VisibleCell<'a>,
    first_line: usize,
    lines: usize,
}

/// Group the visible rows into one block per visible region, so merged
/// cells are painted once across all their lines.
fn cell_blocks<'a>(view: &'a RegionTable, rows: &[usize]) -> Vec<CellBlock<'a>> {
    let mut blocks: Vec<CellBlock<'a>> = Vec::new();
    let mut open: HashMap<&RegionId, usize> = HashMap::new();
    for (line, &row) in rows.iter().enumerate() {
        for cell in view.visible_cells(row) {
            match open.get(&cell.region.id) {
                Some(&block) if !cell.starts => blocks[block].lines += 1,
                _ => {
                    open.insert(&cell.region.id, blocks.len());
                    blocks.push(CellBlock {
                        cell,
                        first_line: line,
                        lines: 1,
                    });
                }
            }
        }
    }
    blocks
}

fn header_text(region: &Region) -> String {
    let arrow = if region.has(Marker::Collapsed) { "▶" } else { "▼" };
    match region.badge.as_deref() {
        Some(badge) => format!("{} {}  {}", arrow, region.label, badge),
        None => format!("{} {}", arrow, region.label),
    }
}

fn cell_fill(region: &Region, hovered: bool) -> egui::Color32 {
    let (r, g, b) = if region.has(Marker::Completed) {
        (38, 92, 60)
    } else if region.has(Marker::Special) {
        (74, 52, 96)
    } else {
        match region.tier {
            Tier::Location => (44, 58, 82),
            Tier::Habitat => (40, 52, 72),
            Tier::SubCategory => (36, 47, 66),
            Tier::Item => (30, 41, 59),
        }
    };
    if hovered {
        egui::Color32::from_rgb(r + 16, g + 16, b + 16)
    } else {
        egui::Color32::from_rgb(r, g, b)
    }
}

struct TrackerApp {
    config: TrackerConfig,
    session: Option<TrackerSession>,
    load_slot: LoadSlot,
    is_loading: bool,
    table: usize,
    export_path: String,
    status: String,
}

impl TrackerApp {
    fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            session: None,
            load_slot: Arc::new(Mutex::new(None)),
            is_loading: false,
            table: 0,
            export_path: DEFAULT_EXPORT_FILE.to_string(),
            status: String::new(),
        }
    }

    fn start_load(&mut self) {
        if self.is_loading {
            return;
        }
        self.is_loading = true;
        self.status = format!("Loading tables from {} ...", self.config.data_dir.display());

        let slot = self.load_slot.clone();
        let config = self.config.clone();
        thread::spawn(move || {
            let result = start_session(&config).map_err(|err| err.to_string());
            if let Ok(mut guard) = slot.lock() {
                *guard = Some(result);
            }
        });
    }

    fn poll_load(&mut self) {
        let finished = match self.load_slot.try_lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(result) = finished else {
            return;
        };
        self.is_loading = false;
        match result {
            Ok(session) => {
                self.status = format!(
                    "Loaded {} tables, progress saved to {}",
                    session.tables().len(),
                    session.store().path().display()
                );
                self.session = Some(session);
                self.table = 0;
            }
            Err(err) => {
                tracing::error!(error = %err, "load failed");
                self.status = format!("Load failed: {}", err);
            }
        }
    }

    fn activate(&mut self, region: &RegionId) {
        let table = self.table;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some((tier, label)) = session
            .tables()
            .get(table)
            .and_then(|t| t.view.region(region))
            .map(|r| (r.tier, r.label.clone()))
        else {
            return;
        };

        if tier == Tier::Item {
            self.status = match session.toggle_item(table, region) {
                Ok(Some(true)) => format!("Collected {}", label),
                Ok(Some(false)) => format!("Unmarked {}", label),
                Ok(None) => return,
                Err(err) => format!("Could not save: {}", err),
            };
        } else if let Some(state) = session.toggle_collapse(table, region) {
            let verb = match state {
                CollapseState::Collapsed => "Collapsed",
                CollapseState::Expanded => "Expanded",
            };
            self.status = format!("{} {}", verb, label);
        }
    }

    fn download(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let path = PathBuf::from(self.export_path.trim());
        self.status = match session.download(&path) {
            Ok(()) => format!("Exported to {}", path.display()),
            Err(err) => format!("Export failed: {}", err),
        };
    }

    fn upload(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let path = PathBuf::from(self.export_path.trim());
        self.status = match session.upload(&path) {
            Ok(entries) => format!("Imported {} entries from {}", entries, path.display()),
            Err(err) => format!("Import failed: {}", err),
        };
    }

    fn top_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("OakTracker");
            ui.separator();

            if let Some(session) = self.session.as_ref() {
                for (i, t) in session.tables().iter().enumerate() {
                    let leaves: Vec<_> = t.view.regions().filter(|r| r.tier == Tier::Item).collect();
                    let collected = leaves.iter().filter(|r| r.checked).count();
                    let title = format!("{} {}/{}", t.name(), collected, leaves.len());
                    if ui.selectable_label(self.table == i, title).clicked() {
                        self.table = i;
                    }
                }
            }

            if self.is_loading {
                ui.spinner();
            } else if ui.button("Reload").clicked() {
                self.start_load();
            }
        });

        ui.horizontal(|ui| {
            let has_session = self.session.is_some();
            if ui.add_enabled(has_session, egui::Button::new("Collapse all")).clicked() {
                if let Some(session) = self.session.as_mut() {
                    session.collapse_all();
                }
            }
            if ui.add_enabled(has_session, egui::Button::new("Expand all")).clicked() {
                if let Some(session) = self.session.as_mut() {
                    session.expand_all();
                }
            }
            ui.separator();

            ui.label("File:");
            ui.text_edit_singleline(&mut self.export_path);
            if ui.add_enabled(has_session, egui::Button::new("Download")).clicked() {
                self.download();
            }
            if ui.add_enabled(has_session, egui::Button::new("Upload")).clicked() {
                self.upload();
            }
            ui.separator();
            ui.label(&self.status);
        });
    }

    /// Paint the merged table and return the region clicked this frame.
    fn table_view(&self, ui: &mut egui::Ui) -> Option<RegionId> {
        let view = self.session.as_ref()?.tables().get(self.table).map(|t| &t.view)?;
        let rows = view.visible_rows();
        if rows.is_empty() {
            ui.label("Nothing to show.");
            return None;
        }

        let item_width = (ui.available_width() - HEADER_COLUMN_WIDTHS.iter().sum::<f32>()).max(MIN_ITEM_COLUMN_WIDTH);
        let widths = [
            HEADER_COLUMN_WIDTHS[0],
            HEADER_COLUMN_WIDTHS[1],
            HEADER_COLUMN_WIDTHS[2],
            item_width,
        ];
        let column_x = |column: u16| widths.iter().take(column as usize).sum::<f32>();
        let total_width: f32 = widths.iter().sum();

        let mut clicked = None;
        egui::ScrollArea::both().auto_shrink([false, false]).show(ui, |ui| {
            let (area, _) = ui.allocate_exact_size(
                egui::vec2(total_width, rows.len() as f32 * ROW_HEIGHT),
                egui::Sense::hover(),
            );
            let clip = ui.clip_rect();

            for block in cell_blocks(view, &rows) {
                let region = block.cell.region;
                let span_end = (block.cell.column + block.cell.span).min(TABLE_COLUMNS);
                let rect = egui::Rect::from_min_max(
                    egui::pos2(
                        area.min.x + column_x(block.cell.column),
                        area.min.y + block.first_line as f32 * ROW_HEIGHT,
                    ),
                    egui::pos2(
                        area.min.x + column_x(span_end),
                        area.min.y + (block.first_line + block.lines) as f32 * ROW_HEIGHT,
                    ),
                );
                if !clip.intersects(rect) {
                    continue;
                }

                let response = ui.interact(rect, ui.id().with(region.id.as_str()), egui::Sense::click());
                let painter = ui.painter_at(rect);
                painter.rect(
                    rect.shrink(1.0),
                    3.0,
                    cell_fill(region, response.hovered()),
                    egui::Stroke::new(1.0, egui::Color32::from_rgba_unmultiplied(255, 255, 255, 20)),
                );

                let text = if region.tier == Tier::Item {
                    let mark = if region.checked { "[x]" } else { "[ ]" };
                    match region.detail.as_deref() {
                        Some(detail) => format!("{} {}   {}", mark, region.label, detail),
                        None => format!("{} {}", mark, region.label),
                    }
                } else {
                    header_text(region)
                };
                let font = if region.tier == Tier::Location {
                    egui::FontId::proportional(15.0)
                } else {
                    egui::FontId::proportional(13.0)
                };
                painter.text(
                    rect.left_top() + egui::vec2(8.0, ROW_HEIGHT / 2.0),
                    egui::Align2::LEFT_CENTER,
                    text,
                    font,
                    egui::Color32::WHITE,
                );

                if response.hovered() {
                    ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
                }
                let actionable = region.tier == Tier::Item || region.has(Marker::Clickable);
                if response.clicked() && actionable {
                    clicked = Some(region.id.clone());
                }
            }
        });
        clicked
    }
}

impl eframe::App for TrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_load();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            self.top_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.session.is_none() {
                ui.label(if self.is_loading { "Loading..." } else { "No tables loaded." });
                return;
            }
            if let Some(region) = self.table_view(ui) {
                self.activate(&region);
            }
        });

        if self.is_loading {
            ctx.request_repaint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oaktracker::surface::{BackRefs, Extent, Row};
    use std::collections::BTreeSet;

    fn region(id: &str, tier: Tier, rows: usize, refs: BackRefs) -> Region {
        Region {
            id: id.into(),
            tier,
            label: id.to_string(),
            detail: None,
            extent: Extent::new(rows, 1),
            markers: BTreeSet::new(),
            refs,
            item: (tier == Tier::Item).then(|| id.to_string()),
            checked: false,
            badge: None,
        }
    }

    #[test]
    fn test_merged_cells_become_one_block() {
        let mut view = RegionTable::new("main");
        view.insert_region(region("loc", Tier::Location, 2, BackRefs::default()));
        let refs = BackRefs {
            location: Some("loc".into()),
            ..BackRefs::default()
        };
        view.insert_region(region("a", Tier::Item, 1, refs.clone()));
        view.insert_region(region("b", Tier::Item, 1, refs));
        view.push_row(Row { cells: vec!["loc".into(), "a".into()], leaf: "a".into() });
        view.push_row(Row { cells: vec!["b".into()], leaf: "b".into() });

        let blocks = cell_blocks(&view, &view.visible_rows());
        let shape: Vec<_> = blocks
            .iter()
            .map(|b| (b.cell.region.id.as_str(), b.first_line, b.lines))
            .collect();
        assert_eq!(shape, vec![("loc", 0, 2), ("a", 0, 1), ("b", 1, 1)]);
    }
}
