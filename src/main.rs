use eframe::egui;
use egui::{Color32, CornerRadius, RichText, ScrollArea, Stroke, Ui, ViewportBuilder};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod cache_key;
mod db;
mod error;
mod highlight;
mod identity;
mod models;
mod reddit_client;
mod settings;
mod storage;
mod timestamp;
mod visit_cache;

use crate::cache_key::KeyDeriver;
use crate::db::SqliteStore;
use crate::error::{HighlightError, HighlightResult};
use crate::highlight::{activate, HighlightSession, Phase, Reconciliation};
use crate::identity::IdentityResolver;
use crate::models::{RedditComment, ThreadPage};
use crate::reddit_client::{is_local_path, load_saved_thread, RedditClient};
use crate::settings::Settings;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::timestamp::{format_local, now_unix};
use crate::visit_cache::VisitCache;

fn main() -> Result<(), eframe::Error> {
    let settings = Settings::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.log_directive())),
        )
        .try_init()
        .ok();

    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([1000.0, 800.0])
            .with_min_inner_size([600.0, 400.0])
            .with_title("Reddit Comment Highlighter"),
        ..Default::default()
    };

    eframe::run_native(
        "Reddit Comment Highlighter",
        options,
        Box::new(move |cc| {
            let mut app = HighlighterApp::new(settings);

            if let Some(storage) = cc.storage {
                if let Some(theme_str) = storage.get_string("is_dark_mode") {
                    if let Ok(is_dark_mode) = theme_str.parse::<bool>() {
                        app.set_dark_mode(is_dark_mode);
                    }
                }
                if let Some(url) = storage.get_string("last_url") {
                    app.url_input = url;
                }
            }

            Ok(Box::new(app))
        }),
    )
}

struct AppTheme {
    background: Color32,
    card_background: Color32,
    text: Color32,
    secondary_text: Color32,
    accent: Color32,
    separator: Color32,
    error: Color32,
    new_comment: Color32,
}

impl AppTheme {
    fn dark(new_comment: Color32) -> Self {
        Self {
            background: Color32::from_rgb(18, 18, 18),
            card_background: Color32::from_rgb(30, 30, 30),
            text: Color32::from_rgb(240, 240, 240),
            secondary_text: Color32::from_rgb(180, 180, 180),
            accent: Color32::from_rgb(255, 139, 96), // reddit orangered, softened
            separator: Color32::from_rgb(60, 60, 60),
            error: Color32::from_rgb(239, 83, 80),
            new_comment,
        }
    }

    fn light(new_comment: Color32) -> Self {
        Self {
            background: Color32::from_rgb(245, 245, 245),
            card_background: Color32::from_rgb(255, 255, 255),
            text: Color32::from_rgb(20, 20, 20),
            secondary_text: Color32::from_rgb(90, 90, 90),
            accent: Color32::from_rgb(204, 62, 0),
            separator: Color32::from_rgb(200, 200, 200),
            error: Color32::from_rgb(198, 40, 40),
            new_comment,
        }
    }

    fn apply_to_ctx(&self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.panel_fill = self.background;
        style.visuals.window_fill = self.card_background;
        style.visuals.window_stroke = Stroke::new(1.0, self.separator);
        style.visuals.widgets.noninteractive.bg_fill = self.card_background;
        style.visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text);
        style.visuals.selection.stroke = Stroke::new(1.0, self.accent);
        style.visuals.window_corner_radius = CornerRadius::same(8);
        style.visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
        style.visuals.widgets.active.corner_radius = CornerRadius::same(4);

        ctx.set_style(style);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    /// A fresh page view: sweep, read, record, start a new session.
    Activate,
    /// Same page view, new items: reconcile against the current session.
    Refresh,
}

/// The "highlight comments since" input and its last rejection message.
struct SinceControls {
    input: String,
    error: Option<String>,
}

impl SinceControls {
    fn new(session: &HighlightSession, now_unix: i64) -> Self {
        Self {
            input: format_local(session.highlight_date(now_unix)),
            error: None,
        }
    }
}

struct HighlighterApp {
    settings: Settings,
    client: Option<RedditClient>,
    deriver: KeyDeriver,
    visits: VisitCache<Box<dyn KeyValueStore>>,
    theme: AppTheme,
    is_dark_mode: bool,
    url_input: String,
    page: Option<ThreadPage>,
    session: Option<HighlightSession>,
    controls: Option<SinceControls>,
    reconciliation: Reconciliation,
    status: Option<String>,
    loading: Option<LoadKind>,
    page_receiver: Option<Receiver<anyhow::Result<ThreadPage>>>,
}

impl HighlighterApp {
    fn new(settings: Settings) -> Self {
        let store: Box<dyn KeyValueStore> = match SqliteStore::new() {
            Ok(store) => Box::new(store),
            Err(e) => {
                // Still usable, visits just won't outlive this run
                error!("Failed to open visit database, using memory: {:#}", e);
                Box::new(MemoryStore::new())
            }
        };

        Self::with_store(settings, store)
    }

    fn with_store(settings: Settings, store: Box<dyn KeyValueStore>) -> Self {
        let client = match RedditClient::new(&settings) {
            Ok(client) => Some(client),
            Err(e) => {
                error!("{:#}", e);
                None
            }
        };

        let new_comment = new_comment_color(&settings);

        Self {
            deriver: KeyDeriver::new(settings.prefix.clone(), settings.hash_seed),
            visits: VisitCache::new(store, settings.prefix.clone()),
            client,
            theme: AppTheme::dark(new_comment),
            is_dark_mode: true,
            url_input: String::new(),
            page: None,
            session: None,
            controls: None,
            reconciliation: Reconciliation::default(),
            status: None,
            loading: None,
            page_receiver: None,
            settings,
        }
    }

    fn set_dark_mode(&mut self, is_dark_mode: bool) {
        let new_comment = self.theme.new_comment;
        self.is_dark_mode = is_dark_mode;
        self.theme = if is_dark_mode {
            AppTheme::dark(new_comment)
        } else {
            AppTheme::light(new_comment)
        };
    }

    fn start_load(&mut self, kind: LoadKind) {
        if self.loading.is_some() {
            return;
        }

        let target = match kind {
            LoadKind::Activate => self.url_input.trim().to_string(),
            LoadKind::Refresh => match &self.page {
                Some(page) => page.url.clone(),
                None => return,
            },
        };
        if target.is_empty() {
            return;
        }

        let (tx, rx) = mpsc::channel();
        if is_local_path(&target) {
            // Saved pages carry no address, the URL patterns can't help here
            let path = PathBuf::from(&target);
            thread::spawn(move || {
                let _ = tx.send(load_saved_thread(&path, &target));
            });
        } else {
            let Some(client) = self.client.clone() else {
                self.status = Some("HTTP client unavailable".to_string());
                return;
            };
            thread::spawn(move || {
                let _ = tx.send(client.fetch_thread(&target));
            });
        }

        self.loading = Some(kind);
        self.status = None;
        self.page_receiver = Some(rx);
    }

    fn check_loading_thread(&mut self) {
        let Some(rx) = &self.page_receiver else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => return,
            Err(mpsc::TryRecvError::Disconnected) => Err(anyhow::anyhow!("Loader thread exited")),
        };
        let kind = self.loading.take().unwrap_or(LoadKind::Activate);
        self.page_receiver = None;
        self.finish_load(kind, result);
    }

    fn finish_load(&mut self, kind: LoadKind, result: anyhow::Result<ThreadPage>) {
        match result {
            Ok(page) => match kind {
                LoadKind::Activate => self.activate_page(page),
                LoadKind::Refresh => {
                    self.page = Some(page);
                    self.reconcile_state();
                }
            },
            Err(e) => {
                warn!("Failed to load thread: {:#}", e);
                self.status = Some(format!("Failed to load thread: {}", e));
            }
        }
    }

    fn activate_page(&mut self, page: ThreadPage) {
        let now = now_unix();
        let identity = IdentityResolver::for_page(page.config.as_ref(), &page.url).resolve();

        self.reconciliation = Reconciliation::default();
        self.session = match activate(
            &identity,
            &self.deriver,
            &self.visits,
            self.settings.expiration_window_ms(),
            now,
        ) {
            Ok(session) => Some(session),
            Err(HighlightError::MissingIdentity) => {
                self.status = Some("Not a comment thread, highlighting is off".to_string());
                None
            }
            Err(e) => {
                error!("Activation failed: {}", e);
                self.status = Some(format!("Highlighting unavailable: {}", e));
                None
            }
        };
        self.page = Some(page);
        self.controls = self.session.as_ref().map(|session| SinceControls::new(session, now));

        if self.session.is_some() {
            self.reconcile_state();
        }
    }

    fn ensure_controls(&mut self) -> HighlightResult<&mut SinceControls> {
        if self.controls.is_none() {
            warn!("Highlight controls not found, rebuilding");
            let session = self
                .session
                .as_ref()
                .ok_or(HighlightError::MissingUiAnchor("highlight controls"))?;
            self.controls = Some(SinceControls::new(session, now_unix()));
        }
        self.controls
            .as_mut()
            .ok_or(HighlightError::MissingUiAnchor("highlight controls"))
    }

    fn reconcile_state(&mut self) {
        if let Err(e) = self.ensure_controls() {
            warn!("Skipping reconciliation: {}", e);
            return;
        }
        let (Some(session), Some(page)) = (self.session.as_mut(), self.page.as_ref()) else {
            return;
        };
        self.reconciliation = session.reconcile(&page.comments, now_unix());
    }

    fn apply_custom_date(&mut self) {
        let (Some(session), Some(controls)) = (self.session.as_mut(), self.controls.as_mut()) else {
            return;
        };
        let comments: &[RedditComment] = self.page.as_ref().map(|page| page.comments.as_slice()).unwrap_or(&[]);

        match session.set_manual_override(&controls.input, comments, now_unix()) {
            Ok(reconciliation) => {
                controls.error = None;
                self.reconciliation = reconciliation;
            }
            Err(e) => {
                info!("Ignoring custom date: {}", e);
                controls.error = Some(e.to_string());
            }
        }
    }

    fn reset_custom_date(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let comments: &[RedditComment] = self.page.as_ref().map(|page| page.comments.as_slice()).unwrap_or(&[]);
        self.reconciliation = session.clear_manual_override(comments, now_unix());

        if let Some(controls) = self.controls.as_mut() {
            controls.input.clear();
            controls.error = None;
        }
    }

    fn open_link(&self, url: &str) {
        if let Err(e) = open::that(url) {
            warn!("Failed to open URL: {}", e);
        }
    }

    fn render_toolbar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.url_input)
                    .hint_text("old.reddit.com thread URL or saved .html file")
                    .desired_width(ui.available_width() - 220.0),
            );
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            if ui.button("Load").clicked() || submitted {
                self.start_load(LoadKind::Activate);
            }
            if ui
                .add_enabled(self.page.is_some(), egui::Button::new("Refresh"))
                .clicked()
            {
                self.start_load(LoadKind::Refresh);
            }

            let theme_label = if self.is_dark_mode { "Light" } else { "Dark" };
            if ui.button(theme_label).clicked() {
                self.set_dark_mode(!self.is_dark_mode);
            }

            if self.loading.is_some() {
                ui.spinner();
            }
        });

        if let Some(status) = &self.status {
            ui.label(RichText::new(status).color(self.theme.error));
        }
    }

    fn render_since_controls(&mut self, ui: &mut Ui) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let count = self.reconciliation.highlighted_count;
        let count_text = match session.phase() {
            Phase::Initialized => "-".to_string(),
            Phase::Reconciled => count.to_string(),
        };
        let last_visit = session.last_visit_unix().map(format_local).unwrap_or_default();
        let threshold = match session.phase() {
            Phase::Initialized => "-".to_string(),
            Phase::Reconciled => format_local(self.reconciliation.highlight_date),
        };
        let is_custom = session.custom_date_unix().is_some();
        let count_color = if count > 0 {
            self.theme.new_comment
        } else {
            self.theme.text
        };

        let mut apply = false;
        let mut reset = false;
        let mut error = None;

        if let Some(controls) = self.controls.as_mut() {
            ui.horizontal(|ui| {
                ui.label(RichText::new("highlight comments since:").color(self.theme.secondary_text));
                let response = ui
                    .add(
                        egui::TextEdit::singleline(&mut controls.input)
                            .hint_text("YYYY-MM-DD HH:MM")
                            .desired_width(150.0),
                    )
                    .on_hover_text(format!("threshold: {}\nlast visit: {}", threshold, last_visit));
                apply = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                ui.label(RichText::new("(found:").color(self.theme.secondary_text));
                ui.label(RichText::new(count_text).color(count_color).strong());
                ui.label(RichText::new(")").color(self.theme.secondary_text));

                if is_custom {
                    ui.label(RichText::new("custom").color(self.theme.secondary_text).italics().small());
                }
                reset = ui.add(egui::Button::new(RichText::new("reset").strong()).frame(false)).clicked();
            });
            error = controls.error.clone();
        }

        if let Some(error) = error {
            ui.label(RichText::new(error).color(self.theme.error).small());
        }
        if apply {
            self.apply_custom_date();
        }
        if reset {
            self.reset_custom_date();
        }
    }

    fn render_comments(&self, ui: &mut Ui) {
        let Some(page) = &self.page else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("Open a comment thread to start").color(self.theme.secondary_text));
            });
            return;
        };

        ui.label(RichText::new(&page.title).color(self.theme.text).strong().size(18.0));
        ui.add_space(6.0);

        ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
            for (i, comment) in page.comments.iter().enumerate() {
                self.render_comment(ui, comment, self.reconciliation.is_new(i));
            }
        });
    }

    fn render_comment(&self, ui: &mut Ui, comment: &RedditComment, is_new: bool) {
        let stroke = if is_new {
            Stroke::new(1.0, self.theme.new_comment)
        } else {
            Stroke::new(1.0, self.theme.separator)
        };

        ui.horizontal(|ui| {
            ui.add_space((comment.depth * 16) as f32);

            egui::Frame::new()
                .fill(self.theme.card_background)
                .corner_radius(CornerRadius::same(6))
                .stroke(stroke)
                .inner_margin(if is_new { 10.0 } else { 8.0 })
                .outer_margin(egui::vec2(4.0, 3.0))
                .show(ui, |ui| {
                    ui.vertical(|ui| {
                        ui.horizontal(|ui| {
                            ui.label(RichText::new(&comment.author).color(self.theme.accent).strong());
                            let posted = timestamp::parse_unix(&comment.timestamp)
                                .map(format_local)
                                .unwrap_or_default();
                            ui.label(RichText::new(posted).color(self.theme.secondary_text).small());
                            if let Some(link) = &comment.permalink {
                                if ui.small_button("open").clicked() {
                                    self.open_link(link);
                                }
                            }
                        });
                        if !comment.text.is_empty() {
                            ui.label(RichText::new(&comment.text).color(self.theme.text));
                        }
                    });
                });
        });
    }
}

fn new_comment_color(settings: &Settings) -> Color32 {
    match settings.color_rgb() {
        Some((r, g, b)) => Color32::from_rgb(r, g, b),
        None => {
            warn!("Invalid highlight colour {:?}, using default", settings.color);
            Color32::from_rgb(0xe1, 0xb0, 0x00)
        }
    }
}

impl eframe::App for HighlighterApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        storage.set_string("is_dark_mode", self.is_dark_mode.to_string());
        storage.set_string("last_url", self.url_input.clone());
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme.apply_to_ctx(ctx);
        self.check_loading_thread();

        if ctx.input(|i| i.key_pressed(egui::Key::F5)) {
            self.start_load(LoadKind::Refresh);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.render_toolbar(ui);
            self.render_since_controls(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_comments(ui);
        });

        if self.loading.is_some() {
            ctx.request_repaint();
        }
    }
}
