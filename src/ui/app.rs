//! Main application struct and eframe integration

use crate::slot::SLOT_COUNT;
use crate::ui::components::{ActivityPanel, SlotCard, UploadBar};
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, CentralPanel, RichText, SidePanel, TopBottomPanel};
use std::time::Duration;

/// How often to repaint while recorders or uploads may deliver events
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct MultirecApp {
    state: AppState,
    theme: Theme,
}

impl MultirecApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: AppState) -> Self {
        let app = Self::with_state(state);
        app.theme.apply(&cc.egui_ctx);
        app
    }

    /// Build the app without a native window
    pub fn with_state(state: AppState) -> Self {
        Self {
            state,
            theme: Theme::dark(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("header")
            .frame(egui::Frame::none().fill(self.theme.bg_secondary).inner_margin(self.theme.spacing))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new("Multirec")
                            .size(20.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );
                    ui.label(
                        RichText::new(format!("{} input device(s)", self.state.registry().len()))
                            .size(13.0)
                            .color(self.theme.text_muted),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let activity = ui
                            .button("📋")
                            .on_hover_text("Toggle activity log");
                        activity.widget_info(|| {
                            egui::WidgetInfo::labeled(egui::WidgetType::Button, true, "Toggle activity log")
                        });
                        if activity.clicked() {
                            self.state.show_activity_panel = !self.state.show_activity_panel;
                        }

                        let refresh = ui.button("⟳").on_hover_text("Refresh devices");
                        refresh.widget_info(|| {
                            egui::WidgetInfo::labeled(egui::WidgetType::Button, true, "Refresh devices")
                        });
                        if refresh.clicked() {
                            self.state.refresh_devices();
                        }

                        let permission = ui.button("🎤 Allow microphone");
                        permission.widget_info(|| {
                            egui::WidgetInfo::labeled(
                                egui::WidgetType::Button,
                                true,
                                "Request microphone permission",
                            )
                        });
                        if permission.clicked() {
                            self.state.request_permission();
                        }
                    });
                });
            });
    }

    fn show_activity_panel(&mut self, ctx: &egui::Context) {
        if !self.state.show_activity_panel {
            return;
        }

        SidePanel::right("activity_panel")
            .resizable(true)
            .default_width(300.0)
            .min_width(220.0)
            .frame(egui::Frame::none().fill(self.theme.bg_primary).inner_margin(self.theme.spacing))
            .show(ctx, |ui| {
                ActivityPanel::new(&self.state, &self.theme).show(ui);
            });
    }

    fn show_upload_bar(&mut self, ctx: &egui::Context) {
        TopBottomPanel::bottom("upload_bar")
            .frame(egui::Frame::none().fill(self.theme.bg_primary).inner_margin(self.theme.spacing))
            .show(ctx, |ui| {
                UploadBar::new(&mut self.state, &self.theme).show(ui);
            });
    }

    fn show_slots(&mut self, ctx: &egui::Context) {
        CentralPanel::default()
            .frame(egui::Frame::none().fill(self.theme.bg_primary).inner_margin(self.theme.spacing))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().id_salt("slots").show(ui, |ui| {
                    for index in 0..SLOT_COUNT {
                        SlotCard::new(&mut self.state, &self.theme, index).show(ui);
                        ui.add_space(self.theme.spacing_sm);
                    }
                });
            });
    }

    /// Render every panel; also used by the UI tests
    pub fn ui(&mut self, ctx: &egui::Context) {
        self.state.poll_events();

        self.show_header(ctx);
        self.show_activity_panel(ctx);
        self.show_upload_bar(ctx);
        self.show_slots(ctx);

        if self.state.any_recording() || self.state.is_uploading() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
    }
}

impl eframe::App for MultirecApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.shutdown();
    }
}
