//! Upload bar component
//!
//! URL field, the Upload button and the status line.

use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, RichText};

pub struct UploadBar<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
}

impl<'a> UploadBar<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let uploading = self.state.is_uploading();
                    let can_upload = self.state.can_upload();

                    let url_width = ui.available_width() - 120.0;
                    let url_response = ui.add_enabled(
                        !uploading,
                        egui::TextEdit::singleline(&mut self.state.upload_url)
                            .hint_text("https://example.com/upload")
                            .desired_width(url_width.max(120.0))
                            .id(egui::Id::new("upload_url")),
                    );
                    url_response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::TextEdit, !uploading, "Upload URL")
                    });

                    let upload_response = ui.add_enabled(can_upload, egui::Button::new("⬆ Upload"));
                    upload_response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::Button, can_upload, "Upload recordings")
                    });
                    if upload_response.clicked() {
                        self.state.upload();
                    }

                    if uploading {
                        ui.add(egui::Spinner::new());
                    }
                });

                if let Some(status) = self.state.upload_status() {
                    let color = if status.starts_with("Failed") || status.starts_with("Please") {
                        self.theme.error
                    } else {
                        self.theme.text_secondary
                    };
                    let response = ui.label(RichText::new(status).color(color));
                    let label = format!("Upload status: {}", status);
                    response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::Label, true, &label)
                    });
                }
            });
    }
}
