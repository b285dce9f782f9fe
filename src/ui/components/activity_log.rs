use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, RichText};

/// Scrolling list of recent session events
pub struct ActivityPanel<'a> {
    state: &'a AppState,
    theme: &'a Theme,
}

impl<'a> ActivityPanel<'a> {
    pub fn new(state: &'a AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Activity").strong().color(self.theme.text_primary));
        ui.separator();

        if self.state.activity.is_empty() {
            ui.label(RichText::new("Nothing yet").italics().color(self.theme.text_muted));
            return;
        }

        egui::ScrollArea::vertical()
            .id_salt("activity_log")
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for line in self.state.activity.lines() {
                    ui.label(
                        RichText::new(line)
                            .family(egui::FontFamily::Monospace)
                            .size(11.0)
                            .color(self.theme.text_secondary),
                    );
                }
            });
    }
}
