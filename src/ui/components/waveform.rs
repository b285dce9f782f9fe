//! Live input level display
//!
//! Draws the recent block peaks of one source as centered bars.

use crate::ui::theme::Theme;
use egui::{self, Pos2, Rect, Vec2};

/// Bars for the recent input peaks of a recording source
pub struct Waveform<'a> {
    peaks: &'a [f32],
    theme: &'a Theme,
    active: bool,
    height: f32,
    label: String,
}

impl<'a> Waveform<'a> {
    pub fn new(peaks: &'a [f32], theme: &'a Theme, label: impl Into<String>) -> Self {
        Self {
            peaks,
            theme,
            active: true,
            height: 36.0,
            label: label.into(),
        }
    }

    /// Dim the bars, e.g. while paused
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn show(self, ui: &mut egui::Ui) -> egui::Response {
        let desired_size = Vec2::new(ui.available_width(), self.height);
        let (rect, response) = ui.allocate_exact_size(desired_size, egui::Sense::hover());
        let label = self.label.clone();
        response.widget_info(|| egui::WidgetInfo::labeled(egui::WidgetType::Other, true, &label));

        let painter = ui.painter();
        painter.rect_filled(rect, 4.0, self.theme.bg_tertiary);

        let draw_rect = rect.shrink(4.0);
        let center_y = draw_rect.center().y;
        let color = if self.active {
            self.theme.waveform_active
        } else {
            self.theme.waveform_inactive
        };

        if self.peaks.is_empty() {
            painter.line_segment(
                [
                    Pos2::new(draw_rect.left(), center_y),
                    Pos2::new(draw_rect.right(), center_y),
                ],
                egui::Stroke::new(1.0, self.theme.waveform_inactive),
            );
            return response;
        }

        let bar_width = (draw_rect.width() / self.peaks.len() as f32).max(2.0);
        let max_height = draw_rect.height();

        for (i, &peak) in self.peaks.iter().enumerate() {
            let x = draw_rect.left() + i as f32 * bar_width;
            if x + bar_width > draw_rect.right() {
                break;
            }

            let bar_height = (peak.clamp(0.0, 1.0) * max_height).max(2.0);
            let bar_rect = Rect::from_center_size(
                Pos2::new(x + bar_width / 2.0, center_y),
                Vec2::new((bar_width - 1.0).max(1.0), bar_height),
            );
            painter.rect_filled(bar_rect, 1.0, color);
        }

        response
    }
}
