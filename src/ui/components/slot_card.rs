//! Slot card component
//!
//! One card per recording slot: device selector, transport controls and the
//! finished recording.

use super::waveform::Waveform;
use crate::slot::SlotPhase;
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, RichText};
use tracing::debug;

enum SlotAction {
    Select(Option<String>),
    Start,
    Pause,
    Resume,
    Stop,
    #[cfg(feature = "audio-io")]
    Play,
    #[cfg(feature = "audio-io")]
    StopPreview,
}

/// Controls for a single recording slot
pub struct SlotCard<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
    index: usize,
}

impl<'a> SlotCard<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme, index: usize) -> Self {
        Self { state, theme, index }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        let Some(slot) = self.state.slot(self.index) else {
            return;
        };

        let number = self.index + 1;
        let phase = slot.phase();
        let selected = slot.selected_device_id().map(str::to_string);
        let can_start = slot.can_start();
        let levels = slot.levels();
        let artifact = slot.artifact().map(|artifact| {
            let size = match artifact.duration_secs() {
                Some(secs) => format!("{}, {:.1} s", format_size(artifact.len()), secs),
                None => format_size(artifact.len()),
            };
            (slot.upload_filename().unwrap_or_default(), size)
        });
        let devices: Vec<(String, String)> = self
            .state
            .registry()
            .devices()
            .iter()
            .map(|device| (device.id.clone(), device.display_label()))
            .collect();
        let selected_text = selected
            .as_deref()
            .map(|id| self.state.registry().label_for(id))
            .unwrap_or_else(|| "Select a microphone".to_string());
        #[cfg(feature = "audio-io")]
        let previewing = self.state.preview_slot() == Some(self.index);

        let mut action = None;

        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing)
            .show(ui, |ui| {
                ui.set_min_width(ui.available_width());

                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("Source {}", number))
                            .strong()
                            .color(self.theme.text_primary),
                    );
                    let (text, color) = match phase {
                        SlotPhase::Idle => ("Idle", self.theme.text_muted),
                        SlotPhase::Recording => ("● Recording", self.theme.recording),
                        SlotPhase::Paused => ("⏸ Paused", self.theme.paused),
                        SlotPhase::Finalizing => ("Finishing…", self.theme.warning),
                    };
                    let response = ui.label(RichText::new(text).size(12.0).color(color));
                    let status = format!("Source {} status: {}", number, text);
                    response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::Label, true, &status)
                    });
                });

                ui.add_space(self.theme.spacing_sm);

                let combo_enabled = phase == SlotPhase::Idle;
                ui.add_enabled_ui(combo_enabled, |ui| {
                    let combo = egui::ComboBox::from_id_salt(("slot_device", self.index))
                        .selected_text(selected_text.as_str())
                        .width(ui.available_width())
                        .show_ui(ui, |ui| {
                            if ui
                                .selectable_label(selected.is_none(), "Select a microphone")
                                .clicked()
                            {
                                action = Some(SlotAction::Select(None));
                            }
                            for (id, label) in &devices {
                                let is_selected = selected.as_deref() == Some(id.as_str());
                                if ui.selectable_label(is_selected, label.as_str()).clicked() {
                                    action = Some(SlotAction::Select(Some(id.clone())));
                                }
                            }
                        });
                    let combo_label = format!("Microphone for source {}", number);
                    combo.response.widget_info(|| {
                        egui::WidgetInfo::labeled(
                            egui::WidgetType::ComboBox,
                            combo_enabled,
                            &combo_label,
                        )
                    });
                });

                if matches!(phase, SlotPhase::Recording | SlotPhase::Paused) {
                    ui.add_space(self.theme.spacing_sm);
                    Waveform::new(&levels, self.theme, format!("Source {} input level", number))
                        .active(phase == SlotPhase::Recording)
                        .show(ui);
                }

                ui.add_space(self.theme.spacing_sm);

                ui.horizontal(|ui| {
                    if can_start && button(ui, "▶ Start", &format!("Start recording source {}", number)) {
                        action = Some(SlotAction::Start);
                    }

                    match phase {
                        SlotPhase::Recording => {
                            if button(ui, "⏸ Pause", &format!("Pause source {}", number)) {
                                action = Some(SlotAction::Pause);
                            }
                        }
                        SlotPhase::Paused => {
                            if button(ui, "⏵ Resume", &format!("Resume source {}", number)) {
                                action = Some(SlotAction::Resume);
                            }
                        }
                        _ => {}
                    }

                    if matches!(phase, SlotPhase::Recording | SlotPhase::Paused)
                        && button(ui, "⏹ Stop", &format!("Stop source {}", number))
                    {
                        action = Some(SlotAction::Stop);
                    }
                });

                if let Some((filename, size)) = &artifact {
                    ui.add_space(self.theme.spacing_sm);
                    ui.horizontal(|ui| {
                        #[cfg(feature = "audio-io")]
                        {
                            if previewing {
                                if button(ui, "⏹", &format!("Stop playing source {}", number)) {
                                    action = Some(SlotAction::StopPreview);
                                }
                            } else if button(ui, "🔊", &format!("Play source {}", number)) {
                                action = Some(SlotAction::Play);
                            }
                        }

                        let text = format!("{} ({})", filename, size);
                        let response = ui.label(
                            RichText::new(&text)
                                .family(egui::FontFamily::Monospace)
                                .color(self.theme.success),
                        );
                        let info = format!("Source {} recording: {}", number, text);
                        response.widget_info(|| {
                            egui::WidgetInfo::labeled(egui::WidgetType::Label, true, &info)
                        });
                    });
                }
            });

        let result = match action {
            Some(SlotAction::Select(device_id)) => self.state.select_device(self.index, device_id),
            Some(SlotAction::Start) => self.state.start(self.index),
            Some(SlotAction::Pause) => self.state.pause(self.index),
            Some(SlotAction::Resume) => self.state.resume(self.index),
            Some(SlotAction::Stop) => self.state.stop(self.index),
            #[cfg(feature = "audio-io")]
            Some(SlotAction::Play) => {
                self.state.play_preview(self.index);
                Ok(())
            }
            #[cfg(feature = "audio-io")]
            Some(SlotAction::StopPreview) => {
                self.state.stop_preview();
                Ok(())
            }
            None => Ok(()),
        };
        if let Err(e) = result {
            debug!("Source {} action rejected: {}", number, e);
        }
    }
}

/// A button with an accessibility label; returns whether it was clicked
fn button(ui: &mut egui::Ui, text: &str, label: &str) -> bool {
    let response = ui.button(text);
    response.widget_info(|| egui::WidgetInfo::labeled(egui::WidgetType::Button, true, label));
    response.clicked()
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
