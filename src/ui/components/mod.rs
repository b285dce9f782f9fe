pub mod activity_log;
pub mod slot_card;
pub mod upload_bar;
pub mod waveform;

pub use activity_log::ActivityPanel;
pub use slot_card::SlotCard;
pub use upload_bar::UploadBar;
pub use waveform::Waveform;
