use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PAUSE: &str = "jukebox_pause";
    pub const SKIP: &str = "jukebox_skip";
    pub const REPEAT_QUEUE: &str = "jukebox_repeat_queue";
    pub const REPEAT_SONG: &str = "jukebox_repeat_song";
}

/// Controls attached to every "now playing" message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerButton {
    Pause,
    Skip,
    RepeatQueue,
    RepeatSong,
}

impl PlayerButton {
    pub fn from_custom_id(id: &str) -> Option<Self> {
        match id {
            button_ids::PAUSE => Some(Self::Pause),
            button_ids::SKIP => Some(Self::Skip),
            button_ids::REPEAT_QUEUE => Some(Self::RepeatQueue),
            button_ids::REPEAT_SONG => Some(Self::RepeatSong),
            _ => None,
        }
    }

    pub fn custom_id(self) -> &'static str {
        match self {
            Self::Pause => button_ids::PAUSE,
            Self::Skip => button_ids::SKIP,
            Self::RepeatQueue => button_ids::REPEAT_QUEUE,
            Self::RepeatSong => button_ids::REPEAT_SONG,
        }
    }

    fn button(self) -> CreateButton {
        let button = CreateButton::new(self.custom_id()).style(ButtonStyle::Primary);
        match self {
            Self::Pause => button.emoji('⏯'),
            Self::Skip => button.emoji('⏩'),
            Self::RepeatQueue => button.emoji('🔁').label("Cola"),
            Self::RepeatSong => button.emoji('🔂').label("Canción"),
        }
    }
}

/// Crea la fila de controles del reproductor
pub fn create_player_buttons() -> Vec<CreateActionRow> {
    let buttons = [
        PlayerButton::Pause,
        PlayerButton::Skip,
        PlayerButton::RepeatQueue,
        PlayerButton::RepeatSong,
    ]
    .into_iter()
    .map(PlayerButton::button)
    .collect();

    vec![CreateActionRow::Buttons(buttons)]
}
