use thiserror::Error;

/// Errors surfaced to callers of the jukebox.
///
/// None of them is fatal: a failing command leaves the tenant untouched and
/// never affects other tenants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JukeboxError {
    #[error("No hay nada reproduciéndose en este momento")]
    NothingPlaying,

    #[error("La reproducción ya está pausada")]
    AlreadyPaused,

    #[error("La reproducción no está pausada")]
    NotPaused,

    #[error("Ya hay un salto en curso, espera a que empiece la siguiente canción")]
    SkipPending,

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("El bot no está conectado en este servidor")]
    TenantNotFound,

    #[error("La solicitud se canceló porque el reproductor se desconectó")]
    Cancelled,

    #[error("Error de salida de audio: {0}")]
    Output(String),

    #[error("El reproductor se ha detenido")]
    Closed,
}

pub type Result<T, E = JukeboxError> = std::result::Result<T, E>;
