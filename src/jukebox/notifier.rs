use tracing::info;

use super::TenantId;

/// Receives playback notifications for the front-end.
///
/// Called from the jukebox task; implementations must not block.
pub trait Notifier: Send + Sync {
    fn now_playing(&self, tenant: TenantId, title: &str);

    fn queue_empty(&self, tenant: TenantId);

    fn item_unplayable(&self, tenant: TenantId, title: &str);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn now_playing(&self, tenant: TenantId, title: &str) {
        info!("🎵 [{}] Reproduciendo ahora: {}", tenant, title);
    }

    fn queue_empty(&self, tenant: TenantId) {
        info!("📭 [{}] La cola está vacía", tenant);
    }

    fn item_unplayable(&self, tenant: TenantId, title: &str) {
        info!("⚠️ [{}] No se pudo reproducir: {}", tenant, title);
    }
}
