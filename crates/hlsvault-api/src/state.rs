//! Application state shared by all handlers.

use hlsvault_processing::HlsService;

pub struct AppState {
    pub service: HlsService,
}

impl AppState {
    pub fn new(service: HlsService) -> Self {
        Self { service }
    }
}
