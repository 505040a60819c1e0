//! Shared application context handed to every manager

use crate::config::Config;
use crate::scheme::{ClassificationScheme, HuePalette, Palette};
use crate::store::AnnotationStore;
use std::sync::Arc;

/// Who is working, in which group, against which store
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn AnnotationStore>,
    pub user: String,
    pub group: String,
    pub palette: Arc<dyn Palette>,
}

impl AppContext {
    /// User and group come from the configuration; the palette is the hue wheel.
    pub fn new(config: Config, store: Arc<dyn AnnotationStore>) -> Self {
        Self {
            user: config.user.clone(),
            group: config.group.clone(),
            config,
            store,
            palette: Arc::new(HuePalette::new()),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_palette(mut self, palette: Arc<dyn Palette>) -> Self {
        self.palette = palette;
        self
    }

    /// An empty scheme colored the way this context colors
    pub fn empty_scheme(&self) -> ClassificationScheme {
        ClassificationScheme::new(Arc::clone(&self.palette), self.config.color_settings())
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("user", &self.user)
            .field("group", &self.group)
            .field("palette", &self.palette)
            .finish_non_exhaustive()
    }
}
